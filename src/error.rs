use thiserror::Error;

/// Errors raised by the imaging core.
///
/// Every argument problem is reported before any numeric work starts, so a
/// failed call never leaves partial state behind.
#[derive(Error, Debug)]
pub enum BluebildError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no snapshot has been integrated yet")]
    NotReady,
    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, BluebildError>;

pub(crate) fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(BluebildError::InvalidArgument(msg.into()))
}
