//! Spatial-domain Bluebild imaging for phased-array radio interferometers.
//!
//! Per snapshot, the eigenpairs of the beamformed visibility matrix are
//! synthesized into per-pixel field energies, weighted into a standardized
//! and a least-squares estimator, clustered into energy levels and summed
//! into a running total:
//!
//! ```text
//! (D, V, XYZ, W, cluster_idx) -> SpatialFieldSynthesizer -> (N_eig, N_px)
//!                             -> [std, lsq]              -> (2, N_eig, N_px)
//!                             -> cluster_layers          -> (2, N_level, N_px)
//!                             -> FieldAccumulator        (running sum)
//! ```
//!
//! [`SpatialImager`] is the engine in a fixed float width; [`Imager`] picks
//! the width at run time from an [`ImagerConfig`].

pub mod beamforming;
pub mod cluster;
pub mod data_processor;
pub mod error;
pub mod geom;
pub mod image;
pub mod imager;
pub mod precision;
pub mod sphere;
pub mod synthesizer;
pub mod timing;

pub use beamforming::{matched_beamformer, BeamWeights};
pub use cluster::cluster_layers;
pub use data_processor::{eigh, IntensityFieldDataProcessor, ParameterEstimator};
pub use error::{BluebildError, Result};
pub use image::Image;
pub use imager::{FieldAccumulator, Imager, ImagerConfig, SpatialImager};
pub use precision::{Precision, Real};
pub use synthesizer::SpatialFieldSynthesizer;
pub use timing::Timer;
