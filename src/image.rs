use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{invalid, Result};
use crate::precision::Real;

/// Energy levels evaluated on a pixel grid.
///
/// `data` is (N_level, N_px) and `grid` the (3, N_px) pixel directions it was
/// evaluated on. The grid is shared with the imager that produced the image.
#[derive(Clone, Debug)]
pub struct Image<T> {
    data: Array2<T>,
    grid: Arc<Array2<T>>,
}

impl<T: Real> Image<T> {
    pub fn new(data: Array2<T>, grid: Arc<Array2<T>>) -> Result<Self> {
        if grid.nrows() != 3 {
            return invalid(format!("pixel grid must be (3, N_px), got {:?}", grid.dim()));
        }
        if data.ncols() != grid.ncols() {
            return invalid(format!(
                "image has {} pixels but grid has {}",
                data.ncols(),
                grid.ncols()
            ));
        }
        Ok(Self { data, grid })
    }

    pub fn data(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn grid(&self) -> ArrayView2<'_, T> {
        self.grid.view()
    }

    pub fn n_level(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_px(&self) -> usize {
        self.data.ncols()
    }

    pub fn level(&self, index: usize) -> Option<ArrayView1<'_, T>> {
        (index < self.n_level()).then(|| self.data.row(index))
    }

    /// All energy levels summed into one map.
    pub fn collapsed(&self) -> Array1<T> {
        self.data.sum_axis(Axis(0))
    }

    pub fn to_f64(&self) -> Image<f64> {
        Image {
            data: self.data.mapv(Real::widen),
            grid: Arc::new(self.grid.mapv(Real::widen)),
        }
    }
}
