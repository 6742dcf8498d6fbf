use std::ops::AddAssign;

use ndarray::{Array, ArrayView, Axis, RemoveAxis};
use num_traits::Zero;

use crate::error::{invalid, Result};

/// Sum the eigenpair axis of `x` into `n_level` energy levels.
///
/// Slice `k` along `axis` is added to level `cluster_idx[k]`. Indices outside
/// `0..n_level` (negative sentinels included) are dropped. The returned array
/// has the shape of `x` with `axis` resized to `n_level`; levels nobody maps
/// to stay zero.
pub fn cluster_layers<T, D>(
    x: ArrayView<'_, T, D>,
    cluster_idx: &[i64],
    n_level: usize,
    axis: Axis,
) -> Result<Array<T, D>>
where
    T: Clone + Zero + AddAssign,
    D: RemoveAxis,
{
    if n_level == 0 {
        return invalid("number of energy levels must be positive");
    }
    if axis.index() >= x.ndim() {
        return invalid(format!(
            "axis {} out of range for a {}-d statistic",
            axis.index(),
            x.ndim()
        ));
    }
    if x.len_of(axis) != cluster_idx.len() {
        return invalid(format!(
            "statistic has {} eigenpairs along axis {} but {} cluster indices were given",
            x.len_of(axis),
            axis.index(),
            cluster_idx.len()
        ));
    }

    let mut shape = x.raw_dim();
    shape[axis.index()] = n_level;
    let mut levels = Array::<T, D>::zeros(shape);

    for (k, &c) in cluster_idx.iter().enumerate() {
        if c < 0 || c as u64 >= n_level as u64 {
            continue;
        }
        let mut level = levels.index_axis_mut(axis, c as usize);
        level += &x.index_axis(axis, k);
    }
    Ok(levels)
}
