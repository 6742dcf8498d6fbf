use std::f64::consts::PI;

use ndarray::{Array2, ArrayView2, Axis};
use num_complex::{Complex, Complex64};
use sprs::{CsMat, TriMat};

use crate::error::{invalid, Result};
use crate::precision::Real;

/// Synthesis beamweights, (N_antenna, N_beam).
///
/// Station beamformers are naturally sparse (each antenna feeds exactly one
/// beam) while calibrated or tapered weights are usually dense; the imager
/// accepts either and only ever needs `Wᵀ · P`.
#[derive(Clone, Debug)]
pub enum BeamWeights {
    Dense(Array2<Complex64>),
    Sparse(CsMat<Complex64>),
}

impl BeamWeights {
    pub fn n_antenna(&self) -> usize {
        match self {
            BeamWeights::Dense(w) => w.nrows(),
            BeamWeights::Sparse(w) => w.rows(),
        }
    }

    pub fn n_beam(&self) -> usize {
        match self {
            BeamWeights::Dense(w) => w.ncols(),
            BeamWeights::Sparse(w) => w.cols(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, BeamWeights::Sparse(_))
    }

    pub fn to_dense(&self) -> Array2<Complex64> {
        match self {
            BeamWeights::Dense(w) => w.clone(),
            BeamWeights::Sparse(w) => {
                let mut dense = Array2::zeros((w.rows(), w.cols()));
                for (&value, (row, col)) in w.iter() {
                    dense[[row, col]] += value;
                }
                dense
            }
        }
    }

    /// `Wᵀ · P` for a (N_antenna, N) block of antenna-domain vectors, in the
    /// working precision `T`. Returns (N_beam, N).
    pub fn apply_transpose<T: Real>(&self, p: ArrayView2<'_, Complex<T>>) -> Result<Array2<Complex<T>>> {
        if p.nrows() != self.n_antenna() {
            return invalid(format!(
                "beamweights expect {} antennas, vector set has {} rows",
                self.n_antenna(),
                p.nrows()
            ));
        }
        match self {
            BeamWeights::Dense(w) => {
                let w = T::cast_complex(w.view());
                Ok(w.t().dot(&p))
            }
            BeamWeights::Sparse(w) => {
                let mut out = Array2::<Complex<T>>::zeros((w.cols(), p.ncols()));
                for (&value, (row, col)) in w.iter() {
                    out.row_mut(col)
                        .scaled_add(T::complex_from_f64(value), &p.row(row));
                }
                Ok(out)
            }
        }
    }
}

impl From<Array2<Complex64>> for BeamWeights {
    fn from(w: Array2<Complex64>) -> Self {
        BeamWeights::Dense(w)
    }
}

impl From<CsMat<Complex64>> for BeamWeights {
    fn from(w: CsMat<Complex64>) -> Self {
        BeamWeights::Sparse(w)
    }
}

/// Matched beamformer: every antenna of station `s` is phased towards
/// `direction` and summed into beam `s`.
///
/// `station_of[a]` is the station (beam) index of antenna `a`. Station
/// indices must be dense, i.e. cover `0..N_station` without gaps.
pub fn matched_beamformer(
    xyz: ArrayView2<'_, f64>,
    station_of: &[usize],
    direction: [f64; 3],
    wavelength: f64,
) -> Result<BeamWeights> {
    if !(wavelength > 0.0 && wavelength.is_finite()) {
        return invalid(format!("wavelength must be positive, got {wavelength}"));
    }
    if xyz.ncols() != 3 {
        return invalid(format!("XYZ must have 3 columns, got {}", xyz.ncols()));
    }
    if station_of.len() != xyz.nrows() {
        return invalid(format!(
            "station map has {} entries for {} antennas",
            station_of.len(),
            xyz.nrows()
        ));
    }
    let n_station = match station_of.iter().max() {
        Some(&max) => max + 1,
        None => return invalid("matched beamformer needs at least one antenna"),
    };
    let mut populated = vec![false; n_station];
    for &s in station_of {
        populated[s] = true;
    }
    if let Some(empty) = populated.iter().position(|&p| !p) {
        return invalid(format!("station {empty} has no antenna"));
    }

    let k = 2.0 * PI / wavelength;
    let mut tri = TriMat::<Complex64>::new((xyz.nrows(), n_station));
    for (a, pos) in xyz.axis_iter(Axis(0)).enumerate() {
        let projection = pos[0] * direction[0] + pos[1] * direction[1] + pos[2] * direction[2];
        tri.add_triplet(a, station_of[a], Complex::from_polar(1.0, -k * projection));
    }
    Ok(BeamWeights::Sparse(tri.to_csr()))
}
