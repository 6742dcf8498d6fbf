//! Eigen-decomposition and energy-level assignment of visibility matrices.
//!
//! This is the provider side of the imager: it turns a Hermitian (N_beam,
//! N_beam) visibility matrix into the eigenpairs `(D, V)` and cluster indices
//! that `SpatialImager::integrate` consumes.

use log::debug;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView2};
use num_complex::Complex64;

use crate::error::{invalid, BluebildError, Result};

const KMEANS_MAX_ITER: usize = 100;

// Eigenvalues below this fraction of the spectral radius count as zero.
const RELATIVE_FLOOR: f64 = 1e-12;

/// The `n_eig` largest strictly positive eigenpairs of a Hermitian matrix,
/// eigenvalues in descending order. `s` is symmetrised as (S + Sᴴ)/2 first.
///
/// Fewer than `n_eig` pairs come back when the matrix has fewer positive
/// eigenvalues.
pub fn eigh(s: ArrayView2<'_, Complex64>, n_eig: usize) -> Result<(Array1<f64>, Array2<Complex64>)> {
    let n = s.nrows();
    if n == 0 || s.ncols() != n {
        return invalid(format!("visibility matrix must be square, got {:?}", s.dim()));
    }
    if n_eig == 0 {
        return invalid("number of eigenpairs must be positive");
    }
    if s.iter().any(|z| !(z.re.is_finite() && z.im.is_finite())) {
        return invalid("visibility matrix holds non-finite entries");
    }

    let hermitian = DMatrix::from_fn(n, n, |i, j| (s[[i, j]] + s[[j, i]].conj()) * 0.5);
    let eigen = SymmetricEigen::try_new(hermitian, f64::EPSILON, 0)
        .ok_or_else(|| BluebildError::InvalidArgument("eigen-decomposition did not converge".into()))?;

    let scale = eigen.eigenvalues.iter().fold(0.0f64, |m, &x| m.max(x.abs()));
    let floor = scale * RELATIVE_FLOOR;
    let mut order: Vec<usize> = (0..n).filter(|&i| eigen.eigenvalues[i] > floor).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
    order.truncate(n_eig);

    let d = Array1::from_shape_fn(order.len(), |k| eigen.eigenvalues[order[k]]);
    let v = Array2::from_shape_fn((n, order.len()), |(i, k)| eigen.eigenvectors[(i, order[k])]);
    Ok((d, v))
}

fn nearest(value: f64, centroids: &[f64]) -> i64 {
    let mut best = 0;
    for (c, &centre) in centroids.iter().enumerate() {
        if (value - centre).abs() < (value - centroids[best]).abs() {
            best = c;
        }
    }
    best as i64
}

/// Per-snapshot eigenpair extraction with nearest-centroid level assignment.
#[derive(Clone, Debug)]
pub struct IntensityFieldDataProcessor {
    n_eig: usize,
    centroids: Vec<f64>,
}

impl IntensityFieldDataProcessor {
    pub fn new(n_eig: usize, centroids: Vec<f64>) -> Result<Self> {
        if n_eig == 0 {
            return invalid("number of eigenpairs must be positive");
        }
        if centroids.is_empty() {
            return invalid("at least one energy-level centroid is required");
        }
        Ok(Self { n_eig, centroids })
    }

    pub fn n_eig(&self) -> usize {
        self.n_eig
    }

    pub fn centroids(&self) -> &[f64] {
        &self.centroids
    }

    /// `(D, V, cluster_idx)` of one visibility matrix.
    pub fn process(
        &self,
        s: ArrayView2<'_, Complex64>,
    ) -> Result<(Array1<f64>, Array2<Complex64>, Vec<i64>)> {
        let (d, v) = eigh(s, self.n_eig)?;
        let cluster_idx = d.iter().map(|&x| nearest(x, &self.centroids)).collect();
        Ok((d, v, cluster_idx))
    }
}

/// Infers `N_eig` and the energy-level centroids from a calibration pass.
#[derive(Clone, Debug)]
pub struct ParameterEstimator {
    n_level: usize,
    sigma: f64,
    n_beam: usize,
    spectra: Vec<Vec<f64>>,
}

impl ParameterEstimator {
    /// `sigma` is the fraction of each snapshot's energy the kept eigenpairs
    /// must capture, in (0, 1].
    pub fn new(n_level: usize, sigma: f64) -> Result<Self> {
        if n_level == 0 {
            return invalid("number of energy levels must be positive");
        }
        if !(sigma > 0.0 && sigma <= 1.0) {
            return invalid(format!("sigma must lie in (0, 1], got {sigma}"));
        }
        Ok(Self {
            n_level,
            sigma,
            n_beam: 0,
            spectra: Vec::new(),
        })
    }

    pub fn collect(&mut self, s: ArrayView2<'_, Complex64>) -> Result<()> {
        let (d, _) = eigh(s, s.nrows().max(1))?;
        self.n_beam = self.n_beam.max(s.nrows());
        self.spectra.push(d.to_vec());
        Ok(())
    }

    pub fn n_collected(&self) -> usize {
        self.spectra.len()
    }

    /// `(n_eig, centroids)`, centroids in descending order.
    pub fn infer_parameters(&self) -> Result<(usize, Vec<f64>)> {
        if self.spectra.is_empty() {
            return Err(BluebildError::NotReady);
        }

        let n_eig = self
            .spectra
            .iter()
            .map(|d| leading_count(d, self.sigma))
            .max()
            .unwrap_or(0)
            .max(self.n_level)
            .min(self.n_beam);

        let samples: Vec<f64> = self
            .spectra
            .iter()
            .flat_map(|d| d.iter().take(n_eig).map(|x| x.ln()))
            .collect();
        if samples.is_empty() {
            return invalid("calibration snapshots hold no positive eigenvalue");
        }

        let mut centroids: Vec<f64> = kmeans_1d(&samples, self.n_level)
            .into_iter()
            .map(f64::exp)
            .collect();
        centroids.sort_by(|a, b| b.total_cmp(a));
        debug!(
            "inferred N_eig = {n_eig} from {} snapshots, centroids {centroids:?}",
            self.spectra.len()
        );
        Ok((n_eig, centroids))
    }
}

// Leading eigenvalues of a descending spectrum needed to reach `sigma` of the
// total energy.
fn leading_count(d: &[f64], sigma: f64) -> usize {
    let total: f64 = d.iter().sum();
    let mut acc = 0.0;
    for (k, &x) in d.iter().enumerate() {
        acc += x;
        if acc >= sigma * total {
            return k + 1;
        }
    }
    d.len()
}

// Lloyd iterations on the line, seeded at evenly spaced order statistics.
fn kmeans_1d(samples: &[f64], k: usize) -> Vec<f64> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let last = sorted.len() - 1;
    let mut centres: Vec<f64> = (0..k)
        .map(|i| {
            if k == 1 {
                sorted[last / 2]
            } else {
                sorted[i * last / (k - 1)]
            }
        })
        .collect();

    for _ in 0..KMEANS_MAX_ITER {
        let mut sum = vec![0.0; k];
        let mut count = vec![0usize; k];
        for &x in &sorted {
            let c = nearest(x, &centres) as usize;
            sum[c] += x;
            count[c] += 1;
        }
        let mut moved = false;
        for c in 0..k {
            if count[c] > 0 {
                let updated = sum[c] / count[c] as f64;
                moved |= (updated - centres[c]).abs() > 1e-12;
                centres[c] = updated;
            }
        }
        if !moved {
            break;
        }
    }
    centres
}
