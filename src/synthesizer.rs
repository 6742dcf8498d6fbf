//! Spatial-domain field synthesis.
//!
//! For one snapshot the synthesizer evaluates, at every pixel direction `r`,
//! the energy each eigenpair deposits through the instrument:
//!
//! ```text
//! P[a, r] = exp(j 2π/λ <p_a - p̄, r>)      antenna phase screen
//! E[k, r] = Σ_b V[b, k] Σ_a W[a, b] P[a, r]  (Vᵀ Wᵀ P)
//! I[k, r] = |E[k, r]|²
//! ```
//!
//! Antenna positions are centred on their centroid first; this only changes
//! the global phase of each row of `E` and keeps the phase arguments small.

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{Array2, ArrayView2, Axis, Zip};
use num_complex::{Complex, Complex64};

use crate::beamforming::BeamWeights;
use crate::error::{invalid, Result};
use crate::precision::Real;

pub struct SpatialFieldSynthesizer<T: Real> {
    wavelength: f64,
    grid: Arc<Array2<T>>,
}

impl<T: Real> SpatialFieldSynthesizer<T> {
    /// `pixel_grid` is (3, N_px) Cartesian pixel directions.
    pub fn new(wavelength: f64, pixel_grid: ArrayView2<'_, f64>) -> Result<Self> {
        if !(wavelength > 0.0 && wavelength.is_finite()) {
            return invalid(format!("wavelength must be positive, got {wavelength}"));
        }
        if pixel_grid.nrows() != 3 {
            return invalid(format!(
                "pixel grid must have shape (3, N_px), got {:?}",
                pixel_grid.dim()
            ));
        }
        if pixel_grid.ncols() == 0 {
            return invalid("pixel grid is empty");
        }
        let grid = T::cast_reals(pixel_grid).into_owned();
        Ok(Self {
            wavelength,
            grid: Arc::new(grid),
        })
    }

    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    pub fn grid(&self) -> &Arc<Array2<T>> {
        &self.grid
    }

    pub fn n_px(&self) -> usize {
        self.grid.ncols()
    }

    /// Field energy per eigenpair and pixel, (N_eig, N_px).
    ///
    /// `v` is (N_beam, N_eig), `xyz` is (N_antenna, 3) in the frame of the
    /// pixel grid and `w` is (N_antenna, N_beam).
    pub fn synthesize(
        &self,
        v: ArrayView2<'_, Complex64>,
        xyz: ArrayView2<'_, f64>,
        w: &BeamWeights,
    ) -> Result<Array2<T>> {
        check_inputs(v, xyz, w)?;

        let v = T::cast_complex(v);
        let xyz = T::cast_reals(xyz);

        let centroid = match xyz.mean_axis(Axis(0)) {
            Some(c) => c,
            None => return invalid("instrument geometry is empty"),
        };
        let centred = &xyz - &centroid.insert_axis(Axis(0));
        let phase = centred.dot(&*self.grid);

        let k = T::from_real(2.0 * PI / self.wavelength);
        let mut screen = Array2::<Complex<T>>::zeros(phase.raw_dim());
        Zip::from(&mut screen)
            .and(&phase)
            .par_for_each(|p, &arg| *p = Complex::from_polar(T::one(), k * arg));

        let beamformed = w.apply_transpose(screen.view())?;
        let field = v.t().dot(&beamformed);

        let mut energy = Array2::<T>::zeros(field.raw_dim());
        Zip::from(&mut energy)
            .and(&field)
            .par_for_each(|e, z| *e = z.norm_sqr());
        Ok(energy)
    }
}

fn check_inputs(
    v: ArrayView2<'_, Complex64>,
    xyz: ArrayView2<'_, f64>,
    w: &BeamWeights,
) -> Result<()> {
    if xyz.ncols() != 3 {
        return invalid(format!(
            "XYZ must have shape (N_antenna, 3), got {:?}",
            xyz.dim()
        ));
    }
    if xyz.nrows() == 0 {
        return invalid("XYZ holds no antenna");
    }
    if w.n_antenna() != xyz.nrows() {
        return invalid(format!(
            "XYZ has {} antennas but W has {} rows",
            xyz.nrows(),
            w.n_antenna()
        ));
    }
    if v.nrows() != w.n_beam() {
        return invalid(format!(
            "V has {} rows but W forms {} beams",
            v.nrows(),
            w.n_beam()
        ));
    }
    Ok(())
}
