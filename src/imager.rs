//! Integrating multi-field synthesizer.
//!
//! Every snapshot produces two estimators of the sky energy per level and
//! pixel: the standardized one (`|E|²` per eigenpair) and the least-squares
//! one (the same statistic weighted by the eigenvalue of its eigenpair). Both
//! are clustered into `N_level` energy levels and summed into a running
//! (2, N_level, N_px) total.

use std::sync::Arc;

use log::debug;
use ndarray::{stack, Array3, ArrayView1, ArrayView2, ArrayView3, Axis};
use num_complex::Complex64;

use crate::beamforming::BeamWeights;
use crate::cluster::cluster_layers;
use crate::error::{invalid, BluebildError, Result};
use crate::image::Image;
use crate::precision::{Precision, Real};
use crate::synthesizer::SpatialFieldSynthesizer;
use crate::timing::Timer;

const TAG_CALL: &str = "imager call";
const TAG_SYNTHESIS: &str = "image synthesis";
const TAG_CLUSTER: &str = "image cluster layers";
const TAG_UPDATE: &str = "image update iteration";

/// Running sum of per-snapshot field statistics.
///
/// Empty until the first contribution; afterwards every `add` is a single
/// in-place addition of an already-validated tensor.
#[derive(Clone, Debug)]
pub struct FieldAccumulator<T> {
    stat: Option<Array3<T>>,
}

impl<T> Default for FieldAccumulator<T> {
    fn default() -> Self {
        Self { stat: None }
    }
}

impl<T: Real> FieldAccumulator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.stat.is_some()
    }

    pub fn add(&mut self, contribution: ArrayView3<'_, T>) -> Result<()> {
        if let Some(acc) = self.stat.as_mut() {
            if acc.dim() != contribution.dim() {
                return invalid(format!(
                    "contribution of shape {:?} does not match accumulated {:?}",
                    contribution.dim(),
                    acc.dim()
                ));
            }
            *acc += &contribution;
            return Ok(());
        }
        self.stat = Some(contribution.to_owned());
        Ok(())
    }

    pub fn merge(&mut self, other: &FieldAccumulator<T>) -> Result<()> {
        match other.stat.as_ref() {
            Some(stat) => self.add(stat.view()),
            None => Ok(()),
        }
    }

    pub fn statistics(&self) -> Result<ArrayView3<'_, T>> {
        self.stat
            .as_ref()
            .map(|s| s.view())
            .ok_or(BluebildError::NotReady)
    }
}

/// Spatial-domain imager working in precision `T`.
pub struct SpatialImager<T: Real> {
    synthesizer: SpatialFieldSynthesizer<T>,
    n_level: usize,
    accumulator: FieldAccumulator<T>,
    timer: Option<Timer>,
}

impl<T: Real> SpatialImager<T> {
    pub fn new(wavelength: f64, pixel_grid: ArrayView2<'_, f64>, n_level: usize) -> Result<Self> {
        if n_level == 0 {
            return invalid("number of energy levels must be positive");
        }
        let synthesizer = SpatialFieldSynthesizer::new(wavelength, pixel_grid)?;
        debug!(
            "spatial imager: {} pixels, {} levels, {}-bit, wavelength {:.4} m",
            synthesizer.n_px(),
            n_level,
            T::PRECISION.bits(),
            wavelength
        );
        Ok(Self {
            synthesizer,
            n_level,
            accumulator: FieldAccumulator::new(),
            timer: None,
        })
    }

    pub fn n_level(&self) -> usize {
        self.n_level
    }

    pub fn n_px(&self) -> usize {
        self.synthesizer.n_px()
    }

    pub fn wavelength(&self) -> f64 {
        self.synthesizer.wavelength()
    }

    pub fn is_ready(&self) -> bool {
        self.accumulator.is_ready()
    }

    pub fn set_timer(&mut self, timer: Timer) {
        self.timer = Some(timer);
    }

    pub fn timer(&self) -> Option<&Timer> {
        self.timer.as_ref()
    }

    pub fn timer_mut(&mut self) -> Option<&mut Timer> {
        self.timer.as_mut()
    }

    pub fn take_timer(&mut self) -> Option<Timer> {
        self.timer.take()
    }

    fn mark(&mut self, tag: &str) {
        if let Some(timer) = self.timer.as_mut() {
            timer.start_time(tag);
        }
    }

    fn unmark(&mut self, tag: &str) {
        if let Some(timer) = self.timer.as_mut() {
            timer.end_time(tag);
        }
    }

    /// Synthesize one snapshot and add it to the running total.
    ///
    /// `d` holds the N_eig eigenvalues, `v` the (N_beam, N_eig) eigenvectors,
    /// `xyz` the (N_antenna, 3) antenna positions in the pixel-grid frame,
    /// `w` the (N_antenna, N_beam) beamweights and `cluster_idx` the level of
    /// each eigenpair. Returns this snapshot's (2, N_level, N_px) contribution.
    pub fn integrate(
        &mut self,
        d: ArrayView1<'_, f64>,
        v: ArrayView2<'_, Complex64>,
        xyz: ArrayView2<'_, f64>,
        w: &BeamWeights,
        cluster_idx: &[i64],
    ) -> Result<Array3<T>> {
        check_eigenpairs(d, v, cluster_idx)?;
        self.mark(TAG_CALL);
        let result = self.integrate_checked(d, v, xyz, w, cluster_idx);
        self.unmark(TAG_CALL);
        result
    }

    fn integrate_checked(
        &mut self,
        d: ArrayView1<'_, f64>,
        v: ArrayView2<'_, Complex64>,
        xyz: ArrayView2<'_, f64>,
        w: &BeamWeights,
        cluster_idx: &[i64],
    ) -> Result<Array3<T>> {
        let d = T::cast_reals(d);

        self.mark(TAG_SYNTHESIS);
        let stat_std = self.synthesizer.synthesize(v, xyz, w);
        self.unmark(TAG_SYNTHESIS);
        let stat_std = stat_std?;
        let stat_lsq = &stat_std * &d.view().insert_axis(Axis(1));
        let stat = stack(Axis(0), &[stat_std.view(), stat_lsq.view()])?;

        self.mark(TAG_CLUSTER);
        let clustered = cluster_layers(stat.view(), cluster_idx, self.n_level, Axis(1));
        self.unmark(TAG_CLUSTER);
        let clustered = clustered?;

        self.mark(TAG_UPDATE);
        let updated = self.accumulator.add(clustered.view());
        self.unmark(TAG_UPDATE);
        updated?;

        debug!(
            "integrated {} eigenpairs, level energy {}",
            d.len(),
            clustered.index_axis(Axis(0), 0).sum_axis(Axis(1))
        );
        Ok(clustered)
    }

    /// Accumulated (2, N_level, N_px) statistics.
    pub fn statistics(&self) -> Result<ArrayView3<'_, T>> {
        self.accumulator.statistics()
    }

    /// Standardized and least-squares images of everything integrated so far.
    pub fn as_image(&self) -> Result<(Image<T>, Image<T>)> {
        let stat = self.accumulator.statistics()?;
        let grid = Arc::clone(self.synthesizer.grid());
        let std = Image::new(stat.index_axis(Axis(0), 0).to_owned(), Arc::clone(&grid))?;
        let lsq = Image::new(stat.index_axis(Axis(0), 1).to_owned(), grid)?;
        Ok((std, lsq))
    }

    /// Add the accumulated state of `other` (e.g. another time or frequency
    /// shard) into this imager.
    pub fn merge(&mut self, other: &SpatialImager<T>) -> Result<()> {
        if other.n_level != self.n_level || other.n_px() != self.n_px() {
            return invalid(format!(
                "cannot merge {} levels x {} pixels into {} levels x {} pixels",
                other.n_level,
                other.n_px(),
                self.n_level,
                self.n_px()
            ));
        }
        self.accumulator.merge(&other.accumulator)
    }
}

fn check_eigenpairs(
    d: ArrayView1<'_, f64>,
    v: ArrayView2<'_, Complex64>,
    cluster_idx: &[i64],
) -> Result<()> {
    if d.len() != v.ncols() {
        return invalid(format!(
            "{} eigenvalues for {} eigenvectors",
            d.len(),
            v.ncols()
        ));
    }
    if cluster_idx.len() != d.len() {
        return invalid(format!(
            "{} cluster indices for {} eigenpairs",
            cluster_idx.len(),
            d.len()
        ));
    }
    if let Some(bad) = d.iter().position(|&x| !(x >= 0.0)) {
        return invalid(format!("eigenvalue {} is {}, must be non-negative", bad, d[bad]));
    }
    Ok(())
}

/// Construction parameters of an [`Imager`].
#[derive(Clone, Debug, PartialEq)]
pub struct ImagerConfig {
    /// Observing wavelength [m].
    pub wavelength: f64,
    pub n_level: usize,
    /// Float width in bits, 32 or 64.
    pub precision: u32,
}

impl ImagerConfig {
    pub fn new(wavelength: f64, n_level: usize) -> Self {
        Self {
            wavelength,
            n_level,
            precision: Precision::default().bits(),
        }
    }

    pub fn with_precision(mut self, bits: u32) -> Self {
        self.precision = bits;
        self
    }
}

/// Imager with its float width chosen at run time.
///
/// Results are handed out as `f64` whatever the working precision.
pub enum Imager {
    Single(SpatialImager<f32>),
    Double(SpatialImager<f64>),
}

macro_rules! dispatch {
    ($self:expr, $im:ident => $body:expr) => {
        match $self {
            Imager::Single($im) => $body,
            Imager::Double($im) => $body,
        }
    };
}

impl Imager {
    pub fn new(config: &ImagerConfig, pixel_grid: ArrayView2<'_, f64>) -> Result<Self> {
        let precision = Precision::from_bits(config.precision)?;
        Ok(match precision {
            Precision::Single => Imager::Single(SpatialImager::new(
                config.wavelength,
                pixel_grid,
                config.n_level,
            )?),
            Precision::Double => Imager::Double(SpatialImager::new(
                config.wavelength,
                pixel_grid,
                config.n_level,
            )?),
        })
    }

    pub fn precision(&self) -> Precision {
        match self {
            Imager::Single(_) => Precision::Single,
            Imager::Double(_) => Precision::Double,
        }
    }

    pub fn n_level(&self) -> usize {
        dispatch!(self, im => im.n_level())
    }

    pub fn n_px(&self) -> usize {
        dispatch!(self, im => im.n_px())
    }

    pub fn is_ready(&self) -> bool {
        dispatch!(self, im => im.is_ready())
    }

    pub fn integrate(
        &mut self,
        d: ArrayView1<'_, f64>,
        v: ArrayView2<'_, Complex64>,
        xyz: ArrayView2<'_, f64>,
        w: &BeamWeights,
        cluster_idx: &[i64],
    ) -> Result<Array3<f64>> {
        match self {
            Imager::Single(im) => Ok(im.integrate(d, v, xyz, w, cluster_idx)?.mapv(f64::from)),
            Imager::Double(im) => im.integrate(d, v, xyz, w, cluster_idx),
        }
    }

    pub fn statistics(&self) -> Result<Array3<f64>> {
        match self {
            Imager::Single(im) => Ok(im.statistics()?.mapv(f64::from)),
            Imager::Double(im) => Ok(im.statistics()?.to_owned()),
        }
    }

    pub fn as_image(&self) -> Result<(Image<f64>, Image<f64>)> {
        match self {
            Imager::Single(im) => {
                let (std, lsq) = im.as_image()?;
                Ok((std.to_f64(), lsq.to_f64()))
            }
            Imager::Double(im) => im.as_image(),
        }
    }

    pub fn merge(&mut self, other: &Imager) -> Result<()> {
        match (self, other) {
            (Imager::Single(a), Imager::Single(b)) => a.merge(b),
            (Imager::Double(a), Imager::Double(b)) => a.merge(b),
            _ => invalid("cannot merge imagers of different precision"),
        }
    }

    pub fn set_timer(&mut self, timer: Timer) {
        dispatch!(self, im => im.set_timer(timer))
    }

    pub fn timer(&self) -> Option<&Timer> {
        dispatch!(self, im => im.timer())
    }

    pub fn timer_mut(&mut self) -> Option<&mut Timer> {
        dispatch!(self, im => im.timer_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldAccumulator, Imager, ImagerConfig, SpatialImager};
    use crate::beamforming::BeamWeights;
    use crate::error::BluebildError;
    use crate::precision::Precision;
    use crate::synthesizer::SpatialFieldSynthesizer;
    use crate::timing::Timer;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1, Array2, Array3};
    use num_complex::Complex64;

    fn grid() -> Array2<f64> {
        Array2::from_shape_fn((3, 5), |(i, p)| {
            let theta = 0.2 * p as f64 - 0.4;
            match i {
                0 => theta.sin(),
                1 => 0.1 * theta,
                _ => theta.cos(),
            }
        })
    }

    fn xyz() -> Array2<f64> {
        array![[0.0, 0.0, 0.0], [0.7, 0.2, 0.0], [-0.3, 0.9, 0.1]]
    }

    fn identity(n: usize) -> BeamWeights {
        BeamWeights::Dense(Array2::from_shape_fn((n, n), |(i, j)| {
            Complex64::new(if i == j { 1.0 } else { 0.0 }, 0.0)
        }))
    }

    fn eigenvectors(n_eig: usize) -> Array2<Complex64> {
        Array2::from_shape_fn((3, n_eig), |(b, k)| {
            Complex64::new(0.3 + 0.2 * (b + k) as f64, 0.1 * b as f64 - 0.25 * k as f64)
        })
    }

    #[test]
    fn scenario_two_levels_one_eigenpair_each() {
        let g = grid();
        let mut imager = SpatialImager::<f64>::new(1.0, g.view(), 2).unwrap();
        let v = eigenvectors(2);
        let d = array![1.0, 2.0];
        let out = imager
            .integrate(d.view(), v.view(), xyz().view(), &identity(3), &[0, 1])
            .unwrap();
        assert_eq!(out.dim(), (2, 2, 5));

        let synth = SpatialFieldSynthesizer::<f64>::new(1.0, g.view()).unwrap();
        let raw = synth.synthesize(v.view(), xyz().view(), &identity(3)).unwrap();
        for p in 0..5 {
            assert_relative_eq!(out[[0, 0, p]], raw[[0, p]], epsilon = 1e-12);
            assert_relative_eq!(out[[0, 1, p]], raw[[1, p]], epsilon = 1e-12);
            assert_relative_eq!(out[[1, 0, p]], raw[[0, p]], epsilon = 1e-12);
            assert_relative_eq!(out[[1, 1, p]], 2.0 * raw[[1, p]], epsilon = 1e-12);
        }
        assert_eq!(imager.statistics().unwrap(), out.view());
    }

    #[test]
    fn least_squares_scales_each_eigenpair_by_its_eigenvalue() {
        // Both eigenpairs fall in one level: lsq = 3 I_0 + 0.5 I_1 per pixel.
        let g = grid();
        let mut imager = SpatialImager::<f64>::new(1.0, g.view(), 1).unwrap();
        let v = eigenvectors(2);
        let out = imager
            .integrate(array![3.0, 0.5].view(), v.view(), xyz().view(), &identity(3), &[0, 0])
            .unwrap();
        let synth = SpatialFieldSynthesizer::<f64>::new(1.0, g.view()).unwrap();
        let raw = synth.synthesize(v.view(), xyz().view(), &identity(3)).unwrap();
        for p in 0..5 {
            assert_relative_eq!(out[[0, 0, p]], raw[[0, p]] + raw[[1, p]], epsilon = 1e-12);
            assert_relative_eq!(
                out[[1, 0, p]],
                3.0 * raw[[0, p]] + 0.5 * raw[[1, p]],
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn reading_before_first_snapshot_is_not_ready() {
        let imager = SpatialImager::<f32>::new(1.0, grid().view(), 3).unwrap();
        assert!(matches!(imager.as_image(), Err(BluebildError::NotReady)));
        assert!(matches!(imager.statistics(), Err(BluebildError::NotReady)));
        assert!(!imager.is_ready());
    }

    #[test]
    fn construction_rejects_bad_configuration() {
        let g = grid();
        assert!(matches!(
            Imager::new(&ImagerConfig::new(1.0, 0), g.view()),
            Err(BluebildError::InvalidArgument(_))
        ));
        assert!(matches!(
            Imager::new(&ImagerConfig::new(1.0, 2).with_precision(16), g.view()),
            Err(BluebildError::InvalidArgument(_))
        ));
        assert!(Imager::new(&ImagerConfig::new(-1.0, 2), g.view()).is_err());
        let single = Imager::new(&ImagerConfig::new(1.0, 2).with_precision(32), g.view()).unwrap();
        assert_eq!(single.precision(), Precision::Single);
        assert_eq!(ImagerConfig::new(1.0, 2).precision, 64);
    }

    #[test]
    fn rejects_inconsistent_eigenpairs_without_touching_state() {
        let mut imager = SpatialImager::<f64>::new(1.0, grid().view(), 2).unwrap();
        let v = eigenvectors(2);
        let w = identity(3);
        let x = xyz();
        imager.integrate(array![1.0, 2.0].view(), v.view(), x.view(), &w, &[0, 1]).unwrap();
        let before = imager.statistics().unwrap().to_owned();

        // negative and NaN eigenvalues
        assert!(imager.integrate(array![1.0, -2.0].view(), v.view(), x.view(), &w, &[0, 1]).is_err());
        assert!(imager
            .integrate(array![f64::NAN, 2.0].view(), v.view(), x.view(), &w, &[0, 1])
            .is_err());
        // D / V / cluster length mismatches
        assert!(imager.integrate(array![1.0].view(), v.view(), x.view(), &w, &[0]).is_err());
        assert!(imager.integrate(array![1.0, 2.0].view(), v.view(), x.view(), &w, &[0]).is_err());
        // geometry mismatch detected by the synthesizer
        assert!(imager
            .integrate(array![1.0, 2.0].view(), v.view(), x.view(), &identity(2), &[0, 1])
            .is_err());

        assert_eq!(imager.statistics().unwrap(), before.view());
    }

    #[test]
    fn eigenpair_count_may_vary_between_snapshots() {
        let mut imager = SpatialImager::<f64>::new(1.0, grid().view(), 2).unwrap();
        let w = identity(3);
        let x = xyz();
        let a = imager
            .integrate(array![1.0, 0.5, 0.2].view(), eigenvectors(3).view(), x.view(), &w, &[0, 1, -1])
            .unwrap();
        let b = imager
            .integrate(array![4.0].view(), eigenvectors(1).view(), x.view(), &w, &[1])
            .unwrap();
        assert!(b.index_axis(ndarray::Axis(1), 0).iter().all(|&e| e == 0.0));
        let total = imager.statistics().unwrap();
        assert_eq!(total.dim(), (2, 2, 5));
        for (t, (x, y)) in total.iter().zip(a.iter().zip(b.iter())) {
            assert_relative_eq!(*t, x + y, epsilon = 1e-12);
        }
    }

    #[test]
    fn as_image_is_read_only() {
        let mut imager = SpatialImager::<f64>::new(1.0, grid().view(), 2).unwrap();
        imager
            .integrate(array![1.0, 2.0].view(), eigenvectors(2).view(), xyz().view(), &identity(3), &[0, 1])
            .unwrap();
        let (std1, lsq1) = imager.as_image().unwrap();
        let (std2, lsq2) = imager.as_image().unwrap();
        assert_eq!(std1.data(), std2.data());
        assert_eq!(lsq1.data(), lsq2.data());
        assert_eq!(std1.n_level(), 2);
        assert_eq!(std1.grid(), grid().view());
    }

    #[test]
    fn accumulator_checks_contribution_shape() {
        let mut acc = FieldAccumulator::<f64>::new();
        acc.add(Array3::zeros((2, 2, 5)).view()).unwrap();
        assert!(acc.add(Array3::zeros((2, 3, 5)).view()).is_err());
        acc.merge(&FieldAccumulator::new()).unwrap();
        assert_eq!(acc.statistics().unwrap().dim(), (2, 2, 5));
    }

    #[test]
    fn merge_adds_shards_and_checks_layout() {
        let g = grid();
        let w = identity(3);
        let x = xyz();
        let d = array![1.0, 2.0];
        let v = eigenvectors(2);

        let mut whole = SpatialImager::<f64>::new(1.0, g.view(), 2).unwrap();
        let mut left = SpatialImager::<f64>::new(1.0, g.view(), 2).unwrap();
        let mut right = SpatialImager::<f64>::new(1.0, g.view(), 2).unwrap();
        whole.integrate(d.view(), v.view(), x.view(), &w, &[0, 1]).unwrap();
        whole.integrate(d.view(), v.view(), x.view(), &w, &[1, 1]).unwrap();
        left.integrate(d.view(), v.view(), x.view(), &w, &[0, 1]).unwrap();
        right.integrate(d.view(), v.view(), x.view(), &w, &[1, 1]).unwrap();

        let mut empty = SpatialImager::<f64>::new(1.0, g.view(), 2).unwrap();
        empty.merge(&left).unwrap();
        empty.merge(&right).unwrap();
        for (a, b) in empty.statistics().unwrap().iter().zip(whole.statistics().unwrap().iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }

        let three = SpatialImager::<f64>::new(1.0, g.view(), 3).unwrap();
        assert!(empty.merge(&three).is_err());

        let mut single = Imager::new(&ImagerConfig::new(1.0, 2).with_precision(32), g.view()).unwrap();
        let double = Imager::new(&ImagerConfig::new(1.0, 2), g.view()).unwrap();
        assert!(single.merge(&double).is_err());
    }

    #[test]
    fn timer_records_imager_sections() {
        let mut imager = Imager::new(&ImagerConfig::new(1.0, 2), grid().view()).unwrap();
        imager.set_timer(Timer::new());
        let d: Array1<f64> = array![1.0, 2.0];
        for _ in 0..2 {
            imager
                .integrate(d.view(), eigenvectors(2).view(), xyz().view(), &identity(3), &[0, 1])
                .unwrap();
        }
        let timer = imager.timer().unwrap();
        assert_eq!(
            timer.names(),
            vec![
                "imager call",
                "image synthesis",
                "image cluster layers",
                "image update iteration"
            ]
        );
        assert_eq!(timer.calls("imager call"), 2);
        assert_eq!(timer.calls("image update iteration"), 2);
    }

    #[test]
    fn single_precision_tracks_double() {
        let g = grid();
        let mut single = Imager::new(&ImagerConfig::new(1.3, 2).with_precision(32), g.view()).unwrap();
        let mut double = Imager::new(&ImagerConfig::new(1.3, 2), g.view()).unwrap();
        let d = array![1.5, 0.25];
        for im in [&mut single, &mut double] {
            im.integrate(d.view(), eigenvectors(2).view(), xyz().view(), &identity(3), &[0, 1])
                .unwrap();
        }
        let (s, _) = single.as_image().unwrap();
        let (t, _) = double.as_image().unwrap();
        for (a, b) in s.data().iter().zip(t.data().iter()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-5, epsilon = 1e-6);
        }
    }
}
