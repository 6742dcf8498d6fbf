//! Floating-point width selection.
//!
//! The imager runs either in single or double precision. Inputs always arrive
//! as `f64` / `Complex<f64>` from the providers and are cast once at the top
//! of each call; in double precision the cast is a borrow.

use std::fmt::{Debug, Display};
use std::iter::Sum;
use std::ops::AddAssign;

use ndarray::{ArrayView, CowArray, Dimension, LinalgScalar, ScalarOperand};
use num_complex::Complex;
use num_traits::{Float, FromPrimitive};

use crate::error::{invalid, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Precision {
    Single,
    Double,
}

impl Precision {
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            32 => Ok(Precision::Single),
            64 => Ok(Precision::Double),
            other => invalid(format!("precision must be 32 or 64, got {other}")),
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Precision::Single => 32,
            Precision::Double => 64,
        }
    }
}

impl Default for Precision {
    fn default() -> Self {
        Precision::Double
    }
}

/// Working float type of the imaging kernels.
pub trait Real:
    Float
    + FromPrimitive
    + LinalgScalar
    + ScalarOperand
    + AddAssign
    + Sum
    + Send
    + Sync
    + Debug
    + Display
    + 'static
{
    const PRECISION: Precision;

    fn from_real(value: f64) -> Self;

    fn widen(self) -> f64;

    fn cast_reals<'a, D: Dimension>(a: ArrayView<'a, f64, D>) -> CowArray<'a, Self, D>;

    fn cast_complex<'a, D: Dimension>(
        a: ArrayView<'a, Complex<f64>, D>,
    ) -> CowArray<'a, Complex<Self>, D>;

    #[inline(always)]
    fn complex_from_f64(z: Complex<f64>) -> Complex<Self> {
        Complex::new(Self::from_real(z.re), Self::from_real(z.im))
    }
}

impl Real for f64 {
    const PRECISION: Precision = Precision::Double;

    #[inline(always)]
    fn from_real(value: f64) -> Self {
        value
    }

    #[inline(always)]
    fn widen(self) -> f64 {
        self
    }

    fn cast_reals<'a, D: Dimension>(a: ArrayView<'a, f64, D>) -> CowArray<'a, f64, D> {
        CowArray::from(a)
    }

    fn cast_complex<'a, D: Dimension>(
        a: ArrayView<'a, Complex<f64>, D>,
    ) -> CowArray<'a, Complex<f64>, D> {
        CowArray::from(a)
    }
}

impl Real for f32 {
    const PRECISION: Precision = Precision::Single;

    #[inline(always)]
    fn from_real(value: f64) -> Self {
        value as f32
    }

    #[inline(always)]
    fn widen(self) -> f64 {
        self as f64
    }

    fn cast_reals<'a, D: Dimension>(a: ArrayView<'a, f64, D>) -> CowArray<'a, f32, D> {
        CowArray::from(a.mapv(|x| x as f32))
    }

    fn cast_complex<'a, D: Dimension>(
        a: ArrayView<'a, Complex<f64>, D>,
    ) -> CowArray<'a, Complex<f32>, D> {
        CowArray::from(a.mapv(|z| Complex::new(z.re as f32, z.im as f32)))
    }
}
