//! # Numeric Module
//!
//! Precision-aware scalar arithmetic for the steady-state solver.
//!
//! Rate constants routinely span forty or more orders of magnitude, so the solver
//! is written against the [`Numeric`] trait rather than a concrete float type.
//! Two backends are provided:
//!
//! - [`f64`] - fast double precision. Ill-conditioned systems may report false
//!   convergence or diverge under this backend.
//! - [`Decimal`] - arbitrary-precision decimal arithmetic carrying a fixed number
//!   of significant digits plus [`Precision::GUARD_DIGITS`] guard digits.
//!
//! The backend is selected once, at configuration time, via [`NumericBackend`].

mod decimal;
pub mod linalg;

pub use decimal::Decimal;

use std::ops::{Add, Mul, Neg, Sub};

/// Number of significant decimal digits carried by arbitrary-precision values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Precision {
    digits: u32,
}

impl Precision {
    pub const DEFAULT_DIGITS: u32 = 50;
    pub const GUARD_DIGITS: u32 = 10;
    /// Upper bound keeps working precision below the 100-digit division context.
    pub const MAX_DIGITS: u32 = 90;

    pub fn new(digits: u32) -> Self {
        Self { digits }
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    /// Requested digits plus guard digits; intermediate results are rounded to this.
    pub fn working_digits(&self) -> u32 {
        self.digits + Self::GUARD_DIGITS
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIGITS)
    }
}

/// Selects the arithmetic used by the solver and evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericBackend {
    Double,
    Decimal { digits: u32 },
}

impl NumericBackend {
    pub fn precision(&self) -> Precision {
        match self {
            NumericBackend::Double => Precision::default(),
            NumericBackend::Decimal { digits } => Precision::new(*digits),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NumericBackend::Double => <f64 as Numeric>::NAME,
            NumericBackend::Decimal { .. } => <Decimal as Numeric>::NAME,
        }
    }
}

impl Default for NumericBackend {
    fn default() -> Self {
        NumericBackend::Decimal {
            digits: Precision::DEFAULT_DIGITS,
        }
    }
}

/// Scalar abstraction the rate equations and Newton solver are written against.
///
/// Division is only exposed through [`Numeric::checked_div`] so that a zero pivot
/// surfaces as `None` instead of a panic or an infinity.
pub trait Numeric:
    nalgebra::Scalar
    + PartialOrd
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
{
    const NAME: &'static str;

    /// Converts a double, returning `None` for non-finite input.
    fn from_f64(value: f64, precision: Precision) -> Option<Self>;

    /// Exact conversion of a small integer such as a stoichiometric coefficient.
    fn from_i64(value: i64, precision: Precision) -> Self;

    fn zero(precision: Precision) -> Self;

    fn one(precision: Precision) -> Self;

    fn to_f64(&self) -> f64;

    fn abs(&self) -> Self;

    fn is_zero(&self) -> bool;

    fn is_finite(&self) -> bool;

    fn checked_div(&self, rhs: &Self) -> Option<Self>;

    /// Integer power by repeated multiplication; `x^0` is one at the precision of `x`.
    fn powi(&self, exponent: u32) -> Self;

    /// Full-precision textual form, suitable for export.
    fn to_repr(&self) -> String;
}

impl Numeric for f64 {
    const NAME: &'static str = "double";

    fn from_f64(value: f64, _precision: Precision) -> Option<Self> {
        value.is_finite().then_some(value)
    }

    fn from_i64(value: i64, _precision: Precision) -> Self {
        value as f64
    }

    fn zero(_precision: Precision) -> Self {
        0.0
    }

    fn one(_precision: Precision) -> Self {
        1.0
    }

    fn to_f64(&self) -> f64 {
        *self
    }

    fn abs(&self) -> Self {
        f64::abs(*self)
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }

    fn is_finite(&self) -> bool {
        f64::is_finite(*self)
    }

    fn checked_div(&self, rhs: &Self) -> Option<Self> {
        if *rhs == 0.0 {
            return None;
        }
        let quotient = self / rhs;
        quotient.is_finite().then_some(quotient)
    }

    fn powi(&self, exponent: u32) -> Self {
        f64::powi(*self, exponent as i32)
    }

    fn to_repr(&self) -> String {
        format!("{:e}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_digits_include_guard_digits() {
        let precision = Precision::new(50);
        assert_eq!(precision.working_digits(), 60);
    }

    #[test]
    fn default_backend_is_fifty_digit_decimal() {
        assert_eq!(
            NumericBackend::default(),
            NumericBackend::Decimal { digits: 50 }
        );
        assert_eq!(NumericBackend::default().precision().digits(), 50);
    }

    #[test]
    fn double_rejects_non_finite_input() {
        let precision = Precision::default();
        assert_eq!(<f64 as Numeric>::from_f64(f64::NAN, precision), None);
        assert_eq!(<f64 as Numeric>::from_f64(f64::INFINITY, precision), None);
        assert_eq!(<f64 as Numeric>::from_f64(2.5, precision), Some(2.5));
    }

    #[test]
    fn double_checked_div_by_zero_returns_none() {
        assert_eq!(Numeric::checked_div(&1.0_f64, &0.0), None);
        assert_eq!(Numeric::checked_div(&1.0_f64, &4.0), Some(0.25));
    }

    #[test]
    fn double_powi_of_zero_exponent_is_one() {
        assert_eq!(Numeric::powi(&3.0_f64, 0), 1.0);
        assert_eq!(Numeric::powi(&3.0_f64, 3), 27.0);
    }
}
