use super::{Numeric, Precision};
use bigdecimal::BigDecimal;
use num_traits::{One, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

/// Arbitrary-precision decimal rounded to a fixed number of significant digits.
///
/// Every arithmetic result is rounded to the larger working precision of its
/// operands, so values created under one [`Precision`] stay at that precision
/// throughout a solve.
#[derive(Debug, Clone)]
pub struct Decimal {
    value: BigDecimal,
    digits: u32,
}

impl Decimal {
    fn rounded(value: BigDecimal, digits: u32) -> Self {
        Self {
            value: value.with_prec(u64::from(digits)),
            digits,
        }
    }

    pub fn as_big_decimal(&self) -> &BigDecimal {
        &self.value
    }

    /// Parses a decimal literal at the given precision.
    pub fn parse(text: &str, precision: Precision) -> Option<Self> {
        BigDecimal::from_str(text.trim())
            .ok()
            .map(|value| Self::rounded(value, precision.working_digits()))
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Add for Decimal {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        let digits = self.digits.max(rhs.digits);
        Self::rounded(self.value + rhs.value, digits)
    }
}

impl Sub for Decimal {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        let digits = self.digits.max(rhs.digits);
        Self::rounded(self.value - rhs.value, digits)
    }
}

impl Mul for Decimal {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        let digits = self.digits.max(rhs.digits);
        Self::rounded(self.value * rhs.value, digits)
    }
}

impl Neg for Decimal {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self {
            value: -self.value,
            digits: self.digits,
        }
    }
}

impl Numeric for Decimal {
    const NAME: &'static str = "decimal";

    fn from_f64(value: f64, precision: Precision) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        // Shortest round-trip form keeps literals like 0.1 exact in decimal.
        Self::parse(&format!("{:e}", value), precision)
    }

    fn from_i64(value: i64, precision: Precision) -> Self {
        Self::rounded(BigDecimal::from(value), precision.working_digits())
    }

    fn zero(precision: Precision) -> Self {
        Self {
            value: BigDecimal::zero(),
            digits: precision.working_digits(),
        }
    }

    fn one(precision: Precision) -> Self {
        Self {
            value: BigDecimal::one(),
            digits: precision.working_digits(),
        }
    }

    fn to_f64(&self) -> f64 {
        self.value.to_f64().unwrap_or(f64::NAN)
    }

    fn abs(&self) -> Self {
        Self {
            value: self.value.abs(),
            digits: self.digits,
        }
    }

    fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    fn is_finite(&self) -> bool {
        true
    }

    fn checked_div(&self, rhs: &Self) -> Option<Self> {
        if rhs.value.is_zero() {
            return None;
        }
        let digits = self.digits.max(rhs.digits);
        Some(Self::rounded(&self.value / &rhs.value, digits))
    }

    fn powi(&self, exponent: u32) -> Self {
        let mut result = Self {
            value: BigDecimal::one(),
            digits: self.digits,
        };
        for _ in 0..exponent {
            result = result * self.clone();
        }
        result
    }

    fn to_repr(&self) -> String {
        self.value.with_prec(u64::from(self.digits)).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: f64) -> Decimal {
        Decimal::from_f64(value, Precision::new(50)).unwrap()
    }

    #[test]
    fn from_f64_uses_shortest_decimal_form() {
        let tenth = dec(0.1);
        assert_eq!(tenth, Decimal::parse("0.1", Precision::new(50)).unwrap());
    }

    #[test]
    fn from_f64_rejects_non_finite_values() {
        assert!(Decimal::from_f64(f64::NAN, Precision::default()).is_none());
        assert!(Decimal::from_f64(f64::NEG_INFINITY, Precision::default()).is_none());
    }

    #[test]
    fn tiny_values_survive_addition_to_large_ones_within_precision() {
        let big = dec(1.0);
        let tiny = dec(1e-40);
        let sum = big.clone() + tiny;
        let difference = sum - big;
        assert_eq!(difference, dec(1e-40));
    }

    #[test]
    fn values_below_double_range_are_representable() {
        let a = dec(1e-200);
        let product = a.clone() * a;
        assert!(!product.is_zero());
        assert!(product > dec(0.0));
    }

    #[test]
    fn division_rounds_to_working_precision() {
        let third = dec(1.0).checked_div(&dec(3.0)).unwrap();
        let error = (third * dec(3.0) - dec(1.0)).abs();
        assert!(error < dec(1e-55));
        assert!(!error.is_zero());
    }

    #[test]
    fn from_i64_is_exact() {
        let two = Decimal::from_i64(-2, Precision::new(50));
        assert_eq!(two, dec(-2.0));
    }

    #[test]
    fn checked_div_by_zero_returns_none() {
        assert!(dec(1.0).checked_div(&dec(0.0)).is_none());
    }

    #[test]
    fn powi_matches_repeated_multiplication() {
        assert_eq!(dec(2.0).powi(10), dec(1024.0));
        assert_eq!(dec(7.0).powi(0), dec(1.0));
    }

    #[test]
    fn ordering_and_abs_behave_like_reals() {
        assert!(dec(-2.0) < dec(1.0));
        assert_eq!(dec(-2.0).abs(), dec(2.0));
        assert_eq!(-dec(2.0), dec(-2.0));
    }
}
