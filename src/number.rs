use core::f64;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

/// Dual-representation numeric value: integers stay exact until an
/// operation mixes in a float, at which point the result is promoted.
#[derive(Debug, Clone, PartialEq, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(n) => *n as f64,
            Number::Float(f) => *f,
        }
    }

    /// Returns `true` if the number is zero or very close to zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Number::Int(n) => *n == 0,
            Number::Float(f) => f.abs() < f64::EPSILON,
        }
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Number::Float(f) if f.is_nan())
    }

    pub fn abs(&self) -> Self {
        match self {
            Number::Int(n) => Number::Int(n.wrapping_abs()),
            Number::Float(f) => Number::Float(f.abs()),
        }
    }
}

impl Default for Number {
    fn default() -> Self {
        Number::Int(0)
    }
}

impl Neg for Number {
    type Output = Self;

    fn neg(self) -> Self::Output {
        match self {
            Number::Int(n) => Number::Int(n.wrapping_neg()),
            Number::Float(f) => Number::Float(-f),
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Int(value)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{}", n),
            Number::Float(value) => {
                if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                    write!(f, "{}", *value as i64)
                } else {
                    let s = format!("{:.6}", value);
                    let s = s.trim_end_matches('0').trim_end_matches('.');
                    // Magnitudes below the fixed precision would collapse
                    // to zero; print them exactly instead.
                    if s == "0" || s == "-0" {
                        write!(f, "{}", value)
                    } else {
                        write!(f, "{}", s)
                    }
                }
            }
        }
    }
}

impl Add for Number {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a.wrapping_add(b)),
            (a, b) => Number::Float(a.as_f64() + b.as_f64()),
        }
    }
}

impl Sub for Number {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a.wrapping_sub(b)),
            (a, b) => Number::Float(a.as_f64() - b.as_f64()),
        }
    }
}

impl Mul for Number {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a.wrapping_mul(b)),
            (a, b) => Number::Float(a.as_f64() * b.as_f64()),
        }
    }
}

/// Integer division truncates toward zero. Callers are expected to reject a
/// zero divisor before dividing.
impl Div for Number {
    type Output = Self;

    fn div(self, other: Self) -> Self {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a.wrapping_div(b)),
            (a, b) => Number::Float(a.as_f64() / b.as_f64()),
        }
    }
}

impl Rem for Number {
    type Output = Self;

    fn rem(self, other: Self) -> Self {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a.wrapping_rem(b)),
            (a, b) => Number::Float(a.as_f64() % b.as_f64()),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case(Number::Int(42), "42")]
    #[case(Number::Int(-42), "-42")]
    #[case(Number::Float(42.123), "42.123")]
    #[case(Number::Float(42.100), "42.1")]
    #[case(Number::Float(42.0), "42")]
    #[case(Number::Float(0.1), "0.1")]
    #[case(Number::Float(5767.0), "5767")]
    #[case(Number::Float(0.0000001), "0.0000001")]
    #[case(Number::Float(-0.0000001), "-0.0000001")]
    fn test_display_formatting(#[case] input: Number, #[case] expected: &str) {
        assert_eq!(format!("{}", input), expected);
    }

    #[rstest]
    #[case(Number::Int(5), Number::Int(2), Number::Int(7), Number::Int(3), Number::Int(10))]
    #[case(
        Number::Int(5),
        Number::Float(2.5),
        Number::Float(7.5),
        Number::Float(2.5),
        Number::Float(12.5)
    )]
    fn test_operations(
        #[case] a: Number,
        #[case] b: Number,
        #[case] add_result: Number,
        #[case] sub_result: Number,
        #[case] mul_result: Number,
    ) {
        assert_eq!(a + b, add_result);
        assert_eq!(a - b, sub_result);
        assert_eq!(a * b, mul_result);
    }

    #[rstest]
    #[case(Number::Int(7), Number::Int(2), Number::Int(3), Number::Int(1))]
    #[case(Number::Int(13), Number::Int(10), Number::Int(1), Number::Int(3))]
    #[case(
        Number::Float(7.0),
        Number::Int(2),
        Number::Float(3.5),
        Number::Float(1.0)
    )]
    fn test_div_rem(
        #[case] a: Number,
        #[case] b: Number,
        #[case] div_result: Number,
        #[case] rem_result: Number,
    ) {
        assert_eq!(a / b, div_result);
        assert_eq!(a % b, rem_result);
    }

    #[rstest]
    #[case(Number::Int(0), true)]
    #[case(Number::Int(1), false)]
    #[case(Number::Float(0.0), true)]
    #[case(Number::Float(0.1), false)]
    fn test_is_zero(#[case] input: Number, #[case] expected: bool) {
        assert_eq!(input.is_zero(), expected);
    }

    #[rstest]
    #[case(Number::Int(5), Number::Int(2), true)]
    #[case(Number::Int(2), Number::Float(5.0), false)]
    #[case(Number::Float(5.0), Number::Int(5), false)]
    fn test_comparisons(#[case] a: Number, #[case] b: Number, #[case] greater: bool) {
        assert_eq!(a > b, greater);
    }
}
