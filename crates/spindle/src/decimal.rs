//! Arbitrary-precision decimal arithmetic for Core's fractional literals.
//!
//! Values are stored as `coefficient * 10^exponent` with a `BigInt` coefficient.
//! Trailing zeros are preserved so the rendered form reflects the significance of
//! the inputs (`1.31 + 1.2` renders `2.51`, not `2.510000...`).
//!
//! Arithmetic follows the General Decimal Arithmetic Specification at a fixed
//! context precision of 28 significant digits: addition, subtraction and
//! multiplication are exact and then rounded half-even; division scales the
//! dividend to precision + 1 digits, nudges the final digit off 0/5 when a
//! remainder survives (so the later rounding sees the sticky bits), pulls exact
//! quotients back toward the ideal exponent, and rounds half-even.

use std::{
    cmp::Ordering,
    fmt::{self, Display},
    str::FromStr,
};

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, Zero};

/// Context precision in significant digits, matching the original engine's
/// arithmetic context.
const PRECISION: usize = 28;

/// A decimal number with arbitrary-precision coefficient.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Decimal {
    /// The significand; carries the sign.
    coefficient: BigInt,
    /// Power of ten the coefficient is scaled by.
    exponent: i32,
}

/// Number of decimal digits in a coefficient's magnitude.
fn digit_count(n: &BigInt) -> usize {
    n.magnitude().to_string().len()
}

fn pow10(n: usize) -> BigInt {
    BigInt::from(10u32).pow(u32::try_from(n).expect("power of ten exceeds u32"))
}

impl Decimal {
    fn new(coefficient: BigInt, exponent: i32) -> Self {
        Self { coefficient, exponent }
    }

    /// Widens an integer to a decimal with exponent zero.
    #[must_use]
    pub fn from_bigint(n: &BigInt) -> Self {
        Self::new(n.clone(), 0)
    }

    /// Returns true when the value is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.coefficient.is_zero()
    }

    fn is_negative(&self) -> bool {
        self.coefficient.is_negative()
    }

    /// Rescales so the exponent drops to `target`, multiplying the coefficient.
    ///
    /// `target` must not exceed the current exponent; lowering an exponent is
    /// always exact.
    fn scaled_to(&self, target: i32) -> BigInt {
        let diff = usize::try_from(self.exponent - target).expect("exponent rescale underflow");
        if diff == 0 {
            self.coefficient.clone()
        } else {
            &self.coefficient * pow10(diff)
        }
    }

    /// Rounds to the context precision, half-even, adjusting the exponent.
    fn fix(mut self) -> Self {
        loop {
            let digits = digit_count(&self.coefficient);
            if digits <= PRECISION {
                return self;
            }
            let drop = digits - PRECISION;
            let divisor = pow10(drop);
            let negative = self.is_negative();
            let (mut quotient, remainder) = self.coefficient.abs().div_rem(&divisor);
            if round_half_even_away(&quotient, &remainder, &divisor) {
                quotient += BigInt::from(1u32);
            }
            self.coefficient = if negative { -quotient } else { quotient };
            self.exponent += i32::try_from(drop).expect("decimal exponent overflow");
            // A carry out of the top digit (999... -> 1000...) loops once more.
        }
    }

    /// Adds two decimals, aligning at the more precise exponent.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        let target = self.exponent.min(other.exponent);
        Self::new(self.scaled_to(target) + other.scaled_to(target), target).fix()
    }

    /// Subtracts `other` from `self`.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    /// Multiplies two decimals.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        Self::new(&self.coefficient * &other.coefficient, self.exponent + other.exponent).fix()
    }

    /// Divides `self` by `other` at context precision.
    ///
    /// Returns `None` when `other` is zero. Exact quotients keep the ideal
    /// exponent (`2.44 / 2` is `1.22`, `10.0 / 2` is `5`); inexact quotients
    /// carry 28 significant digits rounded half-even.
    #[must_use]
    pub fn div(&self, other: &Self) -> Option<Self> {
        if other.coefficient.is_zero() {
            return None;
        }
        let ideal_exp = self.exponent - other.exponent;
        if self.coefficient.is_zero() {
            return Some(Self::new(BigInt::ZERO, ideal_exp));
        }

        let negative = self.is_negative() != other.is_negative();
        let c1 = self.coefficient.abs();
        let c2 = other.coefficient.abs();
        let shift = isize::try_from(digit_count(&c2)).expect("digit count overflow")
            - isize::try_from(digit_count(&c1)).expect("digit count overflow")
            + isize::try_from(PRECISION + 1).expect("digit count overflow");
        let mut exp =
            i64::from(self.exponent) - i64::from(other.exponent) - i64::try_from(shift).expect("shift overflow");

        let (mut coeff, remainder) = if shift >= 0 {
            (c1 * pow10(shift.unsigned_abs())).div_rem(&c2)
        } else {
            c1.div_rem(&(c2 * pow10(shift.unsigned_abs())))
        };

        let ten = BigInt::from(10u32);
        if remainder.is_zero() {
            // Exact result: give back trailing zeros down to the ideal exponent.
            while exp < i64::from(ideal_exp) && (&coeff % &ten).is_zero() {
                coeff /= &ten;
                exp += 1;
            }
        } else if (&coeff % BigInt::from(5u32)).is_zero() {
            // Keep the last digit off 0/5 so the final rounding sees the sticky
            // remainder.
            coeff += BigInt::from(1u32);
        }

        let exponent = i32::try_from(exp).expect("decimal exponent overflow");
        let signed = if negative { -coeff } else { coeff };
        Some(Self::new(signed, exponent).fix())
    }

    /// Negates the value.
    #[must_use]
    pub fn neg(&self) -> Self {
        Self::new(-self.coefficient.clone(), self.exponent)
    }

    /// Numeric comparison, independent of representation.
    #[must_use]
    pub fn cmp_value(&self, other: &Self) -> Ordering {
        let target = self.exponent.min(other.exponent);
        self.scaled_to(target).cmp(&other.scaled_to(target))
    }
}

/// Half-even rounding decision: should the truncated quotient move away from zero?
///
/// `quotient`, `remainder` and `divisor` are magnitudes; `remainder` holds every
/// discarded digit, so exact halves are detected precisely.
fn round_half_even_away(quotient: &BigInt, remainder: &BigInt, divisor: &BigInt) -> bool {
    if remainder.is_zero() {
        return false;
    }
    let doubled = remainder * BigInt::from(2u32);
    match doubled.cmp(divisor) {
        Ordering::Greater => true,
        Ordering::Equal => quotient.is_odd(),
        Ordering::Less => false,
    }
}

impl FromStr for Decimal {
    type Err = String;

    /// Parses a plain decimal literal: optional sign, digits, optional point.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, rest) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (int_part, frac_part) = match rest.find('.') {
            Some(pos) => (&rest[..pos], &rest[pos + 1..]),
            None => (rest, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(format!("invalid decimal literal: {s}"));
        }
        let digits: String = int_part.chars().chain(frac_part.chars()).collect();
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("invalid decimal literal: {s}"));
        }
        let coefficient = BigInt::from_str(&digits).map_err(|_| format!("invalid decimal literal: {s}"))?;
        let coefficient = if negative { -coefficient } else { coefficient };
        let exponent = -i32::try_from(frac_part.len()).map_err(|_| format!("decimal literal too long: {s}"))?;
        Ok(Self::new(coefficient, exponent))
    }
}

impl Display for Decimal {
    /// Plain digit-string rendering: a single point, no exponent notation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.coefficient.is_zero() {
            return f.write_str("0");
        }
        if self.is_negative() {
            f.write_str("-")?;
        }
        let digits = self.coefficient.magnitude().to_string();
        if self.exponent >= 0 {
            f.write_str(&digits)?;
            for _ in 0..self.exponent {
                f.write_str("0")?;
            }
            return Ok(());
        }
        let frac_len = usize::try_from(self.exponent.unsigned_abs()).expect("fraction length overflow");
        if digits.len() > frac_len {
            let (int_part, frac_part) = digits.split_at(digits.len() - frac_len);
            write!(f, "{int_part}.{frac_part}")
        } else {
            write!(f, "0.{}{}", "0".repeat(frac_len - digits.len()), digits)
        }
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_value(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp_value(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_value(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn addition_aligns_exponents() {
        assert_eq!(dec("1.31").add(&dec("1.2")).to_string(), "2.51");
        assert_eq!(dec("1.31").add(&Decimal::from_bigint(&BigInt::from(1))).to_string(), "2.31");
    }

    #[test]
    fn multiplication_is_exact() {
        assert_eq!(dec("1.31").mul(&dec("2")).to_string(), "2.62");
    }

    #[test]
    fn exact_division_keeps_ideal_exponent() {
        assert_eq!(dec("2.44").div(&dec("2")).unwrap().to_string(), "1.22");
        assert_eq!(dec("10").div(&dec("2")).unwrap().to_string(), "5");
        assert_eq!(dec("1.0").div(&dec("4")).unwrap().to_string(), "0.25");
    }

    #[test]
    fn inexact_division_rounds_half_even_at_28_digits() {
        let q = dec("2.123456789123456789").div(&dec("1.121212121121212121")).unwrap();
        assert_eq!(q.to_string(), "1.893893893155560965668214599");
    }

    #[test]
    fn division_by_zero_is_refused() {
        assert!(dec("1").div(&dec("0")).is_none());
    }

    #[test]
    fn comparison_is_numeric() {
        assert_eq!(dec("1.0"), dec("1"));
        assert!(dec("0.5") < dec("0.75"));
        assert!(dec("-2") < dec("0.1"));
    }

    #[test]
    fn fix_rounds_carries_through() {
        // 30 nines rounds up to 1 followed by 28 zeros at a higher exponent.
        let long = Decimal::new("9".repeat(30).parse().unwrap(), 0).fix();
        assert_eq!(long.to_string(), format!("1{}", "0".repeat(30)));
    }
}
