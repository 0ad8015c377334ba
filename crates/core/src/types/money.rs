//! Minor-unit money arithmetic.
//!
//! All checkout math happens in a currency's smallest denomination (cents
//! for USD) as `i64`, never as floating point. Decimal prices from the
//! outside world are converted once per cart line, before any summation,
//! so rounding error cannot compound across lines.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

/// An amount of money in a currency's smallest unit (e.g., cents).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct MinorUnits(i64);

impl MinorUnits {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Create an amount from a raw minor-unit count.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Convert a major-unit decimal price (e.g., `19.99` dollars) to minor
    /// units, rounding halves away from zero.
    ///
    /// Returns `None` if the result does not fit in an `i64` (absurd
    /// prices are rejected rather than wrapped).
    #[must_use]
    pub fn from_major(amount: Decimal) -> Option<Self> {
        (amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(Self)
    }

    /// Price of one cart line: the rounded minor-unit price times quantity.
    ///
    /// Returns `None` on conversion failure or overflow.
    #[must_use]
    pub fn line_total(unit_price: Decimal, quantity: u32) -> Option<Self> {
        let unit = Self::from_major(unit_price)?;
        unit.0.checked_mul(i64::from(quantity)).map(Self)
    }

    /// Checked addition, for summing line totals.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Apply a percentage discount to this amount.
    ///
    /// The discount is `round(amount * percentage / 100)` computed in
    /// integer space (halves round up for non-negative amounts, matching
    /// away-from-zero), subtracted from the full amount in one step.
    /// The intermediate product is computed in `i128`, so no amount an
    /// `i64` can hold overflows here.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn percent_off(self, percentage: u8) -> Self {
        let discount = (self.0 as i128 * percentage as i128 + 50) / 100;
        Self(self.0 - discount as i64)
    }

    /// Raw minor-unit count.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Convert back to a major-unit decimal (two fraction digits).
    #[must_use]
    pub fn to_major(self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

impl std::fmt::Display for MinorUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_from_major_exact() {
        assert_eq!(MinorUnits::from_major(dec("150.00")).unwrap().as_i64(), 15000);
        assert_eq!(MinorUnits::from_major(dec("0.01")).unwrap().as_i64(), 1);
    }

    #[test]
    fn test_from_major_rounds_half_away_from_zero() {
        // 19.995 * 100 = 1999.5 -> 2000, not banker's 2000/1999 ambiguity
        assert_eq!(MinorUnits::from_major(dec("19.995")).unwrap().as_i64(), 2000);
        assert_eq!(MinorUnits::from_major(dec("19.985")).unwrap().as_i64(), 1999);
    }

    #[test]
    fn test_line_total_rounds_before_multiplying() {
        // Per-line rounding: round(3.335 * 100) * 3 = 334 * 3 = 1002,
        // not round(3.335 * 3 * 100) = 1001
        assert_eq!(MinorUnits::line_total(dec("3.335"), 3).unwrap().as_i64(), 1002);
    }

    #[test]
    fn test_percent_off() {
        // 10% off 10000 = 9000
        assert_eq!(MinorUnits::new(10000).percent_off(10).as_i64(), 9000);
        // round(9999 * 10 / 100) = round(999.9) = 1000
        assert_eq!(MinorUnits::new(9999).percent_off(10).as_i64(), 8999);
        // half rounds up: round(50 * 25 / 100) = round(12.5) = 13
        assert_eq!(MinorUnits::new(50).percent_off(25).as_i64(), 37);
        // 0% and 100% edges
        assert_eq!(MinorUnits::new(500).percent_off(0).as_i64(), 500);
        assert_eq!(MinorUnits::new(500).percent_off(100).as_i64(), 0);
    }

    #[test]
    fn test_percent_off_near_i64_max() {
        // A total that passes summation checks must still discount
        // without wrapping
        let amount = i64::MAX / 10;
        let expected = amount - ((i128::from(amount) * 50 + 50) / 100) as i64;
        assert_eq!(MinorUnits::new(amount).percent_off(50).as_i64(), expected);
        assert_eq!(MinorUnits::new(i64::MAX).percent_off(100).as_i64(), 0);
    }

    #[test]
    fn test_to_major() {
        assert_eq!(MinorUnits::new(15000).to_major(), dec("150.00"));
        assert_eq!(MinorUnits::new(1).to_major(), dec("0.01"));
    }

    #[test]
    fn test_from_major_too_large() {
        // More cents than an i64 can hold
        assert!(MinorUnits::from_major(dec("1000000000000000000.00")).is_none());
    }
}
