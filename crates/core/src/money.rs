//! Fixed-point monetary amounts.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Non-negative monetary amount with exactly two fractional digits.
///
/// Backed by `rust_decimal::Decimal` so prices map onto Postgres
/// `NUMERIC(10, 2)` without floating point rounding. Every constructor
/// rescales to [`Money::SCALE`], so `10`, `10.0` and `10.00` are the same
/// value and all render as `"10.00"`.
///
/// Amounts are capped at [`Money::max`], the largest `NUMERIC(10, 2)` value.
/// Arithmetic is checked against the same cap and never panics.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl ValueObject for Money {}

impl Money {
    /// Number of fractional digits carried by every amount.
    pub const SCALE: u32 = 2;

    const MAX_CENTS: i64 = 9_999_999_999;

    pub fn zero() -> Self {
        Self(Decimal::new(0, Self::SCALE))
    }

    /// Largest representable amount, `99999999.99`.
    pub fn max() -> Self {
        Self(Decimal::new(Self::MAX_CENTS, Self::SCALE))
    }

    /// Validate and normalize a decimal amount.
    ///
    /// Rejects negative amounts, amounts above [`Money::max`] and amounts
    /// that would lose precision when rescaled to two fractional digits
    /// (e.g. `1.005`).
    pub fn new(amount: Decimal) -> DomainResult<Self> {
        if amount.is_zero() {
            return Ok(Self::zero());
        }
        if amount.is_sign_negative() {
            return Err(DomainError::validation("amount cannot be negative"));
        }
        if amount.normalize().scale() > Self::SCALE {
            return Err(DomainError::validation(format!(
                "amount {amount} has more than {} fractional digits",
                Self::SCALE
            )));
        }
        if amount > Self::max().0 {
            return Err(DomainError::validation(format!(
                "amount {amount} exceeds the maximum of {}",
                Self::max()
            )));
        }

        let mut amount = amount;
        amount.rescale(Self::SCALE);
        Ok(Self(amount))
    }

    /// Build an amount from an integer number of cents.
    pub fn from_cents(cents: i64) -> DomainResult<Self> {
        Self::new(Decimal::new(cents, Self::SCALE))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Multiply a unit price by a quantity.
    pub fn times(self, quantity: u64) -> DomainResult<Self> {
        let total = self
            .0
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| overflow(self, "*", quantity))?;
        Self::new(total)
    }

    pub fn checked_add(self, rhs: Money) -> DomainResult<Self> {
        let sum = self
            .0
            .checked_add(rhs.0)
            .ok_or_else(|| overflow(self, "+", rhs))?;
        Self::new(sum)
    }

    /// Sum amounts, failing if the result exceeds [`Money::max`].
    pub fn total<I>(amounts: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Self::zero(), Self::checked_add)
    }
}

fn overflow(lhs: Money, op: &str, rhs: impl core::fmt::Display) -> DomainError {
    DomainError::validation(format!("amount overflow: {lhs} {op} {rhs}"))
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s.trim())
            .map_err(|e| DomainError::validation(format!("invalid amount '{s}': {e}")))?;
        Self::new(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn normalizes_to_two_fractional_digits() {
        let m = Money::new(dec!(10)).unwrap();
        assert_eq!(m.to_string(), "10.00");
        assert_eq!(m, Money::new(dec!(10.0)).unwrap());
        assert_eq!(m.amount().scale(), 2);
    }

    #[test]
    fn rejects_negative_amounts() {
        let err = Money::new(dec!(-0.01)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_sub_cent_precision() {
        assert!(Money::new(dec!(1.005)).is_err());
        // Trailing zeros beyond the scale carry no precision and are accepted.
        assert_eq!(Money::new(dec!(1.500)).unwrap().to_string(), "1.50");
    }

    #[test]
    fn parses_from_str() {
        let m: Money = " 20.5 ".parse().unwrap();
        assert_eq!(m, Money::from_cents(2050).unwrap());
        assert!("abc".parse::<Money>().is_err());
    }

    #[test]
    fn times_and_total() {
        let a = Money::from_cents(1000).unwrap().times(3).unwrap();
        let b = Money::from_cents(2000).unwrap().times(2).unwrap();
        let total = Money::total([a, b]).unwrap();
        assert_eq!(total, "70.00".parse().unwrap());
        assert_eq!(Money::total([]).unwrap(), Money::zero());
    }

    #[test]
    fn rejects_amounts_above_the_cap() {
        assert_eq!(Money::max().to_string(), "99999999.99");
        assert_eq!(Money::new(dec!(99999999.99)).unwrap(), Money::max());

        let err = Money::new(dec!(100000000.00)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(Money::new(Decimal::from_i128_with_scale(10_i128.pow(28), 0)).is_err());
        assert!("123456789.00".parse::<Money>().is_err());
    }

    #[test]
    fn arithmetic_past_the_cap_is_an_error() {
        let max = Money::max();
        assert!(matches!(max.times(50), Err(DomainError::Validation(_))));
        assert!(max.times(u64::MAX).is_err());
        assert!(max.checked_add(Money::from_cents(1).unwrap()).is_err());
        assert!(Money::total([max, max]).is_err());

        assert_eq!(max.times(1).unwrap(), max);
        assert_eq!(max.times(0).unwrap(), Money::zero());
    }

    #[test]
    fn serde_uses_decimal_string() {
        let m = Money::from_cents(1999).unwrap();
        let json = serde_json::to_value(m).unwrap();
        assert_eq!(json, serde_json::json!("19.99"));

        let back: Money = serde_json::from_value(json).unwrap();
        assert_eq!(back, m);

        let bad: Result<Money, _> = serde_json::from_value(serde_json::json!("-1.00"));
        assert!(bad.is_err());
        let huge: Result<Money, _> = serde_json::from_value(serde_json::json!("100000000"));
        assert!(huge.is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: multiplying by a quantity equals repeated addition.
            #[test]
            fn times_matches_repeated_addition(cents in 0i64..10_000_000, qty in 0u64..50) {
                let unit = Money::from_cents(cents).unwrap();
                let repeated = Money::total(core::iter::repeat(unit).take(qty as usize)).unwrap();
                prop_assert_eq!(unit.times(qty).unwrap(), repeated);
            }

            /// Property: cents survive a display/parse cycle unchanged.
            #[test]
            fn display_parse_preserves_value(cents in 0i64..1_000_000_000) {
                let m = Money::from_cents(cents).unwrap();
                let parsed: Money = m.to_string().parse().unwrap();
                prop_assert_eq!(parsed, m);
            }
        }
    }
}
