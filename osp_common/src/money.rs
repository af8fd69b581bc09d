use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

pub const SETTLEMENT_CURRENCY_CODE: &str = "usd";

//--------------------------------------       Money       -----------------------------------------------------------
/// A monetary amount in minor currency units (cents). All prices, discounts and totals in the settlement pipeline
/// are carried as `Money`; the reward accrual is derived from it via [`Money::whole_units`].
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a monetary amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {} is too large to convert to Money", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self).map_err(|e| MoneyConversionError(format!("{s} is not an amount in cents. {e}")))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let units = self.0 as f64 / 100.0;
        write!(f, "${units:0.2}")
    }
}

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// The amount in minor units (cents).
    pub fn value(&self) -> i64 {
        self.0
    }

    /// The amount in whole currency units, truncated. $20.99 -> 20. This is the basis for reward accruals.
    pub fn whole_units(&self) -> i64 {
        self.0 / 100
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        let a = Money::from_cents(15_000);
        let b = Money::from_cents(2_099);
        assert_eq!(a + b, Money::from_cents(17_099));
        assert_eq!(a - b, Money::from_cents(12_901));
        assert_eq!(b * 3, Money::from_cents(6_297));
        let total: Money = vec![a, b].into_iter().sum();
        assert_eq!(total, Money::from_cents(17_099));
    }

    #[test]
    fn whole_units_truncate() {
        assert_eq!(Money::from_cents(15_000).whole_units(), 150);
        assert_eq!(Money::from_cents(2_099).whole_units(), 20);
        assert_eq!(Money::from_cents(99).whole_units(), 0);
    }

    #[test]
    fn display() {
        assert_eq!(Money::from_cents(15_000).to_string(), "$150.00");
        assert_eq!(Money::from_cents(2_099).to_string(), "$20.99");
    }
}
