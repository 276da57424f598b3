use std::fmt::{Display, Formatter};
use std::iter::Sum;
use std::ops::Add;

use serde::{Serialize, Serializer};

use crate::ValidationError;

/// Non-negative currency amount held as integer cents.
///
/// All sales figures are reported in euros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money {
    cents: u64,
}

impl Money {
    pub const CURRENCY: &'static str = "EUR";

    pub const ZERO: Self = Self { cents: 0 };

    pub const fn from_cents(cents: u64) -> Self {
        Self { cents }
    }

    pub fn try_from_signed_cents(cents: i64) -> Result<Self, ValidationError> {
        u64::try_from(cents)
            .map(Self::from_cents)
            .map_err(|_| ValidationError::NegativeValue { field: "cents" })
    }

    pub const fn cents(self) -> u64 {
        self.cents
    }

    /// Amount in major units rounded to two decimals.
    pub fn as_decimal(self) -> f64 {
        self.cents as f64 / 100.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Self::from_cents(self.cents.saturating_add(rhs.cents))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, self.cents % 100)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(self.as_decimal())
    }
}
