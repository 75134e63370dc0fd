use crate::error::{OrderError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of minor units in one major unit (cents per unit).
const MINOR_UNITS: i64 = 100;

/// A monetary amount in integer minor currency units.
///
/// Amounts never touch floating point. Major-unit strings such as `"12.50"` are
/// only parsed at the boundary, through `rust_decimal`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Self = Self(0);

    pub fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub fn minor(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Parses a major-unit decimal string, rejecting sub-minor precision.
    pub fn from_major_str(value: &str) -> Result<Self> {
        let decimal = Decimal::from_str(value.trim()).map_err(|e| {
            OrderError::ValidationError(format!("Invalid amount '{}': {}", value, e))
        })?;
        Self::from_major(decimal)
    }

    pub fn from_major(value: Decimal) -> Result<Self> {
        let scaled = value
            .checked_mul(Decimal::from(MINOR_UNITS))
            .ok_or_else(|| {
                OrderError::ValidationError(format!("Amount {} is out of range", value))
            })?;
        if scaled.fract() != Decimal::ZERO {
            return Err(OrderError::ValidationError(format!(
                "Amount {} has more than two decimal places",
                value
            )));
        }
        let minor = scaled.to_i64().ok_or_else(|| {
            OrderError::ValidationError(format!("Amount {} is out of range", value))
        })?;
        Ok(Self(minor))
    }

    pub fn to_major(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// `self × quantity`, failing instead of wrapping on overflow.
    pub fn checked_mul(&self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Self)
    }

    pub fn checked_add(&self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_major())
    }
}
