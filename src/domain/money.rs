use crate::error::{MarketError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;

/// A non-negative monetary amount.
///
/// Wraps `rust_decimal::Decimal` so every price, commission and payout is
/// computed with exact decimal arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MarketError::Validation(
                "Amount must not be negative".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Fails instead of wrapping past the largest representable amount.
    pub fn checked_add(self, rhs: Self) -> Result<Self> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or_else(|| MarketError::Validation(format!("Amount overflow adding {rhs} to {self}")))
    }

    pub fn try_sum(amounts: impl IntoIterator<Item = Self>) -> Result<Self> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, |total, amount| total.checked_add(amount))
    }

    /// Rejects amounts carrying more decimal places than the currency allows.
    pub fn ensure_scale(&self, scale: u32) -> Result<()> {
        if self.0.normalize().scale() > scale {
            return Err(MarketError::Validation(format!(
                "Amount {self} has more than {scale} decimal places"
            )));
        }
        Ok(())
    }

    /// Multiplies by `rate` and rounds half-up to `scale` decimal places.
    pub fn portion(&self, rate: Decimal, scale: u32) -> Self {
        Self(
            (self.0 * rate)
                .round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
                .normalize(),
        )
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MarketError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

// Callers only subtract a portion of the same amount, which cannot go negative.
impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}
