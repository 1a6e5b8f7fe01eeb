use super::ids::{CompanyId, SettlementId, TransactionId};
use super::money::Money;
use super::transaction::{Transaction, TransactionStatus};
use crate::error::{MarketError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Platform fee charged on every completed sale (2.2%).
pub const COMMISSION_RATE: Decimal = dec!(0.022);

/// Commission rate plus the rounding applied to the commission.
///
/// The commission is rounded half-up (away from zero) to `scale` decimal
/// places; the payout is whatever is left, so the two always add back up to
/// the sale price exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionPolicy {
    rate: Decimal,
    scale: u32,
}

impl CommissionPolicy {
    pub fn new(scale: u32) -> Self {
        Self {
            rate: COMMISSION_RATE,
            scale,
        }
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Returns `(commission, payout)` for a sale at `price`.
    pub fn split(&self, price: Money) -> (Money, Money) {
        let commission = price.portion(self.rate, self.scale);
        (commission, price - commission)
    }
}

impl Default for CommissionPolicy {
    fn default() -> Self {
        Self::new(0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Pending,
    Completed,
}

impl SettlementStatus {
    pub const ALL: [SettlementStatus; 2] = [Self::Pending, Self::Completed];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

/// The seller's payable amount for one completed transaction.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Settlement {
    pub id: SettlementId,
    pub transaction: TransactionId,
    pub company: CompanyId,
    pub total_amount: Money,
    pub commission_amount: Money,
    pub settlement_amount: Money,
    pub status: SettlementStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

impl Settlement {
    /// Derives the settlement for `transaction`, which must already be
    /// Completed.
    pub fn for_transaction(
        id: SettlementId,
        transaction: &Transaction,
        policy: &CommissionPolicy,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if transaction.status != TransactionStatus::Completed {
            return Err(MarketError::invalid_state(
                "settlements are only created for completed transactions",
            ));
        }
        let (commission_amount, settlement_amount) = policy.split(transaction.price);
        Ok(Self {
            id,
            transaction: transaction.id,
            company: transaction.company,
            total_amount: transaction.price,
            commission_amount,
            settlement_amount,
            status: SettlementStatus::Pending,
            created_at: now,
            settled_at: None,
            version: 0,
        })
    }

    /// Pending -> Completed. Completing twice is an error.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != SettlementStatus::Pending {
            return Err(MarketError::invalid_state("already processed"));
        }
        self.status = SettlementStatus::Completed;
        self.settled_at = Some(now);
        Ok(())
    }
}
