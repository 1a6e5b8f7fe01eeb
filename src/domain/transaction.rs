use super::ids::{CompanyId, TransactionId, UserId, VehicleId};
use super::money::Money;
use crate::error::{MarketError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Requested,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 5] = [
        Self::Requested,
        Self::Approved,
        Self::Rejected,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Cancelled)
    }

    /// The negotiation state machine. Every legal edge is listed here; every
    /// other pair is an `InvalidState`.
    pub fn apply(self, action: TransactionAction) -> Result<Self> {
        use TransactionAction::*;
        match (self, action) {
            (Self::Requested, Approve) => Ok(Self::Approved),
            (Self::Requested, Reject) => Ok(Self::Rejected),
            (Self::Requested | Self::Approved, Cancel) => Ok(Self::Cancelled),
            (Self::Approved, Complete) => Ok(Self::Completed),
            (_, Approve) => Err(MarketError::invalid_state(
                "only requested transactions can be approved",
            )),
            (_, Reject) => Err(MarketError::invalid_state(
                "only requested transactions can be rejected",
            )),
            (_, Complete) => Err(MarketError::invalid_state(
                "only approved transactions can be completed",
            )),
            (Self::Completed, Cancel) => {
                Err(MarketError::invalid_state("cannot cancel completed"))
            }
            (_, Cancel) => Err(MarketError::invalid_state("transaction already closed")),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TransactionAction {
    Approve,
    Reject,
    Cancel,
    Complete,
}

/// One buyer's purchase negotiation against one listing.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub vehicle: VehicleId,
    pub buyer: UserId,
    pub company: CompanyId,
    /// Listing price captured when the request was made.
    pub price: Money,
    pub status: TransactionStatus,
    pub requested_at: DateTime<Utc>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

impl Transaction {
    pub fn request(
        id: TransactionId,
        vehicle: VehicleId,
        buyer: UserId,
        company: CompanyId,
        price: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            vehicle,
            buyer,
            company,
            price,
            status: TransactionStatus::Requested,
            requested_at: now,
            approved_at: None,
            completed_at: None,
            version: 0,
        }
    }

    /// Applies `action` and stamps the matching instant. Leaves `self`
    /// untouched on error.
    pub fn transition(&mut self, action: TransactionAction, now: DateTime<Utc>) -> Result<()> {
        let next = self.status.apply(action)?;
        match next {
            TransactionStatus::Approved => self.approved_at = Some(now),
            TransactionStatus::Completed => self.completed_at = Some(now),
            _ => {}
        }
        self.status = next;
        Ok(())
    }

    pub fn is_pending_request_of(&self, buyer: UserId, vehicle: VehicleId) -> bool {
        self.status == TransactionStatus::Requested && self.buyer == buyer && self.vehicle == vehicle
    }
}
