use super::ids::{CompanyId, UserId, VehicleId};
use super::money::Money;
use crate::error::{MarketError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a published listing stays on sale before the expiry sweep.
pub const LISTING_LIFETIME_DAYS: i64 = 14;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Pending,
    OnSale,
    Reserved,
    Sold,
    Rejected,
    Expired,
    Deleted,
}

impl VehicleStatus {
    pub const ALL: [VehicleStatus; 7] = [
        Self::Pending,
        Self::OnSale,
        Self::Reserved,
        Self::Sold,
        Self::Rejected,
        Self::Expired,
        Self::Deleted,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::OnSale => "on_sale",
            Self::Reserved => "reserved",
            Self::Sold => "sold",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::Deleted => "deleted",
        }
    }

    /// Availability transitions driven by the transaction engine.
    pub fn apply(self, change: AvailabilityChange) -> Result<Self> {
        match (self, change) {
            (Self::OnSale, AvailabilityChange::Reserve) => Ok(Self::Reserved),
            (Self::Reserved, AvailabilityChange::Release) => Ok(Self::OnSale),
            (Self::Reserved, AvailabilityChange::MarkSold) => Ok(Self::Sold),
            (Self::Reserved | Self::Sold, AvailabilityChange::Reserve) => Err(
                MarketError::invalid_state("vehicle already reserved or sold"),
            ),
            (Self::OnSale, AvailabilityChange::MarkSold) => Err(MarketError::invalid_state(
                "vehicle must be reserved before it is sold",
            )),
            (status, change) => Err(MarketError::invalid_state(format!(
                "cannot {} a {} vehicle",
                change.verb(),
                status.label()
            ))),
        }
    }

    /// Transitions owned by the listing lifecycle (approval, expiry, removal).
    pub fn apply_listing(self, change: ListingChange) -> Result<Self> {
        match (self, change) {
            (Self::Pending | Self::Expired, ListingChange::Publish) => Ok(Self::OnSale),
            (Self::Pending, ListingChange::Reject) => Ok(Self::Rejected),
            (Self::OnSale, ListingChange::Expire) => Ok(Self::Expired),
            (Self::Pending | Self::OnSale | Self::Rejected | Self::Expired, ListingChange::Withdraw) => {
                Ok(Self::Deleted)
            }
            (status, change) => Err(MarketError::invalid_state(format!(
                "cannot {} a {} listing",
                change.verb(),
                status.label()
            ))),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AvailabilityChange {
    Reserve,
    Release,
    MarkSold,
}

impl AvailabilityChange {
    fn verb(&self) -> &'static str {
        match self {
            Self::Reserve => "reserve",
            Self::Release => "release",
            Self::MarkSold => "sell",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ListingChange {
    Publish,
    Reject,
    Expire,
    Withdraw,
}

impl ListingChange {
    fn verb(&self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Reject => "reject",
            Self::Expire => "expire",
            Self::Withdraw => "withdraw",
        }
    }
}

/// A vehicle listing offered by a dealership.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    pub company: CompanyId,
    /// The employee account that registered the listing.
    pub registered_by: UserId,
    pub model: String,
    pub price: Money,
    pub status: VehicleStatus,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_reason: Option<String>,
    /// Store version this copy was read at. Zero means never persisted.
    #[serde(default)]
    pub version: u64,
}

impl Vehicle {
    pub fn new(
        id: VehicleId,
        company: CompanyId,
        registered_by: UserId,
        model: impl Into<String>,
        price: Money,
    ) -> Self {
        Self {
            id,
            company,
            registered_by,
            model: model.into(),
            price,
            status: VehicleStatus::Pending,
            approved_at: None,
            expires_at: None,
            rejected_reason: None,
            version: 0,
        }
    }

    pub fn is_marketable(&self) -> bool {
        self.status == VehicleStatus::OnSale
    }

    pub fn reserve(&mut self) -> Result<()> {
        self.status = self.status.apply(AvailabilityChange::Reserve)?;
        Ok(())
    }

    pub fn release(&mut self) -> Result<()> {
        self.status = self.status.apply(AvailabilityChange::Release)?;
        Ok(())
    }

    pub fn mark_sold(&mut self) -> Result<()> {
        self.status = self.status.apply(AvailabilityChange::MarkSold)?;
        Ok(())
    }

    /// Puts the listing on sale and restarts its expiry clock.
    pub fn publish(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.status = self.status.apply_listing(ListingChange::Publish)?;
        self.approved_at = Some(now);
        self.expires_at = Some(now + Duration::days(LISTING_LIFETIME_DAYS));
        self.rejected_reason = None;
        Ok(())
    }

    pub fn reject(&mut self, reason: impl Into<String>) -> Result<()> {
        self.status = self.status.apply_listing(ListingChange::Reject)?;
        self.rejected_reason = Some(reason.into());
        Ok(())
    }

    pub fn expire(&mut self) -> Result<()> {
        self.status = self.status.apply_listing(ListingChange::Expire)?;
        Ok(())
    }

    pub fn withdraw(&mut self) -> Result<()> {
        self.status = self.status.apply_listing(ListingChange::Withdraw)?;
        Ok(())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == VehicleStatus::OnSale && self.expires_at.is_some_and(|at| at < now)
    }
}
