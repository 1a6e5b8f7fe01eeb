use super::commit::{self, DEFAULT_COMMIT_ATTEMPTS, Plan};
use crate::domain::ids::{CompanyId, UserId, VehicleId};
use crate::domain::money::Money;
use crate::domain::notification::{Notification, NotificationKind, vehicle_link};
use crate::domain::ports::{
    ChangeSet, CompanyStore, IdKind, MarketStoreRef, NotifierRef, UnitOfWork, VehicleStore,
};
use crate::domain::vehicle::Vehicle;
use crate::error::{MarketError, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// A listing submitted for review.
#[derive(Debug, Clone, PartialEq)]
pub struct NewListing {
    pub company: CompanyId,
    pub registered_by: UserId,
    pub model: String,
    pub price: Money,
}

/// Listing approval, rejection, expiry and removal.
///
/// Works only on listings outside a negotiation: reserved and sold vehicles
/// belong to the transaction engine.
#[derive(Clone)]
pub struct ListingLifecycle {
    store: MarketStoreRef,
    notifier: NotifierRef,
    attempts: u32,
    currency_scale: u32,
}

impl ListingLifecycle {
    pub fn new(store: MarketStoreRef, notifier: NotifierRef) -> Self {
        Self {
            store,
            notifier,
            attempts: DEFAULT_COMMIT_ATTEMPTS,
            currency_scale: 0,
        }
    }

    pub fn with_commit_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Decimal places a listing price may carry.
    pub fn with_currency_scale(mut self, scale: u32) -> Self {
        self.currency_scale = scale;
        self
    }

    /// Stores a new listing in Pending status.
    pub async fn register(&self, listing: NewListing) -> Result<VehicleId> {
        listing.price.ensure_scale(self.currency_scale)?;
        if self.store.company(listing.company).await?.is_none() {
            return Err(MarketError::not_found("company", listing.company));
        }
        let id = VehicleId(self.store.next_id(IdKind::Vehicle).await?);
        let vehicle = Vehicle::new(
            id,
            listing.company,
            listing.registered_by,
            listing.model,
            listing.price,
        );
        self.store
            .commit(ChangeSet::new().with_vehicle(vehicle))
            .await?;
        info!(vehicle = %id, "listing registered");
        Ok(id)
    }

    pub async fn publish(&self, id: VehicleId, now: DateTime<Utc>) -> Result<()> {
        self.update(id, "publish_listing", |v| v.publish(now)).await?;
        info!(vehicle = %id, "listing on sale");
        Ok(())
    }

    pub async fn reject(&self, id: VehicleId, reason: &str) -> Result<()> {
        self.update(id, "reject_listing", |v| v.reject(reason)).await?;
        info!(vehicle = %id, reason, "listing rejected");
        Ok(())
    }

    pub async fn withdraw(&self, id: VehicleId) -> Result<()> {
        self.update(id, "withdraw_listing", |v| v.withdraw()).await?;
        info!(vehicle = %id, "listing withdrawn");
        Ok(())
    }

    /// Expires every on-sale listing whose lifetime ended before `now`.
    ///
    /// A listing that changes under the sweep (for example, reserved by an
    /// approval) is skipped rather than failing the whole sweep.
    pub async fn expire_due(&self, now: DateTime<Utc>) -> Result<Vec<VehicleId>> {
        let due: Vec<_> = self
            .store
            .vehicles()
            .await?
            .into_iter()
            .filter(|v| v.is_expired_at(now))
            .map(|v| v.id)
            .collect();

        let mut expired = Vec::with_capacity(due.len());
        for id in due {
            let result = commit::execute(
                self.store.as_ref(),
                self.notifier.as_ref(),
                self.attempts,
                "expire_listing",
                move || self.plan_expire(id, now),
            )
            .await;
            match result {
                Ok(()) => expired.push(id),
                Err(err) => warn!(vehicle = %id, error = %err, "listing not expired"),
            }
        }
        info!(count = expired.len(), "expiry sweep finished");
        Ok(expired)
    }

    async fn plan_expire(&self, id: VehicleId, now: DateTime<Utc>) -> Result<Plan<()>> {
        let mut vehicle = self.load(id).await?;
        if !vehicle.is_expired_at(now) {
            return Err(MarketError::invalid_state("listing is not due to expire"));
        }
        vehicle.expire()?;
        let notification = Notification::new(
            vehicle.registered_by,
            NotificationKind::ListingExpired,
            format!(
                "The listing for '{}' has expired. Refresh its photos to relist it.",
                vehicle.model
            ),
            vehicle_link(id),
        );
        Ok(Plan::new(ChangeSet::new().with_vehicle(vehicle), ()).notify(notification))
    }

    async fn update<F>(&self, id: VehicleId, operation: &'static str, change: F) -> Result<()>
    where
        F: Fn(&mut Vehicle) -> Result<()>,
    {
        let change = &change;
        commit::execute(
            self.store.as_ref(),
            self.notifier.as_ref(),
            self.attempts,
            operation,
            move || async move {
                let mut vehicle = self.load(id).await?;
                change(&mut vehicle)?;
                Ok(Plan::new(ChangeSet::new().with_vehicle(vehicle), ()))
            },
        )
        .await
    }

    async fn load(&self, id: VehicleId) -> Result<Vehicle> {
        self.store
            .vehicle(id)
            .await?
            .ok_or_else(|| MarketError::not_found("vehicle", id))
    }
}
