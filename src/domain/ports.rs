use super::identity::Company;
use super::ids::{CompanyId, SettlementId, TransactionId, UserId, VehicleId};
use super::notification::Notification;
use super::settlement::Settlement;
use super::transaction::{Transaction, TransactionStatus};
use super::vehicle::Vehicle;
use crate::error::{MarketError, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait CompanyStore: Send + Sync {
    async fn put_company(&self, company: Company) -> Result<()>;
    async fn company(&self, id: CompanyId) -> Result<Option<Company>>;
}

#[async_trait]
pub trait VehicleStore: Send + Sync {
    async fn vehicle(&self, id: VehicleId) -> Result<Option<Vehicle>>;
    async fn vehicles(&self) -> Result<Vec<Vehicle>>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>>;
    async fn transactions(&self) -> Result<Vec<Transaction>>;
    async fn has_pending_request(&self, buyer: UserId, vehicle: VehicleId) -> Result<bool>;
}

#[async_trait]
pub trait SettlementStore: Send + Sync {
    async fn settlement(&self, id: SettlementId) -> Result<Option<Settlement>>;
    async fn settlement_for_transaction(&self, id: TransactionId) -> Result<Option<Settlement>>;
    async fn settlements(&self) -> Result<Vec<Settlement>>;
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum IdKind {
    Vehicle,
    Transaction,
    Settlement,
}

/// Atomic write access to the store.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn next_id(&self, kind: IdKind) -> Result<u64>;

    /// Applies every write in `changes` or none of them. Fails with
    /// `Conflict` when a version check or uniqueness rule does not hold.
    async fn commit(&self, changes: ChangeSet) -> Result<()>;
}

pub trait MarketStore:
    CompanyStore + VehicleStore + TransactionStore + SettlementStore + UnitOfWork
{
}

impl<T> MarketStore for T where
    T: CompanyStore + VehicleStore + TransactionStore + SettlementStore + UnitOfWork
{
}

pub type MarketStoreRef = Arc<dyn MarketStore>;

/// Outbound notification delivery. Failures are reported, never retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, notification: Notification) -> Result<()>;
}

pub type NotifierRef = Arc<dyn Notifier>;

#[derive(Debug, PartialEq, Clone)]
pub enum Write {
    Vehicle(Vehicle),
    Transaction(Transaction),
    Settlement(Settlement),
}

impl Write {
    /// Version the writer read the entity at; zero for inserts.
    pub fn expected_version(&self) -> u64 {
        match self {
            Self::Vehicle(v) => v.version,
            Self::Transaction(t) => t.version,
            Self::Settlement(s) => s.version,
        }
    }
}

/// The ordered writes produced by one engine operation.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct ChangeSet {
    writes: Vec<Write>,
    /// Vehicles the plan read but does not write, with the version seen.
    vehicle_reads: Vec<(VehicleId, u64)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transaction(mut self, transaction: Transaction) -> Self {
        self.writes.push(Write::Transaction(transaction));
        self
    }

    pub fn with_vehicle(mut self, vehicle: Vehicle) -> Self {
        self.writes.push(Write::Vehicle(vehicle));
        self
    }

    /// Commits only while vehicle `id` is still at `version`. Nothing is
    /// written for it.
    pub fn expect_vehicle(mut self, id: VehicleId, version: u64) -> Self {
        self.vehicle_reads.push((id, version));
        self
    }

    pub fn with_settlement(mut self, settlement: Settlement) -> Self {
        self.writes.push(Write::Settlement(settlement));
        self
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.writes.iter().find_map(|w| match w {
            Write::Transaction(t) if t.id == id => Some(t),
            _ => None,
        })
    }

    fn settles(&self, id: TransactionId) -> bool {
        self.writes
            .iter()
            .any(|w| matches!(w, Write::Settlement(s) if s.transaction == id && s.version == 0))
    }

    /// Checks versions and cross-entity rules against the committed state
    /// seen through `view`. Stores call this while holding their write lock.
    pub fn validate(&self, view: &dyn CommitView) -> Result<()> {
        if self.writes.is_empty() {
            return Err(MarketError::Conflict("empty change set".to_string()));
        }
        for &(id, expected) in &self.vehicle_reads {
            let stored = view.vehicle_version(id)?.unwrap_or(0);
            if stored != expected {
                return Err(MarketError::Conflict(format!(
                    "vehicle {id} changed since it was read: expected version {expected}, found {stored}"
                )));
            }
        }
        for write in &self.writes {
            let stored = view.stored_version(write)?;
            let expected = write.expected_version();
            if stored.unwrap_or(0) != expected {
                return Err(MarketError::Conflict(format!(
                    "stale write: expected version {expected}, found {}",
                    stored.unwrap_or(0)
                )));
            }
            match write {
                Write::Transaction(t) => {
                    if t.status == TransactionStatus::Requested
                        && view.has_other_pending_request(t)?
                    {
                        return Err(MarketError::Conflict(format!(
                            "buyer {} already has a pending request for vehicle {}",
                            t.buyer, t.vehicle
                        )));
                    }
                    let was_completed =
                        view.stored_transaction_status(t.id)? == Some(TransactionStatus::Completed);
                    if t.status == TransactionStatus::Completed
                        && !was_completed
                        && !self.settles(t.id)
                    {
                        return Err(MarketError::Conflict(format!(
                            "transaction {} completed without a settlement",
                            t.id
                        )));
                    }
                }
                Write::Settlement(s) if s.version == 0 => {
                    if view.has_settlement_for(s.transaction)? {
                        return Err(MarketError::Conflict(format!(
                            "transaction {} is already settled",
                            s.transaction
                        )));
                    }
                    let completes = self
                        .transaction(s.transaction)
                        .is_some_and(|t| t.status == TransactionStatus::Completed);
                    if !completes {
                        return Err(MarketError::Conflict(format!(
                            "settlement {} written without completing transaction {}",
                            s.id, s.transaction
                        )));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Read access to committed state used by `ChangeSet::validate`.
pub trait CommitView {
    /// Committed version of the entity targeted by `write`, if it exists.
    fn stored_version(&self, write: &Write) -> Result<Option<u64>>;
    fn vehicle_version(&self, id: VehicleId) -> Result<Option<u64>>;
    /// Another Requested transaction exists for the same buyer and vehicle.
    fn has_other_pending_request(&self, transaction: &Transaction) -> Result<bool>;
    fn stored_transaction_status(&self, id: TransactionId) -> Result<Option<TransactionStatus>>;
    fn has_settlement_for(&self, id: TransactionId) -> Result<bool>;
}
