use crate::domain::identity::Company;
use crate::domain::ids::{CompanyId, SettlementId, TransactionId, UserId, VehicleId};
use crate::domain::ports::{
    ChangeSet, CommitView, CompanyStore, IdKind, SettlementStore, TransactionStore, UnitOfWork,
    VehicleStore, Write,
};
use crate::domain::settlement::Settlement;
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::domain::vehicle::Vehicle;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct MarketState {
    companies: BTreeMap<CompanyId, Company>,
    vehicles: BTreeMap<VehicleId, Vehicle>,
    transactions: BTreeMap<TransactionId, Transaction>,
    settlements: BTreeMap<SettlementId, Settlement>,
    next_vehicle: u64,
    next_transaction: u64,
    next_settlement: u64,
}

impl CommitView for MarketState {
    fn stored_version(&self, write: &Write) -> Result<Option<u64>> {
        Ok(match write {
            Write::Vehicle(v) => self.vehicles.get(&v.id).map(|v| v.version),
            Write::Transaction(t) => self.transactions.get(&t.id).map(|t| t.version),
            Write::Settlement(s) => self.settlements.get(&s.id).map(|s| s.version),
        })
    }

    fn vehicle_version(&self, id: VehicleId) -> Result<Option<u64>> {
        Ok(self.vehicles.get(&id).map(|v| v.version))
    }

    fn has_other_pending_request(&self, transaction: &Transaction) -> Result<bool> {
        Ok(self.transactions.values().any(|t| {
            t.id != transaction.id && t.is_pending_request_of(transaction.buyer, transaction.vehicle)
        }))
    }

    fn stored_transaction_status(&self, id: TransactionId) -> Result<Option<TransactionStatus>> {
        Ok(self.transactions.get(&id).map(|t| t.status))
    }

    fn has_settlement_for(&self, id: TransactionId) -> Result<bool> {
        Ok(self.settlements.values().any(|s| s.transaction == id))
    }
}

/// A thread-safe in-memory market store.
///
/// All entity maps sit behind a single `RwLock`, so a commit validates and
/// applies its whole change set while no other writer can interleave.
#[derive(Default, Clone)]
pub struct InMemoryMarketStore {
    state: Arc<RwLock<MarketState>>,
}

impl InMemoryMarketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CompanyStore for InMemoryMarketStore {
    async fn put_company(&self, company: Company) -> Result<()> {
        let mut state = self.state.write().await;
        state.companies.insert(company.id, company);
        Ok(())
    }

    async fn company(&self, id: CompanyId) -> Result<Option<Company>> {
        let state = self.state.read().await;
        Ok(state.companies.get(&id).copied())
    }
}

#[async_trait]
impl VehicleStore for InMemoryMarketStore {
    async fn vehicle(&self, id: VehicleId) -> Result<Option<Vehicle>> {
        let state = self.state.read().await;
        Ok(state.vehicles.get(&id).cloned())
    }

    async fn vehicles(&self) -> Result<Vec<Vehicle>> {
        let state = self.state.read().await;
        Ok(state.vehicles.values().cloned().collect())
    }
}

#[async_trait]
impl TransactionStore for InMemoryMarketStore {
    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let state = self.state.read().await;
        Ok(state.transactions.get(&id).cloned())
    }

    async fn transactions(&self) -> Result<Vec<Transaction>> {
        let state = self.state.read().await;
        Ok(state.transactions.values().cloned().collect())
    }

    async fn has_pending_request(&self, buyer: UserId, vehicle: VehicleId) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .values()
            .any(|t| t.is_pending_request_of(buyer, vehicle)))
    }
}

#[async_trait]
impl SettlementStore for InMemoryMarketStore {
    async fn settlement(&self, id: SettlementId) -> Result<Option<Settlement>> {
        let state = self.state.read().await;
        Ok(state.settlements.get(&id).cloned())
    }

    async fn settlement_for_transaction(&self, id: TransactionId) -> Result<Option<Settlement>> {
        let state = self.state.read().await;
        Ok(state
            .settlements
            .values()
            .find(|s| s.transaction == id)
            .cloned())
    }

    async fn settlements(&self) -> Result<Vec<Settlement>> {
        let state = self.state.read().await;
        Ok(state.settlements.values().cloned().collect())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryMarketStore {
    async fn next_id(&self, kind: IdKind) -> Result<u64> {
        let mut state = self.state.write().await;
        let counter = match kind {
            IdKind::Vehicle => &mut state.next_vehicle,
            IdKind::Transaction => &mut state.next_transaction,
            IdKind::Settlement => &mut state.next_settlement,
        };
        *counter += 1;
        Ok(*counter)
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let mut state = self.state.write().await;
        changes.validate(&*state)?;

        for write in changes.into_writes() {
            match write {
                Write::Vehicle(mut v) => {
                    v.version += 1;
                    // Keep seeded ids and allocated ids from colliding.
                    state.next_vehicle = state.next_vehicle.max(v.id.0);
                    state.vehicles.insert(v.id, v);
                }
                Write::Transaction(mut t) => {
                    t.version += 1;
                    state.transactions.insert(t.id, t);
                }
                Write::Settlement(mut s) => {
                    s.version += 1;
                    state.settlements.insert(s.id, s);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Money;
    use crate::domain::settlement::CommissionPolicy;
    use crate::domain::transaction::TransactionAction;
    use crate::error::MarketError;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn vehicle(id: u64) -> Vehicle {
        Vehicle::new(
            VehicleId(id),
            CompanyId(1),
            UserId(2),
            "Avante",
            Money::new(dec!(15000000)).unwrap(),
        )
    }

    fn request(id: u64, buyer: u64) -> Transaction {
        Transaction::request(
            TransactionId(id),
            VehicleId(1),
            UserId(buyer),
            CompanyId(1),
            Money::new(dec!(15000000)).unwrap(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_commit_bumps_versions() {
        let store = InMemoryMarketStore::new();
        store
            .commit(ChangeSet::new().with_vehicle(vehicle(1)))
            .await
            .unwrap();

        let stored = store.vehicle(VehicleId(1)).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert!(store.vehicle(VehicleId(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_write_is_rejected() {
        let store = InMemoryMarketStore::new();
        store
            .commit(ChangeSet::new().with_vehicle(vehicle(1)))
            .await
            .unwrap();

        let first = store.vehicle(VehicleId(1)).await.unwrap().unwrap();
        let second = first.clone();
        store
            .commit(ChangeSet::new().with_vehicle(first))
            .await
            .unwrap();

        let result = store.commit(ChangeSet::new().with_vehicle(second)).await;
        assert!(matches!(result, Err(MarketError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_vehicle_read_guard_rejects_moved_vehicle() {
        let store = InMemoryMarketStore::new();
        store
            .commit(ChangeSet::new().with_vehicle(vehicle(1)))
            .await
            .unwrap();
        let seen = store.vehicle(VehicleId(1)).await.unwrap().unwrap();

        // Another writer touches the vehicle after it was read.
        store
            .commit(ChangeSet::new().with_vehicle(seen.clone()))
            .await
            .unwrap();

        let result = store
            .commit(
                ChangeSet::new()
                    .expect_vehicle(seen.id, seen.version)
                    .with_transaction(request(1, 7)),
            )
            .await;
        assert!(matches!(result, Err(MarketError::Conflict(_))));
        assert!(store.transaction(TransactionId(1)).await.unwrap().is_none());

        let current = store.vehicle(VehicleId(1)).await.unwrap().unwrap();
        store
            .commit(
                ChangeSet::new()
                    .expect_vehicle(current.id, current.version)
                    .with_transaction(request(1, 7)),
            )
            .await
            .unwrap();
        assert_eq!(
            store.vehicle(VehicleId(1)).await.unwrap().unwrap().version,
            current.version
        );
    }

    #[tokio::test]
    async fn test_pending_request_uniqueness() {
        let store = InMemoryMarketStore::new();
        store
            .commit(ChangeSet::new().with_transaction(request(1, 10)))
            .await
            .unwrap();
        assert!(store.has_pending_request(UserId(10), VehicleId(1)).await.unwrap());

        let duplicate = store
            .commit(ChangeSet::new().with_transaction(request(2, 10)))
            .await;
        assert!(matches!(duplicate, Err(MarketError::Conflict(_))));

        store
            .commit(ChangeSet::new().with_transaction(request(3, 11)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_completion_requires_settlement_in_same_commit() {
        let store = InMemoryMarketStore::new();
        let mut tx = request(1, 10);
        tx.transition(TransactionAction::Approve, Utc::now()).unwrap();
        tx.transition(TransactionAction::Complete, Utc::now()).unwrap();

        let bare = store.commit(ChangeSet::new().with_transaction(tx.clone())).await;
        assert!(matches!(bare, Err(MarketError::Conflict(_))));
        assert!(store.transaction(TransactionId(1)).await.unwrap().is_none());

        let settlement =
            Settlement::for_transaction(SettlementId(1), &tx, &CommissionPolicy::default(), Utc::now())
                .unwrap();
        store
            .commit(
                ChangeSet::new()
                    .with_transaction(tx)
                    .with_settlement(settlement),
            )
            .await
            .unwrap();
        assert!(
            store
                .settlement_for_transaction(TransactionId(1))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_failed_commit_applies_nothing() {
        let store = InMemoryMarketStore::new();
        store
            .commit(ChangeSet::new().with_transaction(request(1, 10)))
            .await
            .unwrap();

        // The vehicle insert is valid, the duplicate request is not.
        let result = store
            .commit(
                ChangeSet::new()
                    .with_vehicle(vehicle(1))
                    .with_transaction(request(2, 10)),
            )
            .await;
        assert!(result.is_err());
        assert!(store.vehicle(VehicleId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_next_id_skips_seeded_vehicles() {
        let store = InMemoryMarketStore::new();
        store
            .commit(ChangeSet::new().with_vehicle(vehicle(5)))
            .await
            .unwrap();
        assert_eq!(store.next_id(IdKind::Vehicle).await.unwrap(), 6);
        assert_eq!(store.next_id(IdKind::Transaction).await.unwrap(), 1);
        assert_eq!(store.next_id(IdKind::Transaction).await.unwrap(), 2);
    }
}
