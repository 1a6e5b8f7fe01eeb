#![allow(dead_code)]

use async_trait::async_trait;
use carlot::application::engine::TransactionEngine;
use carlot::application::listing::ListingLifecycle;
use carlot::domain::identity::{Actor, Company};
use carlot::domain::ids::{CompanyId, SettlementId, TransactionId, UserId, VehicleId};
use carlot::domain::money::Money;
use carlot::domain::notification::Notification;
use carlot::domain::ports::{
    ChangeSet, CompanyStore, IdKind, MarketStoreRef, Notifier, NotifierRef, SettlementStore,
    TransactionStore, UnitOfWork, VehicleStore,
};
use carlot::domain::settlement::Settlement;
use carlot::domain::transaction::Transaction;
use carlot::domain::vehicle::{Vehicle, VehicleStatus};
use carlot::error::{MarketError, Result};
use carlot::infrastructure::in_memory::InMemoryMarketStore;
use carlot::infrastructure::notifier::OutboxNotifier;
use chrono::Utc;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub const COMPANY: CompanyId = CompanyId(1);
pub const OWNER: UserId = UserId(100);
pub const DEALER: UserId = UserId(101);
pub const BUYER: UserId = UserId(200);
pub const OTHER_BUYER: UserId = UserId(201);

pub const RIVAL_COMPANY: CompanyId = CompanyId(2);
pub const RIVAL_OWNER: UserId = UserId(300);

/// On sale at 20,000,000.
pub const SEDAN: VehicleId = VehicleId(1);
/// On sale at 25,000,000.
pub const SUV: VehicleId = VehicleId(2);

pub fn owner() -> Actor {
    Actor::owner(OWNER, COMPANY)
}

pub fn dealer() -> Actor {
    Actor::employee(DEALER, COMPANY)
}

pub fn buyer() -> Actor {
    Actor::customer(BUYER)
}

pub fn other_buyer() -> Actor {
    Actor::customer(OTHER_BUYER)
}

pub fn rival_owner() -> Actor {
    Actor::owner(RIVAL_OWNER, RIVAL_COMPANY)
}

pub fn listing(id: VehicleId, model: &str, price: Money, status: VehicleStatus) -> Vehicle {
    let mut vehicle = Vehicle::new(id, COMPANY, DEALER, model, price);
    vehicle.status = status;
    vehicle
}

pub struct Market {
    pub store: MarketStoreRef,
    pub outbox: OutboxNotifier,
    pub engine: TransactionEngine,
    pub listings: ListingLifecycle,
}

impl Market {
    pub async fn vehicle(&self, id: VehicleId) -> Vehicle {
        self.store.vehicle(id).await.unwrap().unwrap()
    }

    pub async fn transaction(&self, id: TransactionId) -> Transaction {
        self.engine.transaction(id).await.unwrap()
    }

    pub async fn set_status(&self, id: VehicleId, status: VehicleStatus) {
        let mut vehicle = self.vehicle(id).await;
        vehicle.status = status;
        self.store
            .commit(ChangeSet::new().with_vehicle(vehicle))
            .await
            .unwrap();
    }

    pub async fn approved(&self, vehicle: VehicleId) -> TransactionId {
        let id = self
            .engine
            .request_transaction(vehicle, &buyer())
            .await
            .unwrap();
        self.engine.approve_transaction(id, &owner()).await.unwrap();
        id
    }
}

pub async fn seed(store: &InMemoryMarketStore) {
    store
        .put_company(Company {
            id: COMPANY,
            owner: OWNER,
        })
        .await
        .unwrap();
    store
        .put_company(Company {
            id: RIVAL_COMPANY,
            owner: RIVAL_OWNER,
        })
        .await
        .unwrap();
    for vehicle in [
        listing(
            SEDAN,
            "Sonata",
            Money::new(dec!(20000000)).unwrap(),
            VehicleStatus::OnSale,
        ),
        listing(
            SUV,
            "Santa Fe",
            Money::new(dec!(25000000)).unwrap(),
            VehicleStatus::OnSale,
        ),
    ] {
        store
            .commit(ChangeSet::new().with_vehicle(vehicle))
            .await
            .unwrap();
    }
}

pub async fn market() -> Market {
    let store = InMemoryMarketStore::new();
    seed(&store).await;
    market_over(Arc::new(store), None).await
}

/// Builds a market over `store`, optionally routing notifications through
/// `notifier` instead of the recording outbox.
pub async fn market_over(store: MarketStoreRef, notifier: Option<NotifierRef>) -> Market {
    let outbox = OutboxNotifier::new();
    let notifier = notifier.unwrap_or_else(|| Arc::new(outbox.clone()));
    Market {
        engine: TransactionEngine::new(store.clone(), notifier.clone()),
        listings: ListingLifecycle::new(store.clone(), notifier),
        store,
        outbox,
    }
}

/// Rejects every notification.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn dispatch(&self, _notification: Notification) -> Result<()> {
        Err(MarketError::Notification("mail relay down".to_string()))
    }
}

/// Delegates to an in-memory store, injecting the faults it is built with.
#[derive(Clone, Default)]
pub struct FaultyStore {
    inner: InMemoryMarketStore,
    no_settlement_ids: bool,
    reserve_on_pending_check: Option<VehicleId>,
    reserved: Arc<AtomicBool>,
}

impl FaultyStore {
    pub async fn seeded() -> Self {
        let store = Self::default();
        seed(&store.inner).await;
        store
    }

    /// Fails every settlement id allocation.
    pub fn without_settlement_ids(mut self) -> Self {
        self.no_settlement_ids = true;
        self
    }

    /// Reserves `vehicle` behind the caller's back the first time a pending
    /// request check runs, as a concurrent approval would.
    pub fn reserving_during_request(mut self, vehicle: VehicleId) -> Self {
        self.reserve_on_pending_check = Some(vehicle);
        self
    }
}

#[async_trait]
impl CompanyStore for FaultyStore {
    async fn put_company(&self, company: Company) -> Result<()> {
        self.inner.put_company(company).await
    }

    async fn company(&self, id: CompanyId) -> Result<Option<Company>> {
        self.inner.company(id).await
    }
}

#[async_trait]
impl VehicleStore for FaultyStore {
    async fn vehicle(&self, id: VehicleId) -> Result<Option<Vehicle>> {
        self.inner.vehicle(id).await
    }

    async fn vehicles(&self) -> Result<Vec<Vehicle>> {
        self.inner.vehicles().await
    }
}

#[async_trait]
impl TransactionStore for FaultyStore {
    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.inner.transaction(id).await
    }

    async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.inner.transactions().await
    }

    async fn has_pending_request(&self, buyer: UserId, vehicle: VehicleId) -> Result<bool> {
        let target = self
            .reserve_on_pending_check
            .filter(|_| !self.reserved.swap(true, Ordering::SeqCst));
        if let Some(target) = target {
            let mut moved = self
                .inner
                .vehicle(target)
                .await?
                .ok_or_else(|| MarketError::not_found("vehicle", target.0))?;
            moved.status = VehicleStatus::Reserved;
            self.inner
                .commit(ChangeSet::new().with_vehicle(moved))
                .await?;
        }
        self.inner.has_pending_request(buyer, vehicle).await
    }
}

#[async_trait]
impl SettlementStore for FaultyStore {
    async fn settlement(&self, id: SettlementId) -> Result<Option<Settlement>> {
        self.inner.settlement(id).await
    }

    async fn settlement_for_transaction(&self, id: TransactionId) -> Result<Option<Settlement>> {
        self.inner.settlement_for_transaction(id).await
    }

    async fn settlements(&self) -> Result<Vec<Settlement>> {
        self.inner.settlements().await
    }
}

#[async_trait]
impl UnitOfWork for FaultyStore {
    async fn next_id(&self, kind: IdKind) -> Result<u64> {
        if self.no_settlement_ids && kind == IdKind::Settlement {
            return Err(MarketError::Storage(Box::new(std::io::Error::other(
                "settlement sequence unavailable",
            ))));
        }
        self.inner.next_id(kind).await
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        self.inner.commit(changes).await
    }
}

pub fn now() -> chrono::DateTime<Utc> {
    Utc::now()
}
