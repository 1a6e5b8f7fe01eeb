use super::commit::{self, DEFAULT_COMMIT_ATTEMPTS, Plan};
use super::ledger::SettlementLedger;
use crate::domain::authorization::{self, Party};
use crate::domain::identity::{Actor, Company};
use crate::domain::ids::{CompanyId, TransactionId, UserId, VehicleId};
use crate::domain::notification::{Notification, NotificationKind, PURCHASES_LINK, SALES_LINK};
use crate::domain::ports::{
    ChangeSet, CompanyStore, IdKind, MarketStoreRef, NotifierRef, TransactionStore, UnitOfWork,
    VehicleStore,
};
use crate::domain::settlement::{CommissionPolicy, Settlement};
use crate::domain::transaction::{Transaction, TransactionAction, TransactionStatus};
use crate::domain::vehicle::{Vehicle, VehicleStatus};
use crate::error::{MarketError, Result};
use chrono::Utc;
use tracing::info;

/// The purchase negotiation state machine.
///
/// Every public operation loads the entities it needs, validates the whole
/// move up front, and hands the resulting change set to the store as one
/// atomic commit. Notifications are sent only after the commit succeeds.
#[derive(Clone)]
pub struct TransactionEngine {
    store: MarketStoreRef,
    notifier: NotifierRef,
    ledger: SettlementLedger,
    attempts: u32,
}

impl TransactionEngine {
    /// Creates an engine with the default commission policy.
    ///
    /// # Arguments
    ///
    /// * `store` - Shared market store holding vehicles, transactions and settlements.
    /// * `notifier` - Best-effort outbound notification sink.
    pub fn new(store: MarketStoreRef, notifier: NotifierRef) -> Self {
        let ledger = SettlementLedger::new(store.clone(), notifier.clone());
        Self {
            store,
            notifier,
            ledger,
            attempts: DEFAULT_COMMIT_ATTEMPTS,
        }
    }

    pub fn with_policy(mut self, policy: CommissionPolicy) -> Self {
        self.ledger = self.ledger.with_policy(policy);
        self
    }

    pub fn with_commit_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self.ledger = self.ledger.with_commit_attempts(attempts);
        self
    }

    pub fn ledger(&self) -> &SettlementLedger {
        &self.ledger
    }

    /// Opens a purchase request from `buyer` against an on-sale vehicle.
    pub async fn request_transaction(
        &self,
        vehicle: VehicleId,
        buyer: &Actor,
    ) -> Result<TransactionId> {
        let id = self
            .execute("request_transaction", move || self.plan_request(vehicle, buyer))
            .await?;
        info!(transaction = %id, %vehicle, buyer = %buyer.id, "purchase requested");
        Ok(id)
    }

    pub async fn approve_transaction(&self, id: TransactionId, seller: &Actor) -> Result<()> {
        self.execute("approve_transaction", move || self.plan_approve(id, seller))
            .await?;
        info!(transaction = %id, "purchase approved, vehicle reserved");
        Ok(())
    }

    pub async fn reject_transaction(&self, id: TransactionId, seller: &Actor) -> Result<()> {
        self.execute("reject_transaction", move || self.plan_reject(id, seller))
            .await?;
        info!(transaction = %id, "purchase rejected");
        Ok(())
    }

    pub async fn cancel_transaction(&self, id: TransactionId, actor: &Actor) -> Result<()> {
        let party = self
            .execute("cancel_transaction", move || self.plan_cancel(id, actor))
            .await?;
        info!(transaction = %id, ?party, "purchase cancelled");
        Ok(())
    }

    /// Completes an approved transaction: the vehicle is sold and the
    /// settlement is created in the same commit.
    pub async fn complete_transaction(
        &self,
        id: TransactionId,
        seller: &Actor,
    ) -> Result<Settlement> {
        let settlement = self
            .execute("complete_transaction", move || self.plan_complete(id, seller))
            .await?;
        info!(
            transaction = %id,
            settlement = %settlement.id,
            total = %settlement.total_amount,
            commission = %settlement.commission_amount,
            "purchase completed"
        );
        Ok(settlement)
    }

    pub async fn transaction(&self, id: TransactionId) -> Result<Transaction> {
        self.store
            .transaction(id)
            .await?
            .ok_or_else(|| MarketError::not_found("transaction", id))
    }

    /// A buyer's transactions, newest first.
    pub async fn purchases(&self, buyer: UserId) -> Result<Vec<Transaction>> {
        let mut purchases: Vec<_> = self
            .store
            .transactions()
            .await?
            .into_iter()
            .filter(|t| t.buyer == buyer)
            .collect();
        purchases.sort_by(|a, b| b.requested_at.cmp(&a.requested_at).then(b.id.cmp(&a.id)));
        Ok(purchases)
    }

    pub async fn company_sales(&self, company: CompanyId) -> Result<Vec<Transaction>> {
        Ok(self
            .store
            .transactions()
            .await?
            .into_iter()
            .filter(|t| t.company == company)
            .collect())
    }

    async fn execute<T, F, Fut>(&self, operation: &'static str, plan: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Plan<T>>>,
    {
        commit::execute(
            self.store.as_ref(),
            self.notifier.as_ref(),
            self.attempts,
            operation,
            plan,
        )
        .await
    }

    async fn plan_request(&self, vehicle_id: VehicleId, buyer: &Actor) -> Result<Plan<TransactionId>> {
        let vehicle = self.load_vehicle(vehicle_id).await?;
        if !vehicle.is_marketable() {
            return Err(MarketError::invalid_state("not currently for sale"));
        }

        let company = self.load_company(vehicle.company).await?;
        if authorization::is_self_trade(buyer, &vehicle, &company) {
            return Err(MarketError::invalid_state("self-trade forbidden"));
        }

        if self.store.has_pending_request(buyer.id, vehicle.id).await? {
            return Err(MarketError::invalid_state("duplicate request"));
        }

        let id = TransactionId(self.store.next_id(IdKind::Transaction).await?);
        let transaction = Transaction::request(
            id,
            vehicle.id,
            buyer.id,
            vehicle.company,
            vehicle.price,
            Utc::now(),
        );

        // The vehicle must still be on sale when the request lands.
        let changes = ChangeSet::new()
            .expect_vehicle(vehicle.id, vehicle.version)
            .with_transaction(transaction);
        let mut plan = Plan::new(changes, id).notify(
            Notification::new(
                vehicle.registered_by,
                NotificationKind::TransactionRequest,
                format!("A purchase request for '{}' has arrived.", vehicle.model),
                SALES_LINK,
            ),
        );
        if company.owner != vehicle.registered_by {
            plan = plan.notify(Notification::new(
                company.owner,
                NotificationKind::TransactionRequest,
                format!(
                    "'{}' (handled by user {}) has a purchase request.",
                    vehicle.model, vehicle.registered_by
                ),
                SALES_LINK,
            ));
        }
        Ok(plan)
    }

    async fn plan_approve(&self, id: TransactionId, seller: &Actor) -> Result<Plan<()>> {
        let (mut transaction, company) = self.load_transaction(id).await?;
        authorization::authorize(seller, TransactionAction::Approve, &transaction, &company)?;

        let mut vehicle = self.load_vehicle(transaction.vehicle).await?;
        match vehicle.status {
            VehicleStatus::OnSale => {}
            VehicleStatus::Reserved | VehicleStatus::Sold => {
                return Err(MarketError::invalid_state("vehicle already reserved or sold"));
            }
            _ => return Err(MarketError::invalid_state("not currently for sale")),
        }

        transaction.transition(TransactionAction::Approve, Utc::now())?;
        vehicle.reserve()?;

        let notification = Notification::new(
            transaction.buyer,
            NotificationKind::TransactionApproved,
            format!(
                "Your purchase request for '{}' was approved. Contact the seller to proceed.",
                vehicle.model
            ),
            PURCHASES_LINK,
        );
        let changes = ChangeSet::new()
            .with_transaction(transaction)
            .with_vehicle(vehicle);
        Ok(Plan::new(changes, ()).notify(notification))
    }

    async fn plan_reject(&self, id: TransactionId, seller: &Actor) -> Result<Plan<()>> {
        let (mut transaction, company) = self.load_transaction(id).await?;
        authorization::authorize(seller, TransactionAction::Reject, &transaction, &company)?;
        transaction.transition(TransactionAction::Reject, Utc::now())?;

        let vehicle = self.load_vehicle(transaction.vehicle).await?;
        let notification = Notification::new(
            transaction.buyer,
            NotificationKind::TransactionRejected,
            format!("Your purchase request for '{}' was rejected.", vehicle.model),
            PURCHASES_LINK,
        );
        Ok(Plan::new(ChangeSet::new().with_transaction(transaction), ()).notify(notification))
    }

    async fn plan_cancel(&self, id: TransactionId, actor: &Actor) -> Result<Plan<Party>> {
        let (mut transaction, company) = self.load_transaction(id).await?;
        let party =
            authorization::authorize(actor, TransactionAction::Cancel, &transaction, &company)?;

        let was_approved = transaction.status == TransactionStatus::Approved;
        transaction.transition(TransactionAction::Cancel, Utc::now())?;

        let mut vehicle = self.load_vehicle(transaction.vehicle).await?;
        let (recipient, link, who) = match party {
            Party::Buyer => (vehicle.registered_by, SALES_LINK, "the buyer"),
            Party::Seller => (transaction.buyer, PURCHASES_LINK, "the seller"),
        };
        let notification = Notification::new(
            recipient,
            NotificationKind::TransactionCancelled,
            format!("The deal for '{}' was cancelled by {}.", vehicle.model, who),
            link,
        );

        let mut changes = ChangeSet::new().with_transaction(transaction);
        // Only the approved transaction holds the reservation.
        if was_approved && vehicle.status == VehicleStatus::Reserved {
            vehicle.release()?;
            changes = changes.with_vehicle(vehicle);
        }
        Ok(Plan::new(changes, party).notify(notification))
    }

    async fn plan_complete(&self, id: TransactionId, seller: &Actor) -> Result<Plan<Settlement>> {
        let (mut transaction, company) = self.load_transaction(id).await?;
        authorization::authorize(seller, TransactionAction::Complete, &transaction, &company)?;
        transaction.transition(TransactionAction::Complete, Utc::now())?;

        let mut vehicle = self.load_vehicle(transaction.vehicle).await?;
        vehicle.mark_sold()?;

        let settlement = self.ledger.create_settlement(&transaction).await?;
        let notification = Notification::new(
            transaction.buyer,
            NotificationKind::TransactionCompleted,
            "Your purchase is complete. If you were satisfied, please leave a review!",
            PURCHASES_LINK,
        );

        let mut stored = settlement.clone();
        stored.version += 1;
        let changes = ChangeSet::new()
            .with_transaction(transaction)
            .with_vehicle(vehicle)
            .with_settlement(settlement);
        Ok(Plan::new(changes, stored).notify(notification))
    }

    async fn load_vehicle(&self, id: VehicleId) -> Result<Vehicle> {
        self.store
            .vehicle(id)
            .await?
            .ok_or_else(|| MarketError::not_found("vehicle", id))
    }

    async fn load_company(&self, id: CompanyId) -> Result<Company> {
        self.store
            .company(id)
            .await?
            .ok_or_else(|| MarketError::not_found("company", id))
    }

    async fn load_transaction(&self, id: TransactionId) -> Result<(Transaction, Company)> {
        let transaction = self
            .store
            .transaction(id)
            .await?
            .ok_or_else(|| MarketError::not_found("transaction", id))?;
        let company = self.load_company(transaction.company).await?;
        Ok((transaction, company))
    }
}
