use super::commit::{self, DEFAULT_COMMIT_ATTEMPTS, Plan};
use crate::domain::ids::{CompanyId, SettlementId, TransactionId};
use crate::domain::money::Money;
use crate::domain::notification::{Notification, NotificationKind, settlement_link};
use crate::domain::ports::{
    ChangeSet, CompanyStore, IdKind, MarketStoreRef, NotifierRef, SettlementStore, UnitOfWork,
};
use crate::domain::settlement::{CommissionPolicy, Settlement, SettlementStatus};
use crate::domain::transaction::Transaction;
use crate::error::{MarketError, Result};
use chrono::{DateTime, Utc};
use tracing::info;

/// Inclusive window over settled-at instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Derives, completes and reports seller settlements.
#[derive(Clone)]
pub struct SettlementLedger {
    store: MarketStoreRef,
    notifier: NotifierRef,
    policy: CommissionPolicy,
    attempts: u32,
}

impl SettlementLedger {
    pub fn new(store: MarketStoreRef, notifier: NotifierRef) -> Self {
        Self {
            store,
            notifier,
            policy: CommissionPolicy::default(),
            attempts: DEFAULT_COMMIT_ATTEMPTS,
        }
    }

    pub fn with_policy(mut self, policy: CommissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_commit_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn policy(&self) -> &CommissionPolicy {
        &self.policy
    }

    /// Builds the Pending settlement for a Completed transaction. Nothing is
    /// persisted here; the caller commits it together with the completion.
    pub async fn create_settlement(&self, transaction: &Transaction) -> Result<Settlement> {
        let id = SettlementId(self.store.next_id(IdKind::Settlement).await?);
        Settlement::for_transaction(id, transaction, &self.policy, Utc::now())
    }

    /// Admin approval of a payout: Pending -> Completed, exactly once.
    pub async fn complete_settlement(&self, id: SettlementId) -> Result<Settlement> {
        let settlement = commit::execute(
            self.store.as_ref(),
            self.notifier.as_ref(),
            self.attempts,
            "complete_settlement",
            move || self.plan_complete(id),
        )
        .await?;

        info!(
            settlement = %settlement.id,
            transaction = %settlement.transaction,
            amount = %settlement.settlement_amount,
            "settlement completed"
        );
        Ok(settlement)
    }

    async fn plan_complete(&self, id: SettlementId) -> Result<Plan<Settlement>> {
        let mut settlement = self
            .store
            .settlement(id)
            .await?
            .ok_or_else(|| MarketError::not_found("settlement", id))?;
        settlement.complete(Utc::now())?;

        let company = self
            .store
            .company(settlement.company)
            .await?
            .ok_or_else(|| MarketError::not_found("company", settlement.company))?;

        let notification = Notification::new(
            company.owner,
            NotificationKind::SettlementCompleted,
            format!(
                "Settlement completed (payout: {}).",
                settlement.settlement_amount
            ),
            settlement_link(id),
        );

        let mut stored = settlement.clone();
        stored.version += 1;
        Ok(Plan::new(ChangeSet::new().with_settlement(settlement), stored).notify(notification))
    }

    pub async fn settlement(&self, id: SettlementId) -> Result<Settlement> {
        self.store
            .settlement(id)
            .await?
            .ok_or_else(|| MarketError::not_found("settlement", id))
    }

    pub async fn settlement_for_transaction(&self, id: TransactionId) -> Result<Option<Settlement>> {
        self.store.settlement_for_transaction(id).await
    }

    /// A company's settlements; with a period, only those settled inside it.
    pub async fn company_settlements(
        &self,
        company: CompanyId,
        period: Option<Period>,
    ) -> Result<Vec<Settlement>> {
        let settlements = self.store.settlements().await?;
        Ok(settlements
            .into_iter()
            .filter(|s| s.company == company)
            .filter(|s| match period {
                Some(p) => s.settled_at.is_some_and(|at| p.contains(at)),
                None => true,
            })
            .collect())
    }

    /// Sum of payouts already completed for `company`.
    pub async fn total_settled(&self, company: CompanyId, period: Option<Period>) -> Result<Money> {
        let settlements = self.company_settlements(company, period).await?;
        Money::try_sum(
            settlements
                .into_iter()
                .filter(|s| s.status == SettlementStatus::Completed)
                .map(|s| s.settlement_amount),
        )
    }

    /// Settlements in `status`, newest first.
    pub async fn settlements_by_status(&self, status: SettlementStatus) -> Result<Vec<Settlement>> {
        let mut settlements: Vec<_> = self
            .store
            .settlements()
            .await?
            .into_iter()
            .filter(|s| s.status == status)
            .collect();
        settlements.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(settlements)
    }

    pub async fn pending_count(&self) -> Result<usize> {
        Ok(self.settlements_by_status(SettlementStatus::Pending).await?.len())
    }
}
