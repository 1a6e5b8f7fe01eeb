use super::csv::command_reader::{CommandKind, CommandRecord};
use super::seed::Directory;
use crate::application::engine::TransactionEngine;
use crate::application::ledger::SettlementLedger;
use crate::application::listing::ListingLifecycle;
use crate::domain::identity::Role;
use crate::domain::ids::{SettlementId, TransactionId, UserId, VehicleId};
use crate::error::{MarketError, Result};
use chrono::{Duration, Utc};

/// Routes command records to the engine, ledger and listing lifecycle.
pub struct CommandRunner {
    engine: TransactionEngine,
    listings: ListingLifecycle,
    directory: Directory,
}

impl CommandRunner {
    pub fn new(engine: TransactionEngine, listings: ListingLifecycle, directory: Directory) -> Self {
        Self {
            engine,
            listings,
            directory,
        }
    }

    pub fn engine(&self) -> &TransactionEngine {
        &self.engine
    }

    pub fn ledger(&self) -> &SettlementLedger {
        self.engine.ledger()
    }

    pub async fn run(&self, record: CommandRecord) -> Result<()> {
        let actor = self.directory.resolve(UserId(record.actor))?;
        match record.command {
            CommandKind::Request => {
                self.engine
                    .request_transaction(VehicleId(record.target()?), &actor)
                    .await?;
            }
            CommandKind::Approve => {
                self.engine
                    .approve_transaction(TransactionId(record.target()?), &actor)
                    .await?
            }
            CommandKind::Reject => {
                self.engine
                    .reject_transaction(TransactionId(record.target()?), &actor)
                    .await?
            }
            CommandKind::Cancel => {
                self.engine
                    .cancel_transaction(TransactionId(record.target()?), &actor)
                    .await?
            }
            CommandKind::Complete => {
                self.engine
                    .complete_transaction(TransactionId(record.target()?), &actor)
                    .await?;
            }
            CommandKind::Settle => {
                self.require_admin(actor.role)?;
                self.ledger()
                    .complete_settlement(SettlementId(record.target()?))
                    .await?;
            }
            CommandKind::Publish => {
                self.require_admin(actor.role)?;
                self.listings
                    .publish(VehicleId(record.target()?), Utc::now())
                    .await?
            }
            CommandKind::Expire => {
                // Optional target: days to look ahead of the current clock.
                let days = record.target.unwrap_or(0);
                let at = i64::try_from(days)
                    .ok()
                    .and_then(Duration::try_days)
                    .and_then(|ahead| Utc::now().checked_add_signed(ahead))
                    .ok_or_else(|| {
                        MarketError::Validation(format!("look-ahead of {days} days is out of range"))
                    })?;
                self.listings.expire_due(at).await?;
            }
        }
        Ok(())
    }

    fn require_admin(&self, role: Role) -> Result<()> {
        if role == Role::Admin {
            Ok(())
        } else {
            Err(MarketError::forbidden("admin role required"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MarketStoreRef, NotifierRef, TransactionStore, VehicleStore};
    use crate::domain::transaction::TransactionStatus;
    use crate::infrastructure::in_memory::InMemoryMarketStore;
    use crate::infrastructure::notifier::LogNotifier;
    use crate::interfaces::seed::Seed;
    use std::sync::Arc;

    const SEED: &str = r#"{
        "companies": [{ "id": 1, "owner": 100 }],
        "users": [
            { "id": 1, "role": "admin" },
            { "id": 100, "role": "company_owner", "company": 1 },
            { "id": 200, "role": "customer" }
        ],
        "vehicles": [
            { "id": 1, "company": 1, "registered_by": 100, "model": "K5",
              "price": "18000000", "status": "on_sale" }
        ]
    }"#;

    async fn runner() -> (CommandRunner, MarketStoreRef) {
        let store: MarketStoreRef = Arc::new(InMemoryMarketStore::new());
        let notifier: NotifierRef = Arc::new(LogNotifier);
        let directory = Seed::from_reader(SEED.as_bytes())
            .unwrap()
            .apply(store.as_ref())
            .await
            .unwrap();
        let engine = TransactionEngine::new(store.clone(), notifier.clone());
        let listings = ListingLifecycle::new(store.clone(), notifier);
        (CommandRunner::new(engine, listings, directory), store)
    }

    fn record(command: CommandKind, actor: u64, target: Option<u64>) -> CommandRecord {
        CommandRecord {
            command,
            actor,
            target,
        }
    }

    #[tokio::test]
    async fn test_runs_purchase_commands() {
        let (runner, store) = runner().await;
        runner
            .run(record(CommandKind::Request, 200, Some(1)))
            .await
            .unwrap();
        runner
            .run(record(CommandKind::Approve, 100, Some(1)))
            .await
            .unwrap();
        runner
            .run(record(CommandKind::Complete, 100, Some(1)))
            .await
            .unwrap();
        runner
            .run(record(CommandKind::Settle, 1, Some(1)))
            .await
            .unwrap();

        let tx = store.transaction(TransactionId(1)).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(runner.ledger().pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_actor() {
        let (runner, _) = runner().await;
        let result = runner.run(record(CommandKind::Request, 999, Some(1))).await;
        assert!(matches!(
            result,
            Err(MarketError::NotFound { entity: "user", .. })
        ));
    }

    #[tokio::test]
    async fn test_settle_requires_admin() {
        let (runner, _) = runner().await;
        let result = runner.run(record(CommandKind::Settle, 100, Some(1))).await;
        assert!(matches!(result, Err(MarketError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_missing_target() {
        let (runner, _) = runner().await;
        let result = runner.run(record(CommandKind::Approve, 100, None)).await;
        assert!(matches!(result, Err(MarketError::Validation(_))));

        // Expiry sweeps take an optional look-ahead instead of a target.
        runner
            .run(record(CommandKind::Expire, 1, None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_expire_rejects_out_of_range_look_ahead() {
        let (runner, store) = runner().await;
        for days in [u64::MAX, 200_000_000_000] {
            let result = runner.run(record(CommandKind::Expire, 1, Some(days))).await;
            assert!(matches!(result, Err(MarketError::Validation(_))));
        }

        // The listing is untouched by the refused sweeps.
        let vehicle = store.vehicle(VehicleId(1)).await.unwrap().unwrap();
        assert_eq!(vehicle.version, 1);

        runner
            .run(record(CommandKind::Expire, 1, Some(30)))
            .await
            .unwrap();
    }
}
