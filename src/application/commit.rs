use crate::domain::notification::Notification;
use crate::domain::ports::{ChangeSet, MarketStore, Notifier, UnitOfWork};
use crate::error::{MarketError, Result};
use std::future::Future;
use tracing::{debug, warn};

pub const DEFAULT_COMMIT_ATTEMPTS: u32 = 3;

/// Everything one operation wants to happen, decided before any write.
pub(crate) struct Plan<T> {
    pub changes: ChangeSet,
    pub notifications: Vec<Notification>,
    pub value: T,
}

impl<T> Plan<T> {
    pub fn new(changes: ChangeSet, value: T) -> Self {
        Self {
            changes,
            notifications: Vec::new(),
            value,
        }
    }

    pub fn notify(mut self, notification: Notification) -> Self {
        self.notifications.push(notification);
        self
    }
}

/// Runs read-validate-commit, re-planning from fresh state when the store
/// reports a conflict. Notifications go out only after the commit lands and
/// their failures never fail the operation.
pub(crate) async fn execute<T, F, Fut>(
    store: &dyn MarketStore,
    notifier: &dyn Notifier,
    attempts: u32,
    operation: &'static str,
    mut plan: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Plan<T>>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        let planned = match plan().await {
            Ok(planned) => planned,
            Err(err) => {
                debug!(operation, error = %err, "operation refused");
                return Err(err);
            }
        };

        match store.commit(planned.changes).await {
            Ok(()) => {
                dispatch_all(notifier, planned.notifications).await;
                return Ok(planned.value);
            }
            Err(MarketError::Conflict(reason)) if attempt < attempts => {
                warn!(operation, attempt, %reason, "commit conflict, retrying");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

pub(crate) async fn dispatch_all(notifier: &dyn Notifier, notifications: Vec<Notification>) {
    for notification in notifications {
        let recipient = notification.recipient;
        let kind = notification.kind;
        if let Err(err) = notifier.dispatch(notification).await {
            warn!(%recipient, ?kind, error = %err, "notification dispatch failed");
        }
    }
}
