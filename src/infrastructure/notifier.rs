use crate::domain::notification::Notification;
use crate::domain::ports::Notifier;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Writes every notification to the log instead of delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<()> {
        tracing::info!(
            recipient = %notification.recipient,
            kind = ?notification.kind,
            title = notification.kind.title(),
            link = %notification.link,
            "{}",
            notification.message
        );
        Ok(())
    }
}

/// Keeps dispatched notifications in memory, in dispatch order.
#[derive(Debug, Default, Clone)]
pub struct OutboxNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl OutboxNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<()> {
        self.sent.lock().await.push(notification);
        Ok(())
    }
}
