use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::Result,
    notifications::{Notification, NotificationKind, Notifier},
};

/// Keeps every notification in memory so tests can assert on them.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: RwLock<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }

    pub async fn kinds_for(&self, recipient_id: Uuid) -> Vec<NotificationKind> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .map(|n| n.kind.clone())
            .collect()
    }

    pub async fn clear(&self) {
        self.sent.write().await.clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        self.sent.write().await.push(notification.clone());
        Ok(())
    }
}
