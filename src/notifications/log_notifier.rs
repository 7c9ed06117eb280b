use async_trait::async_trait;

use crate::{
    error::Result,
    notifications::{Notification, Notifier},
};

/// Writes notifications to the log. Registered when SMTP is off so local
/// runs still show what would have been sent.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            recipient = %notification.recipient_email,
            booking_id = %notification.booking_id,
            tag = notification.kind.tag(),
            "{}",
            notification.subject()
        );
        Ok(())
    }
}
