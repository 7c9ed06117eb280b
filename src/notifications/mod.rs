use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{format_cents, Party, User};
use crate::error::Result;

pub mod email;
pub mod log_notifier;

#[cfg(any(test, feature = "test-utils"))]
pub mod recording;

pub use email::EmailNotifier;
pub use log_notifier::LogNotifier;

#[cfg(any(test, feature = "test-utils"))]
pub use recording::RecordingNotifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    /// To the buyer, after their booking was created.
    BookingOpened,
    /// To the seller, when a buyer books one of their products.
    BookingRequested { buyer_name: String },
    BookingConfirmed,
    BookingRejected,
    BookingCancelled { by: Party },
    BookingExpired,
    /// To the buyer.
    PaymentConfirmed { amount_cents: i64 },
    /// To the seller.
    PaymentReceived { amount_cents: i64 },
    TransactionCompleted,
    ReviewReminder,
}

impl NotificationKind {
    /// Short machine-readable name, used in logs.
    pub fn tag(&self) -> &'static str {
        match self {
            NotificationKind::BookingOpened => "booking-opened",
            NotificationKind::BookingRequested { .. } => "booking-requested",
            NotificationKind::BookingConfirmed => "booking-confirmed",
            NotificationKind::BookingRejected => "booking-rejected",
            NotificationKind::BookingCancelled { .. } => "booking-cancelled",
            NotificationKind::BookingExpired => "booking-expired",
            NotificationKind::PaymentConfirmed { .. } => "payment-confirmed",
            NotificationKind::PaymentReceived { .. } => "payment-received",
            NotificationKind::TransactionCompleted => "transaction-completed",
            NotificationKind::ReviewReminder => "review-reminder",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub recipient_id: Uuid,
    pub recipient_email: String,
    pub recipient_name: String,
    pub booking_id: Uuid,
    pub product_title: String,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn new(recipient: &User, booking_id: Uuid, product_title: &str, kind: NotificationKind) -> Self {
        Self {
            recipient_id: recipient.id,
            recipient_email: recipient.email.clone(),
            recipient_name: recipient.full_name(),
            booking_id,
            product_title: product_title.to_string(),
            kind,
        }
    }

    pub fn subject(&self) -> String {
        let name = &self.recipient_name;
        match &self.kind {
            NotificationKind::BookingOpened => "Your booking was created".to_string(),
            NotificationKind::BookingRequested { buyer_name } => {
                format!("New booking from {}", buyer_name)
            }
            NotificationKind::BookingConfirmed => format!("{}, your booking was confirmed", name),
            NotificationKind::BookingRejected => format!("{}, your booking request was declined", name),
            NotificationKind::BookingCancelled { .. } => "Booking cancelled".to_string(),
            NotificationKind::BookingExpired => format!("{}, your booking has expired", name),
            NotificationKind::PaymentConfirmed { .. } => format!("{}, your payment was confirmed", name),
            NotificationKind::PaymentReceived { .. } => format!("{}, you received a payment", name),
            NotificationKind::TransactionCompleted => "Pickup confirmed".to_string(),
            NotificationKind::ReviewReminder => "How did it go? Leave a review".to_string(),
        }
    }

    pub fn body(&self) -> String {
        let title = &self.product_title;
        let text = match &self.kind {
            NotificationKind::BookingOpened => format!(
                "Your booking for \"{}\" was sent to the seller. You will hear back once they respond.",
                title
            ),
            NotificationKind::BookingRequested { buyer_name } => format!(
                "{} would like to book \"{}\". Confirm or reject the request from your bookings.",
                buyer_name, title
            ),
            NotificationKind::BookingConfirmed => format!(
                "The seller confirmed your booking for \"{}\".",
                title
            ),
            NotificationKind::BookingRejected => format!(
                "The seller declined your booking for \"{}\".",
                title
            ),
            NotificationKind::BookingCancelled { by } => format!(
                "The booking for \"{}\" was cancelled by the {}.",
                title,
                by.as_str()
            ),
            NotificationKind::BookingExpired => format!(
                "Your booking for \"{}\" expired without an answer from the seller.",
                title
            ),
            NotificationKind::PaymentConfirmed { amount_cents } => format!(
                "We received your payment of {} for \"{}\".",
                format_cents(*amount_cents),
                title
            ),
            NotificationKind::PaymentReceived { amount_cents } => format!(
                "The buyer paid {} for \"{}\".",
                format_cents(*amount_cents),
                title
            ),
            NotificationKind::TransactionCompleted => format!(
                "The handoff for \"{}\" was validated. Thanks for using MealMates!",
                title
            ),
            NotificationKind::ReviewReminder => format!(
                "Your exchange for \"{}\" is complete. Take a minute to review the other party.",
                title
            ),
        };

        format!("Hello {},\n\n{}\n\nBooking reference: {}\n", self.recipient_name, text, self.booking_id)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Fans each notification out to every registered notifier. Delivery
/// failures are logged and never reach the caller.
pub struct NotificationManager {
    notifiers: RwLock<Vec<Arc<dyn Notifier>>>,
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationManager {
    pub fn new() -> Self {
        Self {
            notifiers: RwLock::new(Vec::new()),
        }
    }

    pub async fn register(&self, notifier: Arc<dyn Notifier>) {
        tracing::info!("Registered notifier: {}", notifier.name());
        self.notifiers.write().await.push(notifier);
    }

    pub async fn notify(&self, notification: Notification) {
        let notifiers = self.notifiers.read().await;

        for notifier in notifiers.iter() {
            match notifier.send(&notification).await {
                Ok(_) => {
                    tracing::debug!(
                        "Notifier {} delivered {} to {}",
                        notifier.name(),
                        notification.kind.tag(),
                        notification.recipient_id
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "Notifier {} failed to deliver {}: {:?}",
                        notifier.name(),
                        notification.kind.tag(),
                        e
                    );
                }
            }
        }
    }
}
