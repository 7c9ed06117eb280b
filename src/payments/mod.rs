use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

pub mod stripe_client;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

pub use stripe_client::StripeGateway;

#[cfg(any(test, feature = "test-utils"))]
pub use fake::FakePaymentGateway;

/// What the client needs to finish a card payment.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct PaymentIntentHandle {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentStatus {
    Succeeded,
    Processing,
    RequiresAction,
    RequiresPaymentMethod,
    Canceled,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Processing => "processing",
            IntentStatus::RequiresAction => "requires_action",
            IntentStatus::RequiresPaymentMethod => "requires_payment_method",
            IntentStatus::Canceled => "canceled",
        }
    }
}

/// A card payment provider. Amounts are in the currency's minor unit.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntentHandle>;

    async fn retrieve_status(&self, intent_id: &str) -> Result<IntentStatus>;
}
