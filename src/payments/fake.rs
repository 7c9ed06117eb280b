use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    payments::{IntentStatus, PaymentGateway, PaymentIntentHandle},
};

#[derive(Debug, Clone)]
pub struct RecordedIntent {
    pub amount_cents: i64,
    pub currency: String,
    pub metadata: HashMap<String, String>,
    pub status: IntentStatus,
}

/// In-memory gateway for tests. Intents start as `RequiresPaymentMethod`;
/// tests move them along with [`FakePaymentGateway::set_status`].
#[derive(Default)]
pub struct FakePaymentGateway {
    intents: RwLock<HashMap<String, RecordedIntent>>,
}

impl FakePaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_status(&self, intent_id: &str, status: IntentStatus) {
        if let Some(intent) = self.intents.write().await.get_mut(intent_id) {
            intent.status = status;
        }
    }

    pub async fn intent(&self, intent_id: &str) -> Option<RecordedIntent> {
        self.intents.read().await.get(intent_id).cloned()
    }
}

#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntentHandle> {
        let id = format!("pi_fake_{}", Uuid::new_v4().simple());
        let handle = PaymentIntentHandle {
            client_secret: format!("{}_secret", id),
            id: id.clone(),
        };

        self.intents.write().await.insert(
            id,
            RecordedIntent {
                amount_cents,
                currency: currency.to_string(),
                metadata,
                status: IntentStatus::RequiresPaymentMethod,
            },
        );

        Ok(handle)
    }

    async fn retrieve_status(&self, intent_id: &str) -> Result<IntentStatus> {
        self.intents
            .read()
            .await
            .get(intent_id)
            .map(|intent| intent.status)
            .ok_or_else(|| AppError::External(format!("No such payment intent: {}", intent_id)))
    }
}
