use std::collections::HashMap;

use async_trait::async_trait;
use stripe::{
    Client, CreatePaymentIntent, Currency, PaymentIntent, PaymentIntentId, PaymentIntentStatus,
};

use crate::{
    error::{AppError, Result},
    payments::{IntentStatus, PaymentGateway, PaymentIntentHandle},
};

pub struct StripeGateway {
    client: Client,
}

impl StripeGateway {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(api_key),
        }
    }

    fn map_status(status: PaymentIntentStatus) -> IntentStatus {
        match status {
            PaymentIntentStatus::Succeeded => IntentStatus::Succeeded,
            PaymentIntentStatus::Processing => IntentStatus::Processing,
            PaymentIntentStatus::RequiresAction
            | PaymentIntentStatus::RequiresCapture
            | PaymentIntentStatus::RequiresConfirmation => IntentStatus::RequiresAction,
            PaymentIntentStatus::RequiresPaymentMethod => IntentStatus::RequiresPaymentMethod,
            PaymentIntentStatus::Canceled => IntentStatus::Canceled,
            #[allow(unreachable_patterns)]
            _ => IntentStatus::RequiresAction,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntentHandle> {
        let currency = currency
            .to_lowercase()
            .parse::<Currency>()
            .map_err(|_| AppError::Internal(format!("Unsupported currency: {}", currency)))?;

        let mut params = CreatePaymentIntent::new(amount_cents, currency);
        params.payment_method_types = Some(vec!["card".to_string()]);
        params.metadata = Some(metadata);

        let intent = PaymentIntent::create(&self.client, params)
            .await
            .map_err(|e| AppError::External(format!("Stripe error: {}", e)))?;

        let client_secret = intent
            .client_secret
            .ok_or_else(|| AppError::External("No client secret returned".to_string()))?;

        tracing::info!("Created payment intent {}", intent.id);

        Ok(PaymentIntentHandle {
            id: intent.id.to_string(),
            client_secret,
        })
    }

    async fn retrieve_status(&self, intent_id: &str) -> Result<IntentStatus> {
        let id = intent_id
            .parse::<PaymentIntentId>()
            .map_err(|_| AppError::Validation(format!("Invalid payment intent id: {}", intent_id)))?;

        let intent = PaymentIntent::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| AppError::External(format!("Stripe error: {}", e)))?;

        tracing::debug!("Payment intent {} is {:?}", intent_id, intent.status);

        Ok(Self::map_status(intent.status))
    }
}
