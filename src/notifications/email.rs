use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{
    config::SmtpConfig,
    error::{AppError, Result},
    notifications::{Notification, Notifier},
};

pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    /// Builds the SMTP notifier, or `None` when SMTP is disabled.
    pub fn from_config(config: &SmtpConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }

        let host = config
            .host
            .as_deref()
            .ok_or_else(|| AppError::Internal("smtp.host is required when SMTP is enabled".to_string()))?;
        let from = config
            .from_address
            .as_deref()
            .ok_or_else(|| AppError::Internal("smtp.from_address is required when SMTP is enabled".to_string()))?
            .parse::<Mailbox>()
            .map_err(|e| AppError::Internal(format!("Invalid smtp.from_address: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| AppError::Internal(format!("Invalid SMTP relay {}: {}", host, e)))?;

        if let Some(port) = config.port {
            builder = builder.port(port);
        }
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Some(Self {
            transport: builder.build(),
            from,
        }))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        let to = format!("{} <{}>", notification.recipient_name, notification.recipient_email)
            .parse::<Mailbox>()
            .map_err(|e| AppError::Validation(format!("Invalid recipient address: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notification.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body())
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::External(format!("SMTP error: {}", e)))?;

        Ok(())
    }
}
