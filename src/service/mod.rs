pub mod booking_service;
pub mod review_service;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::{
    auth::AuthService,
    config::Settings,
    error::{AppError, Result},
    notifications::{EmailNotifier, LogNotifier, NotificationManager},
    payments::{PaymentGateway, StripeGateway},
    repository::*,
};

pub use booking_service::{BookingService, BookingView, QrCodeGrant, TransactionStatus};
pub use review_service::ReviewService;

pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub product_repo: Arc<dyn ProductRepository>,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub qr_token_repo: Arc<dyn QrTokenRepository>,
    pub review_repo: Arc<dyn ReviewRepository>,
    pub notifications: Arc<NotificationManager>,
    pub auth_service: Arc<AuthService>,
    pub booking_service: Arc<BookingService>,
    pub review_service: Arc<ReviewService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    /// Wires repositories and services around explicit collaborators.
    pub fn new(
        db_pool: SqlitePool,
        settings: &Settings,
        gateway: Option<Arc<dyn PaymentGateway>>,
        notifications: Arc<NotificationManager>,
    ) -> Self {
        let user_repo: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let product_repo: Arc<dyn ProductRepository> =
            Arc::new(SqliteProductRepository::new(db_pool.clone()));
        let booking_repo: Arc<dyn BookingRepository> =
            Arc::new(SqliteBookingRepository::new(db_pool.clone()));
        let qr_token_repo: Arc<dyn QrTokenRepository> =
            Arc::new(SqliteQrTokenRepository::new(db_pool.clone()));
        let review_repo: Arc<dyn ReviewRepository> =
            Arc::new(SqliteReviewRepository::new(db_pool.clone()));

        let auth_service = Arc::new(AuthService::new(
            user_repo.clone(),
            &settings.auth.jwt_secret,
            settings.auth.token_duration_hours,
        ));

        let booking_service = Arc::new(BookingService::new(
            booking_repo.clone(),
            product_repo.clone(),
            user_repo.clone(),
            qr_token_repo.clone(),
            gateway,
            notifications.clone(),
            settings.stripe.currency.clone(),
            settings.bookings.pending_ttl_hours,
        ));

        let review_service = Arc::new(ReviewService::new(review_repo.clone(), booking_repo.clone()));

        Self {
            user_repo,
            product_repo,
            booking_repo,
            qr_token_repo,
            review_repo,
            notifications,
            auth_service,
            booking_service,
            review_service,
            db_pool,
        }
    }

    /// Builds the production collaborators from configuration: Stripe when
    /// enabled, and email notifications when SMTP is configured (log
    /// notifications otherwise).
    pub async fn from_settings(db_pool: SqlitePool, settings: &Settings) -> Result<Self> {
        let gateway: Option<Arc<dyn PaymentGateway>> = if settings.stripe.enabled {
            let key = settings.stripe.secret_key.clone().ok_or_else(|| {
                AppError::Internal("stripe.secret_key is required when Stripe is enabled".to_string())
            })?;
            tracing::info!("Stripe payments enabled");
            Some(Arc::new(StripeGateway::new(key)))
        } else {
            tracing::warn!("Stripe payments disabled; paid bookings cannot be settled");
            None
        };

        let notifications = Arc::new(NotificationManager::new());
        match EmailNotifier::from_config(&settings.smtp)? {
            Some(email) => notifications.register(Arc::new(email)).await,
            None => notifications.register(Arc::new(LogNotifier)).await,
        }

        Ok(Self::new(db_pool, settings, gateway, notifications))
    }
}
