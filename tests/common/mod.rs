#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use mealmates::{
    config::Settings,
    domain::{NewUser, Product, Role, User},
    notifications::{NotificationManager, RecordingNotifier},
    payments::{FakePaymentGateway, PaymentGateway},
    service::ServiceContext,
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;

/// A fully wired service context over an in-memory database, with the
/// payment gateway and notifier swapped for inspectable fakes.
pub struct Harness {
    pub pool: SqlitePool,
    pub settings: Settings,
    pub ctx: Arc<ServiceContext>,
    pub gateway: Arc<FakePaymentGateway>,
    pub notifier: Arc<RecordingNotifier>,
}

pub async fn harness() -> anyhow::Result<Harness> {
    // One connection that never recycles, or the in-memory database goes
    // away with it.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let settings = Settings::default();
    let gateway = Arc::new(FakePaymentGateway::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let notifications = Arc::new(NotificationManager::new());
    notifications.register(notifier.clone()).await;

    let dyn_gateway: Arc<dyn PaymentGateway> = gateway.clone();
    let ctx = Arc::new(ServiceContext::new(
        pool.clone(),
        &settings,
        Some(dyn_gateway),
        notifications,
    ));

    Ok(Harness {
        pool,
        settings,
        ctx,
        gateway,
        notifier,
    })
}

impl Harness {
    pub async fn user(&self, first_name: &str) -> anyhow::Result<User> {
        self.user_with_roles(first_name, vec![Role::User]).await
    }

    pub async fn user_with_roles(&self, first_name: &str, roles: Vec<Role>) -> anyhow::Result<User> {
        let user = self
            .ctx
            .user_repo
            .create(NewUser {
                email: format!("{}-{}@example.com", first_name.to_lowercase(), Uuid::new_v4().simple()),
                first_name: first_name.to_string(),
                last_name: "Tester".to_string(),
                roles,
                password_hash: "not-a-real-hash".to_string(),
            })
            .await?;
        Ok(user)
    }

    pub async fn product(&self, seller: &User, title: &str, price_cents: i64) -> anyhow::Result<Product> {
        let now = Utc::now();
        let product = self
            .ctx
            .product_repo
            .create(Product {
                id: Uuid::new_v4(),
                user_id: seller.id,
                title: title.to_string(),
                product_type: "meal".to_string(),
                price_cents,
                expires_at: now + Duration::days(2),
                is_active: true,
                created_at: now,
            })
            .await?;
        Ok(product)
    }
}
