use std::sync::Arc;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mealmates::{api, config::Settings, service::ServiceContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mealmates=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting MealMates server on {}:{}", settings.server.host, settings.server.port);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let service_context = Arc::new(ServiceContext::from_settings(db_pool, &settings).await?);

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    let app = api::create_app(service_context, Arc::new(settings));
    axum::serve(listener, app).await?;

    Ok(())
}
