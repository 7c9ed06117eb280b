//! Scheduled maintenance for the booking workflow. Meant to be run from
//! cron or a systemd timer against the same database as the server.

use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mealmates::{config::Settings, service::ServiceContext};

#[derive(Debug, Parser)]
#[command(name = "mealmates-jobs", about = "Periodic booking maintenance")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Expire pending bookings the seller never answered.
    #[command(visible_alias = "expire")]
    ExpireBookings,
    /// Remind both parties of delivered bookings they have not reviewed.
    #[command(visible_alias = "remind")]
    ReviewReminders,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mealmates=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::new()?;

    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let context = ServiceContext::from_settings(db_pool, &settings).await?;
    let now = Utc::now();

    match cli.command {
        Command::ExpireBookings => {
            let expired = context.booking_service.expire_stale(now).await?;
            tracing::info!("Expired {} stale pending booking(s)", expired);
        }
        Command::ReviewReminders => {
            let reminded = context.booking_service.send_review_reminders(now).await?;
            tracing::info!("Sent review reminders for {} booking(s)", reminded);
        }
    }

    Ok(())
}
