use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub bookings: BookingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_duration_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            enabled: false,
            currency: default_currency(),
        }
    }
}

fn default_currency() -> String {
    "eur".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SmtpConfig {
    #[serde(default)]
    pub enabled: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    /// Pending bookings older than this are expired by the jobs binary.
    pub pending_ttl_hours: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self { pending_ttl_hours: 48 }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite://mealmates.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.token_duration_hours", 24)?
            .set_default("stripe.enabled", false)?
            .set_default("stripe.currency", "eur")?
            .set_default("smtp.enabled", false)?
            .set_default("bookings.pending_ttl_hours", 48)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with MEALMATES__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("MEALMATES").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "sqlite://mealmates.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                token_duration_hours: 24,
            },
            stripe: StripeConfig::default(),
            smtp: SmtpConfig::default(),
            bookings: BookingConfig::default(),
        }
    }
}
