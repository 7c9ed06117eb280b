use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A listed item. `user_id` is the seller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub product_type: String,
    pub price_cents: i64,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }

    pub fn is_free(&self) -> bool {
        self.price_cents == 0
    }
}

/// Formats an amount in cents as a decimal string, e.g. `1050` -> `"10.50"`.
pub fn format_cents(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn product(price_cents: i64, is_active: bool, expires_in: Duration) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Lentil soup".to_string(),
            product_type: "meal".to_string(),
            price_cents,
            expires_at: now + expires_in,
            is_active,
            created_at: now,
        }
    }

    #[test]
    fn test_availability() {
        let now = Utc::now();
        assert!(product(500, true, Duration::days(1)).is_available(now));
        assert!(!product(500, false, Duration::days(1)).is_available(now));
        assert!(!product(500, true, Duration::days(-1)).is_available(now));
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(1050), "10.50");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(7), "0.07");
        assert!(product(0, true, Duration::days(1)).is_free());
    }
}
