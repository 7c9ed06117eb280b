use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::booking::TransitionError;

/// Lifetime of a handoff token.
pub const QR_TOKEN_TTL_SECS: i64 = 300;

const QR_TOKEN_BYTES: usize = 32;

/// A single-use proof of physical handoff. Only the SHA-256 digest of the
/// token is kept; the raw value is shown to the buyer once.
#[derive(Debug, Clone, Serialize)]
pub struct QrValidationToken {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl QrValidationToken {
    /// Mints a fresh token for `booking_id`. Returns the record to persist and
    /// the raw token to hand to the buyer.
    pub fn issue(booking_id: Uuid, now: DateTime<Utc>) -> (Self, String) {
        let token = generate_token();
        let record = Self {
            id: Uuid::new_v4(),
            booking_id,
            token_hash: hash_token(&token),
            expires_at: now + Duration::seconds(QR_TOKEN_TTL_SECS),
            is_used: false,
            used_at: None,
            created_at: now,
        };
        (record, token)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Checks in order: unused, then unexpired.
    pub fn ensure_redeemable(&self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.is_used {
            return Err(TransitionError::TokenAlreadyUsed);
        }
        if self.is_expired(now) {
            return Err(TransitionError::TokenExpired);
        }
        Ok(())
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; QR_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_generation() {
        let (record, token) = QrValidationToken::issue(Uuid::new_v4(), Utc::now());
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(record.token_hash, hash_token(&token));
        assert_ne!(record.token_hash, token);

        let (_, other) = QrValidationToken::issue(record.booking_id, Utc::now());
        assert_ne!(token, other);
    }

    #[test]
    fn test_expiry_is_five_minutes() {
        let now = Utc::now();
        let (record, _) = QrValidationToken::issue(Uuid::new_v4(), now);
        assert_eq!((record.expires_at - now).num_seconds(), 300);
        assert!(record.ensure_redeemable(now + Duration::seconds(299)).is_ok());
        assert_eq!(
            record.ensure_redeemable(now + Duration::seconds(301)),
            Err(TransitionError::TokenExpired)
        );
    }

    #[test]
    fn test_used_is_checked_before_expiry() {
        let now = Utc::now();
        let (mut record, _) = QrValidationToken::issue(Uuid::new_v4(), now);
        record.is_used = true;
        record.used_at = Some(now);
        assert_eq!(
            record.ensure_redeemable(now + Duration::minutes(10)),
            Err(TransitionError::TokenAlreadyUsed)
        );
    }
}
