use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{QrValidationToken, VALIDATION_METHOD_QR},
    error::{AppError, Result},
    repository::QrTokenRepository,
};

#[derive(FromRow)]
struct QrTokenRow {
    id: String,
    booking_id: String,
    token_hash: String,
    expires_at: NaiveDateTime,
    is_used: i32,
    used_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
}

pub struct SqliteQrTokenRepository {
    pool: SqlitePool,
}

impl SqliteQrTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_token(row: QrTokenRow) -> Result<QrValidationToken> {
        Ok(QrValidationToken {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            booking_id: Uuid::parse_str(&row.booking_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            token_hash: row.token_hash,
            expires_at: DateTime::from_naive_utc_and_offset(row.expires_at, Utc),
            is_used: row.is_used != 0,
            used_at: row.used_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl QrTokenRepository for SqliteQrTokenRepository {
    async fn create(&self, token: &QrValidationToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO qr_validation_tokens (id, booking_id, token_hash, expires_at, is_used, used_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(token.id.to_string())
        .bind(token.booking_id.to_string())
        .bind(&token.token_hash)
        .bind(token.expires_at.naive_utc())
        .bind(token.is_used as i32)
        .bind(token.used_at.map(|dt| dt.naive_utc()))
        .bind(token.created_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    async fn find_for_booking(
        &self,
        booking_id: Uuid,
        token_hash: &str,
    ) -> Result<Option<QrValidationToken>> {
        let row = sqlx::query_as::<_, QrTokenRow>(
            r#"
            SELECT id, booking_id, token_hash, expires_at, is_used, used_at, created_at
            FROM qr_validation_tokens
            WHERE booking_id = ? AND token_hash = ?
            "#,
        )
        .bind(booking_id.to_string())
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_token).transpose()
    }

    async fn redeem(&self, token_id: Uuid, booking_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let token_update = sqlx::query(
            r#"
            UPDATE qr_validation_tokens SET is_used = 1, used_at = ?
            WHERE id = ? AND booking_id = ? AND is_used = 0
            "#,
        )
        .bind(at.naive_utc())
        .bind(token_id.to_string())
        .bind(booking_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if token_update.rows_affected() != 1 {
            tx.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(false);
        }

        let booking_update = sqlx::query(
            r#"
            UPDATE bookings SET is_delivered = 1, delivered_at = ?, validation_method = ?
            WHERE id = ? AND is_delivered = 0 AND is_confirmed = 1
              AND (is_paid = 1 OR total_price_cents = 0)
            "#,
        )
        .bind(at.naive_utc())
        .bind(VALIDATION_METHOD_QR)
        .bind(booking_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if booking_update.rows_affected() != 1 {
            tx.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(false);
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(true)
    }
}
