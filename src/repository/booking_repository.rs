use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Booking, BookingListing, Chat, REVIEW_REMINDER_WINDOW_DAYS},
    error::{is_unique_violation, AppError, Result},
    repository::BookingRepository,
};

// Columns shared by every booking query. `seller_id` comes from the product,
// `chat_id` from the optional chat thread.
const BOOKING_COLUMNS: &str = r#"
    b.id, b.buyer_id, p.user_id AS seller_id, b.product_id, c.id AS chat_id,
    b.total_price_cents, b.is_confirmed, b.is_outdated, b.is_paid, b.is_delivered,
    b.buyer_review_left, b.seller_review_left, b.created_at, b.confirmed_at,
    b.outdated_at, b.paid_at, b.delivered_at, b.review_reminder_sent_at,
    b.payment_intent_id, b.validation_method
"#;

const BOOKING_JOINS: &str = r#"
    FROM bookings b
    JOIN products p ON p.id = b.product_id
    LEFT JOIN chats c ON c.booking_id = b.id
"#;

#[derive(FromRow)]
struct BookingRow {
    id: String,
    buyer_id: String,
    seller_id: String,
    product_id: String,
    chat_id: Option<String>,
    total_price_cents: i64,
    is_confirmed: i32,
    is_outdated: i32,
    is_paid: i32,
    is_delivered: i32,
    buyer_review_left: i32,
    seller_review_left: i32,
    created_at: NaiveDateTime,
    confirmed_at: Option<NaiveDateTime>,
    outdated_at: Option<NaiveDateTime>,
    paid_at: Option<NaiveDateTime>,
    delivered_at: Option<NaiveDateTime>,
    review_reminder_sent_at: Option<NaiveDateTime>,
    payment_intent_id: Option<String>,
    validation_method: Option<String>,
}

#[derive(FromRow)]
struct BookingListingRow {
    #[sqlx(flatten)]
    booking: BookingRow,
    product_title: String,
    product_price_cents: i64,
    buyer_name: String,
    buyer_email: String,
}

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

fn to_utc(dt: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(dt, Utc)
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_booking(row: BookingRow) -> Result<Booking> {
        Ok(Booking {
            id: parse_uuid(&row.id)?,
            buyer_id: parse_uuid(&row.buyer_id)?,
            seller_id: parse_uuid(&row.seller_id)?,
            product_id: parse_uuid(&row.product_id)?,
            chat_id: row.chat_id.as_deref().map(parse_uuid).transpose()?,
            total_price_cents: row.total_price_cents,
            is_confirmed: row.is_confirmed != 0,
            is_outdated: row.is_outdated != 0,
            is_paid: row.is_paid != 0,
            is_delivered: row.is_delivered != 0,
            buyer_review_left: row.buyer_review_left != 0,
            seller_review_left: row.seller_review_left != 0,
            created_at: to_utc(row.created_at),
            confirmed_at: row.confirmed_at.map(to_utc),
            outdated_at: row.outdated_at.map(to_utc),
            paid_at: row.paid_at.map(to_utc),
            delivered_at: row.delivered_at.map(to_utc),
            review_reminder_sent_at: row.review_reminder_sent_at.map(to_utc),
            payment_intent_id: row.payment_intent_id,
            validation_method: row.validation_method,
        })
    }

    fn row_to_listing(row: BookingListingRow) -> Result<BookingListing> {
        Ok(BookingListing {
            booking: Self::row_to_booking(row.booking)?,
            product_title: row.product_title,
            product_price_cents: row.product_price_cents,
            buyer_name: row.buyer_name,
            buyer_email: row.buyer_email,
        })
    }

    async fn fetch_bookings(&self, filter: &str, binds: Vec<String>) -> Result<Vec<Booking>> {
        let query = format!(
            "SELECT {} {} WHERE {} ORDER BY b.created_at ASC",
            BOOKING_COLUMNS, BOOKING_JOINS, filter
        );

        let mut q = sqlx::query_as::<_, BookingRow>(&query);
        for value in binds {
            q = q.bind(value);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn fetch_listings(&self, filter: &str, binds: Vec<String>) -> Result<Vec<BookingListing>> {
        let query = format!(
            r#"
            SELECT {},
                p.title AS product_title,
                p.price_cents AS product_price_cents,
                u.first_name || ' ' || u.last_name AS buyer_name,
                u.email AS buyer_email
            {}
            JOIN users u ON u.id = b.buyer_id
            WHERE {}
            ORDER BY b.created_at DESC
            "#,
            BOOKING_COLUMNS, BOOKING_JOINS, filter
        );

        let mut q = sqlx::query_as::<_, BookingListingRow>(&query);
        for value in binds {
            q = q.bind(value);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_listing).collect()
    }

    async fn guarded_update<'q>(
        &self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> Result<bool> {
        let result = query.execute(&self.pool).await.map_err(|e| {
            // Only the payment intent index can trip here.
            if is_unique_violation(&e) {
                AppError::Conflict("Payment intent is already attached to another booking".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn create_with_chat(&self, booking: &Booking, chat: &Chat) -> Result<Booking> {
        let map_insert_err = |e: sqlx::Error| {
            if is_unique_violation(&e) {
                AppError::Conflict("An active booking already exists for this product".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO bookings (id, buyer_id, product_id, total_price_cents, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(booking.id.to_string())
        .bind(booking.buyer_id.to_string())
        .bind(booking.product_id.to_string())
        .bind(booking.total_price_cents)
        .bind(booking.created_at.naive_utc())
        .execute(&mut *tx)
        .await
        .map_err(map_insert_err)?;

        sqlx::query(
            r#"
            INSERT INTO chats (id, product_id, booking_id, user_one_id, user_two_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(chat.id.to_string())
        .bind(chat.product_id.to_string())
        .bind(chat.booking_id.to_string())
        .bind(chat.user_one_id.to_string())
        .bind(chat.user_two_id.to_string())
        .bind(chat.created_at.naive_utc())
        .execute(&mut *tx)
        .await
        .map_err(map_insert_err)?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(booking.id)
            .await?
            .ok_or_else(|| AppError::Internal("Failed to retrieve created booking".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let query = format!("SELECT {} {} WHERE b.id = ?", BOOKING_COLUMNS, BOOKING_JOINS);

        let row = sqlx::query_as::<_, BookingRow>(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_booking).transpose()
    }

    async fn has_active_booking(&self, buyer_id: Uuid, product_id: Uuid) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM bookings
            WHERE buyer_id = ? AND product_id = ? AND is_confirmed = 0 AND is_outdated = 0
            "#,
        )
        .bind(buyer_id.to_string())
        .bind(product_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<BookingListing>> {
        let id = user_id.to_string();
        self.fetch_listings("(b.buyer_id = ? OR p.user_id = ?)", vec![id.clone(), id])
            .await
    }

    async fn list_for_seller(&self, seller_id: Uuid) -> Result<Vec<BookingListing>> {
        self.fetch_listings("p.user_id = ?", vec![seller_id.to_string()])
            .await
    }

    async fn list_pending_for_seller(&self, seller_id: Uuid) -> Result<Vec<BookingListing>> {
        self.fetch_listings(
            "p.user_id = ? AND b.is_confirmed = 0 AND b.is_outdated = 0",
            vec![seller_id.to_string()],
        )
        .await
    }

    async fn mark_confirmed(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        self.guarded_update(
            sqlx::query(
                r#"
                UPDATE bookings SET is_confirmed = 1, confirmed_at = ?
                WHERE id = ? AND is_confirmed = 0 AND is_outdated = 0
                "#,
            )
            .bind(at.naive_utc())
            .bind(id.to_string()),
        )
        .await
    }

    async fn mark_rejected(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        self.guarded_update(
            sqlx::query(
                r#"
                UPDATE bookings SET is_outdated = 1, outdated_at = ?
                WHERE id = ? AND is_confirmed = 0 AND is_outdated = 0
                "#,
            )
            .bind(at.naive_utc())
            .bind(id.to_string()),
        )
        .await
    }

    async fn mark_cancelled(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        self.guarded_update(
            sqlx::query(
                r#"
                UPDATE bookings SET is_confirmed = 0, is_outdated = 1, outdated_at = ?
                WHERE id = ? AND is_outdated = 0 AND is_paid = 0 AND is_delivered = 0
                "#,
            )
            .bind(at.naive_utc())
            .bind(id.to_string()),
        )
        .await
    }

    async fn set_payment_intent(&self, id: Uuid, payment_intent_id: &str) -> Result<bool> {
        self.guarded_update(
            sqlx::query(
                r#"
                UPDATE bookings SET payment_intent_id = ?
                WHERE id = ? AND is_confirmed = 1 AND is_outdated = 0 AND is_paid = 0
                "#,
            )
            .bind(payment_intent_id)
            .bind(id.to_string()),
        )
        .await
    }

    async fn mark_paid(&self, id: Uuid, payment_intent_id: &str, at: DateTime<Utc>) -> Result<bool> {
        self.guarded_update(
            sqlx::query(
                r#"
                UPDATE bookings SET is_paid = 1, paid_at = ?, payment_intent_id = ?
                WHERE id = ? AND is_confirmed = 1 AND is_outdated = 0 AND is_paid = 0
                "#,
            )
            .bind(at.naive_utc())
            .bind(payment_intent_id)
            .bind(id.to_string()),
        )
        .await
    }

    async fn list_pending_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>> {
        self.fetch_bookings(
            "b.is_confirmed = 0 AND b.is_outdated = 0 AND b.created_at < ?",
            vec![cutoff.naive_utc().to_string()],
        )
        .await
    }

    async fn list_needing_review_reminder(&self, now: DateTime<Utc>) -> Result<Vec<Booking>> {
        let window_start = now - Duration::days(REVIEW_REMINDER_WINDOW_DAYS);

        // The SQL narrows the candidates; the domain rule has the final say.
        let candidates = self
            .fetch_bookings(
                r#"b.is_delivered = 1
                AND (b.buyer_review_left = 0 OR b.seller_review_left = 0)
                AND b.delivered_at >= ?"#,
                vec![window_start.naive_utc().to_string()],
            )
            .await?;

        Ok(candidates
            .into_iter()
            .filter(|b| b.needs_review_reminder(now))
            .collect())
    }

    async fn mark_review_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE bookings SET review_reminder_sent_at = ? WHERE id = ?")
            .bind(at.naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}
