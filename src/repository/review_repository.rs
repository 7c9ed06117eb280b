use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{round_rating, RatingSummary, Review, ReviewType, TransitionError},
    error::{is_unique_violation, AppError, Result},
    repository::ReviewRepository,
};

const REVIEW_COLUMNS: &str = r#"
    id, author_id, reviewed_user_id, booking_id, review_type, overall_rating,
    product_quality_rating, punctuality_rating, friendliness_rating,
    communication_rating, reliability_rating, comment, is_visible,
    moderated_at, moderation_reason, created_at, updated_at
"#;

#[derive(FromRow)]
struct ReviewRow {
    id: String,
    author_id: String,
    reviewed_user_id: String,
    booking_id: String,
    review_type: String,
    overall_rating: i16,
    product_quality_rating: Option<i16>,
    punctuality_rating: Option<i16>,
    friendliness_rating: Option<i16>,
    communication_rating: Option<i16>,
    reliability_rating: Option<i16>,
    comment: Option<String>,
    is_visible: i32,
    moderated_at: Option<NaiveDateTime>,
    moderation_reason: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct RatingSummaryRow {
    total_reviews: i64,
    average_overall_rating: Option<f64>,
    average_product_quality: Option<f64>,
    average_punctuality: Option<f64>,
    average_friendliness: Option<f64>,
    average_communication: Option<f64>,
    average_reliability: Option<f64>,
}

pub struct SqliteReviewRepository {
    pool: SqlitePool,
}

impl SqliteReviewRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_review(row: ReviewRow) -> Result<Review> {
        let parse = |s: &str| Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()));

        Ok(Review {
            id: parse(&row.id)?,
            author_id: parse(&row.author_id)?,
            reviewed_user_id: parse(&row.reviewed_user_id)?,
            booking_id: parse(&row.booking_id)?,
            review_type: ReviewType::parse(&row.review_type).ok_or_else(|| {
                AppError::Database(format!("Invalid review type: {}", row.review_type))
            })?,
            overall_rating: row.overall_rating,
            product_quality_rating: row.product_quality_rating,
            punctuality_rating: row.punctuality_rating,
            friendliness_rating: row.friendliness_rating,
            communication_rating: row.communication_rating,
            reliability_rating: row.reliability_rating,
            comment: row.comment,
            is_visible: row.is_visible != 0,
            moderated_at: row.moderated_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            moderation_reason: row.moderation_reason,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    // The flag column on `bookings` that mirrors a review of this type.
    fn flag_column(review_type: ReviewType) -> &'static str {
        match review_type {
            ReviewType::BuyerToSeller => "buyer_review_left",
            ReviewType::SellerToBuyer => "seller_review_left",
        }
    }

    async fn fetch_reviews(&self, filter: &str, bind: Option<String>) -> Result<Vec<Review>> {
        let query = format!(
            "SELECT {} FROM reviews WHERE {} ORDER BY created_at DESC",
            REVIEW_COLUMNS, filter
        );

        let mut q = sqlx::query_as::<_, ReviewRow>(&query);
        if let Some(value) = bind {
            q = q.bind(value);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_review).collect()
    }

    async fn require(&self, id: Uuid) -> Result<Review> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))
    }
}

#[async_trait]
impl ReviewRepository for SqliteReviewRepository {
    async fn create_for_booking(&self, review: &Review) -> Result<Review> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO reviews (
                id, author_id, reviewed_user_id, booking_id, review_type, overall_rating,
                product_quality_rating, punctuality_rating, friendliness_rating,
                communication_rating, reliability_rating, comment, is_visible,
                moderated_at, moderation_reason, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(review.id.to_string())
        .bind(review.author_id.to_string())
        .bind(review.reviewed_user_id.to_string())
        .bind(review.booking_id.to_string())
        .bind(review.review_type.as_str())
        .bind(review.overall_rating)
        .bind(review.product_quality_rating)
        .bind(review.punctuality_rating)
        .bind(review.friendliness_rating)
        .bind(review.communication_rating)
        .bind(review.reliability_rating)
        .bind(&review.comment)
        .bind(review.is_visible as i32)
        .bind(review.moderated_at.map(|dt| dt.naive_utc()))
        .bind(&review.moderation_reason)
        .bind(review.created_at.naive_utc())
        .bind(review.updated_at.naive_utc())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Transition(TransitionError::AlreadyReviewed)
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        let flag = format!(
            "UPDATE bookings SET {} = 1 WHERE id = ?",
            Self::flag_column(review.review_type)
        );
        sqlx::query(&flag)
            .bind(review.booking_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.require(review.id).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Review>> {
        let query = format!("SELECT {} FROM reviews WHERE id = ?", REVIEW_COLUMNS);

        let row = sqlx::query_as::<_, ReviewRow>(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_review).transpose()
    }

    async fn find_by_booking_and_type(
        &self,
        booking_id: Uuid,
        review_type: ReviewType,
    ) -> Result<Option<Review>> {
        let query = format!(
            "SELECT {} FROM reviews WHERE booking_id = ? AND review_type = ?",
            REVIEW_COLUMNS
        );

        let row = sqlx::query_as::<_, ReviewRow>(&query)
            .bind(booking_id.to_string())
            .bind(review_type.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_review).transpose()
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> Result<Vec<Review>> {
        self.fetch_reviews("booking_id = ?", Some(booking_id.to_string()))
            .await
    }

    async fn list_visible_for_user(&self, user_id: Uuid) -> Result<Vec<Review>> {
        self.fetch_reviews(
            "reviewed_user_id = ? AND is_visible = 1",
            Some(user_id.to_string()),
        )
        .await
    }

    async fn list_pending_moderation(&self) -> Result<Vec<Review>> {
        self.fetch_reviews("moderated_at IS NULL AND is_visible = 1", None)
            .await
    }

    async fn update(&self, review: &Review) -> Result<Review> {
        sqlx::query(
            r#"
            UPDATE reviews SET
                overall_rating = ?, product_quality_rating = ?, punctuality_rating = ?,
                friendliness_rating = ?, communication_rating = ?, reliability_rating = ?,
                comment = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(review.overall_rating)
        .bind(review.product_quality_rating)
        .bind(review.punctuality_rating)
        .bind(review.friendliness_rating)
        .bind(review.communication_rating)
        .bind(review.reliability_rating)
        .bind(&review.comment)
        .bind(review.updated_at.naive_utc())
        .bind(review.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.require(review.id).await
    }

    async fn delete(&self, review: &Review) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(review.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Err(AppError::NotFound("Review not found".to_string()));
        }

        let flag = format!(
            "UPDATE bookings SET {} = 0 WHERE id = ?",
            Self::flag_column(review.review_type)
        );
        sqlx::query(&flag)
            .bind(review.booking_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    async fn set_visibility(
        &self,
        id: Uuid,
        is_visible: bool,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Review> {
        let result = sqlx::query(
            r#"
            UPDATE reviews SET is_visible = ?, moderation_reason = ?, moderated_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(is_visible as i32)
        .bind(reason)
        .bind(at.naive_utc())
        .bind(at.naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Review not found".to_string()));
        }

        self.require(id).await
    }

    async fn rating_summary(&self, user_id: Uuid) -> Result<RatingSummary> {
        let row = sqlx::query_as::<_, RatingSummaryRow>(
            r#"
            SELECT
                COUNT(*) AS total_reviews,
                AVG(overall_rating) AS average_overall_rating,
                AVG(product_quality_rating) AS average_product_quality,
                AVG(punctuality_rating) AS average_punctuality,
                AVG(friendliness_rating) AS average_friendliness,
                AVG(communication_rating) AS average_communication,
                AVG(reliability_rating) AS average_reliability
            FROM reviews
            WHERE reviewed_user_id = ? AND is_visible = 1
            "#,
        )
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(RatingSummary {
            user_id,
            total_reviews: row.total_reviews,
            average_overall_rating: round_rating(row.average_overall_rating),
            average_product_quality: round_rating(row.average_product_quality),
            average_punctuality: round_rating(row.average_punctuality),
            average_friendliness: round_rating(row.average_friendliness),
            average_communication: round_rating(row.average_communication),
            average_reliability: round_rating(row.average_reliability),
        })
    }
}
