use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod user_repository;
pub mod product_repository;
pub mod booking_repository;
pub mod qr_token_repository;
pub mod review_repository;

pub use user_repository::SqliteUserRepository;
pub use product_repository::SqliteProductRepository;
pub use booking_repository::SqliteBookingRepository;
pub use qr_token_repository::SqliteQrTokenRepository;
pub use review_repository::SqliteReviewRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    /// The user together with their stored password hash.
    async fn find_credentials(&self, email: &str) -> Result<Option<(User, String)>>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, product: Product) -> Result<Product>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>>;
}

/// Booking persistence. Every `mark_*` method is a guarded update: it only
/// applies when the row is still in the state the transition starts from,
/// and returns `false` when a concurrent request got there first.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Inserts the booking and its chat thread in one transaction. A second
    /// pending booking for the same buyer and product yields `Conflict`.
    async fn create_with_chat(&self, booking: &Booking, chat: &Chat) -> Result<Booking>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn has_active_booking(&self, buyer_id: Uuid, product_id: Uuid) -> Result<bool>;
    /// Bookings where the user is buyer or seller, newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<BookingListing>>;
    async fn list_for_seller(&self, seller_id: Uuid) -> Result<Vec<BookingListing>>;
    async fn list_pending_for_seller(&self, seller_id: Uuid) -> Result<Vec<BookingListing>>;
    async fn mark_confirmed(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;
    async fn mark_rejected(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;
    async fn mark_cancelled(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;
    async fn set_payment_intent(&self, id: Uuid, payment_intent_id: &str) -> Result<bool>;
    async fn mark_paid(&self, id: Uuid, payment_intent_id: &str, at: DateTime<Utc>) -> Result<bool>;
    async fn list_pending_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>>;
    async fn list_needing_review_reminder(&self, now: DateTime<Utc>) -> Result<Vec<Booking>>;
    async fn mark_review_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait QrTokenRepository: Send + Sync {
    async fn create(&self, token: &QrValidationToken) -> Result<()>;
    async fn find_for_booking(
        &self,
        booking_id: Uuid,
        token_hash: &str,
    ) -> Result<Option<QrValidationToken>>;
    /// Marks the token used and the booking delivered in one transaction.
    /// Returns `false`, with nothing written, if either was already consumed.
    async fn redeem(&self, token_id: Uuid, booking_id: Uuid, at: DateTime<Utc>) -> Result<bool>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Inserts the review and flags the booking in one transaction. A second
    /// review of the same type for the booking yields `Conflict`.
    async fn create_for_booking(&self, review: &Review) -> Result<Review>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Review>>;
    async fn find_by_booking_and_type(
        &self,
        booking_id: Uuid,
        review_type: ReviewType,
    ) -> Result<Option<Review>>;
    async fn list_for_booking(&self, booking_id: Uuid) -> Result<Vec<Review>>;
    async fn list_visible_for_user(&self, user_id: Uuid) -> Result<Vec<Review>>;
    async fn list_pending_moderation(&self) -> Result<Vec<Review>>;
    async fn update(&self, review: &Review) -> Result<Review>;
    /// Deletes the review and clears the booking's flag in one transaction.
    async fn delete(&self, review: &Review) -> Result<()>;
    async fn set_visibility(
        &self,
        id: Uuid,
        is_visible: bool,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Review>;
    async fn rating_summary(&self, user_id: Uuid) -> Result<RatingSummary>;
}
