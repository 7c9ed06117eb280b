use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::review_voter,
    domain::*,
    error::{AppError, Result},
    repository::{BookingRepository, ReviewRepository},
};

pub struct ReviewService {
    reviews: Arc<dyn ReviewRepository>,
    bookings: Arc<dyn BookingRepository>,
}

impl ReviewService {
    pub fn new(reviews: Arc<dyn ReviewRepository>, bookings: Arc<dyn BookingRepository>) -> Self {
        Self { reviews, bookings }
    }

    async fn require(&self, id: Uuid) -> Result<Review> {
        self.reviews
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))
    }

    /// The author's side of the booking decides the review direction; the
    /// other side is the reviewed user.
    pub async fn create(
        &self,
        booking_id: Uuid,
        author: &User,
        request: CreateReviewRequest,
    ) -> Result<Review> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        let party = booking.party_of(author.id).ok_or(AppError::Forbidden)?;
        request.validate()?;

        if !booking.is_delivered {
            return Err(TransitionError::NotDelivered.into());
        }

        let review_type = ReviewType::written_by(party);
        request
            .ensure_dimensions(review_type)
            .map_err(AppError::Validation)?;

        if booking.review_left(review_type) {
            return Err(TransitionError::AlreadyReviewed.into());
        }

        let review = Review::new(
            author.id,
            booking.user_of(party.other()),
            booking.id,
            review_type,
            request,
            Utc::now(),
        );
        let review = self.reviews.create_for_booking(&review).await?;

        tracing::info!(
            "User {} left a {} review on booking {}",
            author.id,
            review_type.as_str(),
            booking.id
        );
        Ok(review)
    }

    pub async fn get(&self, id: Uuid, viewer: Option<&User>) -> Result<Review> {
        let review = self.require(id).await?;
        if !review_voter::can_view(&review, viewer) {
            return Err(AppError::Forbidden);
        }
        Ok(review)
    }

    /// Reviews on a booking that the viewer is allowed to see.
    pub async fn list_for_booking(&self, booking_id: Uuid, viewer: &User) -> Result<Vec<Review>> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if booking.party_of(viewer.id).is_none() && !viewer.can_moderate() {
            return Err(AppError::Forbidden);
        }

        Ok(self
            .reviews
            .list_for_booking(booking.id)
            .await?
            .into_iter()
            .filter(|r| review_voter::can_view(r, Some(viewer)))
            .collect())
    }

    pub async fn update(&self, id: Uuid, user: &User, request: UpdateReviewRequest) -> Result<Review> {
        let now = Utc::now();
        let mut review = self.require(id).await?;

        if !review_voter::can_edit(&review, user, now) {
            return Err(AppError::Forbidden);
        }

        request.validate()?;
        request
            .ensure_dimensions(review.review_type)
            .map_err(AppError::Validation)?;

        review.apply(request, now);
        self.reviews.update(&review).await
    }

    pub async fn delete(&self, id: Uuid, user: &User) -> Result<()> {
        let review = self.require(id).await?;

        if !review_voter::can_delete(&review, user, Utc::now()) {
            return Err(AppError::Forbidden);
        }

        self.reviews.delete(&review).await?;
        tracing::info!("Review {} deleted by {}", review.id, user.id);
        Ok(())
    }

    pub async fn moderate(
        &self,
        id: Uuid,
        moderator: &User,
        request: ModerateReviewRequest,
    ) -> Result<Review> {
        if !review_voter::can_moderate(moderator) {
            return Err(AppError::Forbidden);
        }
        request.validate()?;

        let review = self
            .reviews
            .set_visibility(id, request.is_visible, request.reason.as_deref(), Utc::now())
            .await?;

        tracing::info!(
            "Moderator {} set review {} visible={}",
            moderator.id,
            review.id,
            review.is_visible
        );
        Ok(review)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Review>> {
        self.reviews.list_visible_for_user(user_id).await
    }

    pub async fn rating_summary(&self, user_id: Uuid) -> Result<RatingSummary> {
        self.reviews.rating_summary(user_id).await
    }

    pub async fn pending_moderation(&self, moderator: &User) -> Result<Vec<Review>> {
        if !review_voter::can_moderate(moderator) {
            return Err(AppError::Forbidden);
        }
        self.reviews.list_pending_moderation().await
    }
}
