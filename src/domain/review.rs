use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::booking::Party;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub author_id: Uuid,
    pub reviewed_user_id: Uuid,
    pub booking_id: Uuid,
    pub review_type: ReviewType,
    pub overall_rating: i16,
    pub product_quality_rating: Option<i16>,
    pub punctuality_rating: Option<i16>,
    pub friendliness_rating: Option<i16>,
    pub communication_rating: Option<i16>,
    pub reliability_rating: Option<i16>,
    pub comment: Option<String>,
    pub is_visible: bool,
    pub moderated_at: Option<DateTime<Utc>>,
    pub moderation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewType {
    BuyerToSeller,
    SellerToBuyer,
}

impl ReviewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewType::BuyerToSeller => "buyer_to_seller",
            ReviewType::SellerToBuyer => "seller_to_buyer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buyer_to_seller" => Some(ReviewType::BuyerToSeller),
            "seller_to_buyer" => Some(ReviewType::SellerToBuyer),
            _ => None,
        }
    }

    /// The review a party writes about the other side.
    pub fn written_by(party: Party) -> Self {
        match party {
            Party::Buyer => ReviewType::BuyerToSeller,
            Party::Seller => ReviewType::SellerToBuyer,
        }
    }

    /// Rating dimensions that apply to this direction, besides the overall one.
    pub fn dimensions(&self) -> &'static [RatingDimension] {
        match self {
            ReviewType::BuyerToSeller => &[
                RatingDimension::ProductQuality,
                RatingDimension::Punctuality,
                RatingDimension::Friendliness,
            ],
            ReviewType::SellerToBuyer => &[
                RatingDimension::Communication,
                RatingDimension::Reliability,
                RatingDimension::Punctuality,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingDimension {
    ProductQuality,
    Punctuality,
    Friendliness,
    Communication,
    Reliability,
}

impl RatingDimension {
    pub fn field_name(&self) -> &'static str {
        match self {
            RatingDimension::ProductQuality => "product_quality_rating",
            RatingDimension::Punctuality => "punctuality_rating",
            RatingDimension::Friendliness => "friendliness_rating",
            RatingDimension::Communication => "communication_rating",
            RatingDimension::Reliability => "reliability_rating",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Ratings must be between 1 and 5"))]
    pub overall_rating: i16,
    #[validate(range(min = 1, max = 5, message = "Ratings must be between 1 and 5"))]
    pub product_quality_rating: Option<i16>,
    #[validate(range(min = 1, max = 5, message = "Ratings must be between 1 and 5"))]
    pub punctuality_rating: Option<i16>,
    #[validate(range(min = 1, max = 5, message = "Ratings must be between 1 and 5"))]
    pub friendliness_rating: Option<i16>,
    #[validate(range(min = 1, max = 5, message = "Ratings must be between 1 and 5"))]
    pub communication_rating: Option<i16>,
    #[validate(range(min = 1, max = 5, message = "Ratings must be between 1 and 5"))]
    pub reliability_rating: Option<i16>,
    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Ratings must be between 1 and 5"))]
    pub overall_rating: Option<i16>,
    #[validate(range(min = 1, max = 5, message = "Ratings must be between 1 and 5"))]
    pub product_quality_rating: Option<i16>,
    #[validate(range(min = 1, max = 5, message = "Ratings must be between 1 and 5"))]
    pub punctuality_rating: Option<i16>,
    #[validate(range(min = 1, max = 5, message = "Ratings must be between 1 and 5"))]
    pub friendliness_rating: Option<i16>,
    #[validate(range(min = 1, max = 5, message = "Ratings must be between 1 and 5"))]
    pub communication_rating: Option<i16>,
    #[validate(range(min = 1, max = 5, message = "Ratings must be between 1 and 5"))]
    pub reliability_rating: Option<i16>,
    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ModerateReviewRequest {
    pub is_visible: bool,
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

/// Averages over a user's visible reviews, rounded to one decimal.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RatingSummary {
    pub user_id: Uuid,
    pub total_reviews: i64,
    pub average_overall_rating: Option<f64>,
    pub average_product_quality: Option<f64>,
    pub average_punctuality: Option<f64>,
    pub average_friendliness: Option<f64>,
    pub average_communication: Option<f64>,
    pub average_reliability: Option<f64>,
}

pub fn round_rating(value: Option<f64>) -> Option<f64> {
    value.map(|v| (v * 10.0).round() / 10.0)
}

fn provided(
    product_quality: Option<i16>,
    punctuality: Option<i16>,
    friendliness: Option<i16>,
    communication: Option<i16>,
    reliability: Option<i16>,
) -> Vec<RatingDimension> {
    [
        (RatingDimension::ProductQuality, product_quality),
        (RatingDimension::Punctuality, punctuality),
        (RatingDimension::Friendliness, friendliness),
        (RatingDimension::Communication, communication),
        (RatingDimension::Reliability, reliability),
    ]
    .into_iter()
    .filter_map(|(dimension, value)| value.map(|_| dimension))
    .collect()
}

/// Rejects ratings for dimensions that do not apply to `review_type`.
fn ensure_dimensions(review_type: ReviewType, given: Vec<RatingDimension>) -> Result<(), String> {
    let allowed = review_type.dimensions();
    match given.into_iter().find(|d| !allowed.contains(d)) {
        Some(dimension) => Err(format!(
            "'{}' does not apply to a {} review",
            dimension.field_name(),
            review_type.as_str()
        )),
        None => Ok(()),
    }
}

impl CreateReviewRequest {
    pub fn ensure_dimensions(&self, review_type: ReviewType) -> Result<(), String> {
        ensure_dimensions(
            review_type,
            provided(
                self.product_quality_rating,
                self.punctuality_rating,
                self.friendliness_rating,
                self.communication_rating,
                self.reliability_rating,
            ),
        )
    }
}

impl UpdateReviewRequest {
    pub fn ensure_dimensions(&self, review_type: ReviewType) -> Result<(), String> {
        ensure_dimensions(
            review_type,
            provided(
                self.product_quality_rating,
                self.punctuality_rating,
                self.friendliness_rating,
                self.communication_rating,
                self.reliability_rating,
            ),
        )
    }
}

impl Review {
    pub fn new(
        author_id: Uuid,
        reviewed_user_id: Uuid,
        booking_id: Uuid,
        review_type: ReviewType,
        request: CreateReviewRequest,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            reviewed_user_id,
            booking_id,
            review_type,
            overall_rating: request.overall_rating,
            product_quality_rating: request.product_quality_rating,
            punctuality_rating: request.punctuality_rating,
            friendliness_rating: request.friendliness_rating,
            communication_rating: request.communication_rating,
            reliability_rating: request.reliability_rating,
            comment: request.comment,
            is_visible: true,
            moderated_at: None,
            moderation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: UpdateReviewRequest, now: DateTime<Utc>) {
        if let Some(rating) = update.overall_rating {
            self.overall_rating = rating;
        }
        if update.product_quality_rating.is_some() {
            self.product_quality_rating = update.product_quality_rating;
        }
        if update.punctuality_rating.is_some() {
            self.punctuality_rating = update.punctuality_rating;
        }
        if update.friendliness_rating.is_some() {
            self.friendliness_rating = update.friendliness_rating;
        }
        if update.communication_rating.is_some() {
            self.communication_rating = update.communication_rating;
        }
        if update.reliability_rating.is_some() {
            self.reliability_rating = update.reliability_rating;
        }
        if update.comment.is_some() {
            self.comment = update.comment;
        }
        self.updated_at = now;
    }
}
