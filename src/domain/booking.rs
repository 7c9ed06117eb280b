use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use super::product::Product;
use super::review::ReviewType;

/// `validation_method` recorded when a QR handoff completes a booking.
pub const VALIDATION_METHOD_QR: &str = "qr_code";

/// How long a delivered booking stays eligible for review reminders, and the
/// minimum gap between two reminders.
pub const REVIEW_REMINDER_WINDOW_DAYS: i64 = 7;

/// A buyer's reservation of a seller's product.
///
/// `seller_id` is not stored on the booking row; repositories fill it in by
/// joining through the product.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Booking {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub product_id: Uuid,
    pub chat_id: Option<Uuid>,
    pub total_price_cents: i64,
    pub is_confirmed: bool,
    pub is_outdated: bool,
    pub is_paid: bool,
    pub is_delivered: bool,
    pub buyer_review_left: bool,
    pub seller_review_left: bool,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub outdated_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub review_reminder_sent_at: Option<DateTime<Utc>>,
    pub payment_intent_id: Option<String>,
    pub validation_method: Option<String>,
}

/// A booking joined with the product and buyer details list views show.
#[derive(Debug, Clone, Serialize)]
pub struct BookingListing {
    pub booking: Booking,
    pub product_title: String,
    pub product_price_cents: i64,
    pub buyer_name: String,
    pub buyer_email: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateBookingRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RespondRequest {
    /// `confirm` or `reject`.
    pub action: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    #[serde(default)]
    pub payment_intent_id: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ValidateTransactionRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub validation_data: Option<ValidationData>,
}

/// Extra checks the seller can make at pickup.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ValidationData {
    /// Amount handed over, in currency units (e.g. `10.5`).
    pub amount: Option<f64>,
}

/// The side a user is on for a given booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Buyer,
    Seller,
}

impl Party {
    pub fn as_str(&self) -> &'static str {
        match self {
            Party::Buyer => "buyer",
            Party::Seller => "seller",
        }
    }

    pub fn other(&self) -> Party {
        match self {
            Party::Buyer => Party::Seller,
            Party::Seller => Party::Buyer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespondAction {
    Confirm,
    Reject,
}

impl RespondAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirm" => Some(RespondAction::Confirm),
            "reject" => Some(RespondAction::Reject),
            _ => None,
        }
    }
}

/// A lifecycle rule was violated. Returned before any state is written.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("You cannot book your own product")]
    OwnProduct,

    #[error("Product '{0}' is no longer available")]
    ProductUnavailable(String),

    #[error("You already have an active booking for '{0}'")]
    ActiveBookingExists(String),

    #[error("This booking has already been processed")]
    AlreadyProcessed,

    #[error("This booking is already cancelled or expired")]
    AlreadyOutdated,

    #[error("The booking must be confirmed first")]
    NotConfirmed,

    #[error("This booking is already paid")]
    AlreadyPaid,

    #[error("A paid booking can no longer be cancelled")]
    PaidBookingNotCancellable,

    #[error("This booking is free and needs no payment")]
    NothingToPay,

    #[error("The booking must be paid first")]
    NotPaid,

    #[error("The payment was not validated by the payment provider")]
    PaymentNotValidated,

    #[error("This transaction is already completed")]
    AlreadyDelivered,

    #[error("Invalid token")]
    TokenNotFound,

    #[error("Token already used")]
    TokenAlreadyUsed,

    #[error("Token expired")]
    TokenExpired,

    #[error("Validation amount does not match the booking total")]
    AmountMismatch,

    #[error("Reviews are only allowed once the booking is delivered")]
    NotDelivered,

    #[error("You have already reviewed this booking")]
    AlreadyReviewed,
}

impl Booking {
    /// A pending booking for `product`, priced at the product's current price.
    pub fn new(buyer_id: Uuid, product: &Product, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            buyer_id,
            seller_id: product.user_id,
            product_id: product.id,
            chat_id: None,
            total_price_cents: product.price_cents,
            is_confirmed: false,
            is_outdated: false,
            is_paid: false,
            is_delivered: false,
            buyer_review_left: false,
            seller_review_left: false,
            created_at: now,
            confirmed_at: None,
            outdated_at: None,
            paid_at: None,
            delivered_at: None,
            review_reminder_sent_at: None,
            payment_intent_id: None,
            validation_method: None,
        }
    }

    pub fn party_of(&self, user_id: Uuid) -> Option<Party> {
        if user_id == self.buyer_id {
            Some(Party::Buyer)
        } else if user_id == self.seller_id {
            Some(Party::Seller)
        } else {
            None
        }
    }

    pub fn user_of(&self, party: Party) -> Uuid {
        match party {
            Party::Buyer => self.buyer_id,
            Party::Seller => self.seller_id,
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.is_confirmed && !self.is_outdated
    }

    pub fn is_free(&self) -> bool {
        self.total_price_cents == 0
    }

    /// Paid, or nothing to pay.
    pub fn is_settled(&self) -> bool {
        self.is_paid || self.is_free()
    }

    /// Confirmed, settled and not yet handed over: the QR step is open.
    pub fn is_ready_for_handoff(&self) -> bool {
        self.is_confirmed && self.is_settled() && !self.is_delivered
    }

    pub fn ensure_pending(&self) -> Result<(), TransitionError> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(TransitionError::AlreadyProcessed)
        }
    }

    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_pending()?;
        self.is_confirmed = true;
        self.confirmed_at = Some(now);
        Ok(())
    }

    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_pending()?;
        self.is_outdated = true;
        self.outdated_at = Some(now);
        Ok(())
    }

    /// Pending bookings left unanswered past their TTL.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.reject(now)
    }

    /// Cancelling a confirmed booking clears `is_confirmed`; `confirmed_at`
    /// stays as history.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.is_outdated {
            return Err(TransitionError::AlreadyOutdated);
        }
        if self.is_delivered {
            return Err(TransitionError::AlreadyDelivered);
        }
        if self.is_paid {
            return Err(TransitionError::PaidBookingNotCancellable);
        }
        self.is_confirmed = false;
        self.is_outdated = true;
        self.outdated_at = Some(now);
        Ok(())
    }

    pub fn ensure_payable(&self) -> Result<(), TransitionError> {
        if self.is_outdated {
            return Err(TransitionError::AlreadyOutdated);
        }
        if !self.is_confirmed {
            return Err(TransitionError::NotConfirmed);
        }
        if self.is_paid {
            return Err(TransitionError::AlreadyPaid);
        }
        Ok(())
    }

    pub fn mark_paid(
        &mut self,
        payment_intent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_payable()?;
        self.is_paid = true;
        self.paid_at = Some(now);
        self.payment_intent_id = Some(payment_intent_id.to_string());
        Ok(())
    }

    pub fn ensure_ready_for_handoff(&self) -> Result<(), TransitionError> {
        if !self.is_confirmed {
            return Err(TransitionError::NotConfirmed);
        }
        if !self.is_settled() {
            return Err(TransitionError::NotPaid);
        }
        if self.is_delivered {
            return Err(TransitionError::AlreadyDelivered);
        }
        Ok(())
    }

    pub fn mark_delivered(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_ready_for_handoff()?;
        self.is_delivered = true;
        self.delivered_at = Some(now);
        self.validation_method = Some(VALIDATION_METHOD_QR.to_string());
        Ok(())
    }

    /// Compares a handoff amount given in currency units against the total.
    pub fn amount_matches(&self, amount: f64) -> bool {
        amount.is_finite() && (amount * 100.0).round() as i64 == self.total_price_cents
    }

    pub fn review_left(&self, review_type: ReviewType) -> bool {
        match review_type {
            ReviewType::BuyerToSeller => self.buyer_review_left,
            ReviewType::SellerToBuyer => self.seller_review_left,
        }
    }

    pub fn all_reviews_left(&self) -> bool {
        self.buyer_review_left && self.seller_review_left
    }

    /// Parties that still owe a review.
    pub fn pending_reviewers(&self) -> Vec<Party> {
        let mut parties = Vec::new();
        if !self.buyer_review_left {
            parties.push(Party::Buyer);
        }
        if !self.seller_review_left {
            parties.push(Party::Seller);
        }
        parties
    }

    pub fn needs_review_reminder(&self, now: DateTime<Utc>) -> bool {
        if !self.is_delivered || self.all_reviews_left() {
            return false;
        }

        let window = Duration::days(REVIEW_REMINDER_WINDOW_DAYS);
        match self.delivered_at {
            Some(delivered_at) if delivered_at >= now - window => {}
            _ => return false,
        }

        match self.review_reminder_sent_at {
            None => true,
            Some(sent_at) => now - sent_at >= window,
        }
    }

    pub fn hours_since_created(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_hours()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(price_cents: i64) -> Booking {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Bread basket".to_string(),
            product_type: "bakery".to_string(),
            price_cents,
            expires_at: now + Duration::days(2),
            is_active: true,
            created_at: now,
        };
        Booking::new(Uuid::new_v4(), &product, now)
    }

    fn assert_invariants(b: &Booking) {
        assert!(!(b.is_confirmed && b.is_outdated));
        assert!(!b.is_paid || b.is_confirmed);
        assert!(!b.is_delivered || (b.is_confirmed && b.is_settled()));
    }

    #[test]
    fn test_new_booking_is_pending() {
        let b = booking(1000);
        assert!(b.is_pending());
        assert_eq!(b.total_price_cents, 1000);
        assert_eq!(b.party_of(b.buyer_id), Some(Party::Buyer));
        assert_eq!(b.party_of(b.seller_id), Some(Party::Seller));
        assert_eq!(b.party_of(Uuid::new_v4()), None);
        assert_invariants(&b);
    }

    #[test]
    fn test_confirm_then_respond_again_fails() {
        let now = Utc::now();
        let mut b = booking(1000);
        b.confirm(now).unwrap();
        assert!(b.is_confirmed);
        assert_eq!(b.confirmed_at, Some(now));
        assert_eq!(b.reject(now), Err(TransitionError::AlreadyProcessed));
        assert_eq!(b.confirm(now), Err(TransitionError::AlreadyProcessed));
        assert_invariants(&b);
    }

    #[test]
    fn test_reject_leaves_confirmed_at_empty() {
        let mut b = booking(1000);
        b.reject(Utc::now()).unwrap();
        assert!(b.is_outdated);
        assert!(b.confirmed_at.is_none());
        assert_invariants(&b);
    }

    #[test]
    fn test_cancel_rules() {
        let now = Utc::now();

        let mut confirmed = booking(1000);
        confirmed.confirm(now).unwrap();
        confirmed.cancel(now).unwrap();
        assert!(confirmed.is_outdated && !confirmed.is_confirmed);
        assert!(confirmed.confirmed_at.is_some());
        assert_eq!(confirmed.cancel(now), Err(TransitionError::AlreadyOutdated));
        assert_invariants(&confirmed);

        let mut paid = booking(1000);
        paid.confirm(now).unwrap();
        paid.mark_paid("pi_1", now).unwrap();
        assert_eq!(paid.cancel(now), Err(TransitionError::PaidBookingNotCancellable));
        assert_invariants(&paid);
    }

    #[test]
    fn test_payment_requires_confirmation() {
        let now = Utc::now();
        let mut b = booking(1000);
        assert_eq!(b.mark_paid("pi_1", now), Err(TransitionError::NotConfirmed));
        b.confirm(now).unwrap();
        b.mark_paid("pi_1", now).unwrap();
        assert_eq!(b.payment_intent_id.as_deref(), Some("pi_1"));
        assert_eq!(b.mark_paid("pi_1", now), Err(TransitionError::AlreadyPaid));
        assert_invariants(&b);
    }

    #[test]
    fn test_handoff_requires_settlement() {
        let now = Utc::now();
        let mut paid = booking(1000);
        paid.confirm(now).unwrap();
        assert_eq!(paid.ensure_ready_for_handoff(), Err(TransitionError::NotPaid));
        paid.mark_paid("pi_1", now).unwrap();
        paid.mark_delivered(now).unwrap();
        assert_eq!(paid.validation_method.as_deref(), Some(VALIDATION_METHOD_QR));
        assert_eq!(paid.mark_delivered(now), Err(TransitionError::AlreadyDelivered));
        assert_invariants(&paid);

        let mut free = booking(0);
        assert_eq!(free.ensure_ready_for_handoff(), Err(TransitionError::NotConfirmed));
        free.confirm(now).unwrap();
        assert!(free.is_ready_for_handoff());
        free.mark_delivered(now).unwrap();
        assert_invariants(&free);
    }

    #[test]
    fn test_amount_matches() {
        let b = booking(1050);
        assert!(b.amount_matches(10.5));
        assert!(b.amount_matches(10.50000001));
        assert!(!b.amount_matches(10.0));
        assert!(!b.amount_matches(f64::NAN));
    }

    #[test]
    fn test_review_reminder_window() {
        let now = Utc::now();
        let mut b = booking(0);
        b.confirm(now).unwrap();
        assert!(!b.needs_review_reminder(now));

        b.mark_delivered(now - Duration::days(1)).unwrap();
        assert!(b.needs_review_reminder(now));

        b.review_reminder_sent_at = Some(now - Duration::days(2));
        assert!(!b.needs_review_reminder(now));

        b.review_reminder_sent_at = None;
        b.buyer_review_left = true;
        assert_eq!(b.pending_reviewers(), vec![Party::Seller]);
        b.seller_review_left = true;
        assert!(!b.needs_review_reminder(now));

        let mut old = booking(0);
        old.confirm(now).unwrap();
        old.mark_delivered(now - Duration::days(8)).unwrap();
        assert!(!old.needs_review_reminder(now));
    }
}
