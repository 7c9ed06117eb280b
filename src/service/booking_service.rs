use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use qrcode::{render::svg, QrCode};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{authorize, can_perform, BookingAction},
    domain::*,
    error::{AppError, Result},
    notifications::{Notification, NotificationKind, NotificationManager},
    payments::{IntentStatus, PaymentGateway, PaymentIntentHandle},
    repository::{BookingRepository, ProductRepository, QrTokenRepository, UserRepository},
};

/// A booking as seen by one of its parties.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub product_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer_name: Option<String>,
    pub role: Party,
    pub can_confirm: bool,
    pub can_reject: bool,
    pub can_cancel: bool,
    pub can_pay: bool,
    pub can_generate_qr: bool,
    pub can_validate: bool,
    pub hours_since_created: i64,
}

impl BookingView {
    pub fn for_viewer(
        booking: Booking,
        product_title: String,
        buyer_name: Option<String>,
        viewer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let role = booking.party_of(viewer_id)?;
        let can_respond = can_perform(BookingAction::Respond, &booking, viewer_id) && booking.is_pending();

        Some(Self {
            role,
            can_confirm: can_respond,
            can_reject: can_respond,
            can_cancel: can_perform(BookingAction::Cancel, &booking, viewer_id)
                && !booking.is_paid
                && !booking.is_delivered,
            can_pay: can_perform(BookingAction::Pay, &booking, viewer_id) && !booking.is_free(),
            can_generate_qr: can_perform(BookingAction::GenerateQr, &booking, viewer_id),
            can_validate: can_perform(BookingAction::ValidateTransaction, &booking, viewer_id),
            hours_since_created: booking.hours_since_created(now),
            product_title,
            buyer_name,
            booking,
        })
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionStatus {
    pub booking_id: Uuid,
    pub is_confirmed: bool,
    pub is_paid: bool,
    pub is_delivered: bool,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub validation_method: Option<String>,
    pub can_generate_qr: bool,
    pub can_validate: bool,
}

impl TransactionStatus {
    fn of(booking: &Booking, viewer: Party) -> Self {
        let ready = booking.is_ready_for_handoff();
        Self {
            booking_id: booking.id,
            is_confirmed: booking.is_confirmed,
            is_paid: booking.is_paid,
            is_delivered: booking.is_delivered,
            is_completed: booking.is_delivered,
            completed_at: booking.delivered_at,
            validation_method: booking.validation_method.clone(),
            can_generate_qr: ready,
            can_validate: ready && viewer == Party::Seller,
        }
    }
}

/// A freshly issued pickup token. The plaintext token is only ever returned
/// here; the store keeps its digest.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QrCodeGrant {
    pub booking_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub valid_duration: i64,
    /// SVG rendering of the QR payload, ready to display.
    pub qr_code_svg: String,
}

pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    products: Arc<dyn ProductRepository>,
    users: Arc<dyn UserRepository>,
    qr_tokens: Arc<dyn QrTokenRepository>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    notifications: Arc<NotificationManager>,
    currency: String,
    pending_ttl: Duration,
}

impl BookingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        products: Arc<dyn ProductRepository>,
        users: Arc<dyn UserRepository>,
        qr_tokens: Arc<dyn QrTokenRepository>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        notifications: Arc<NotificationManager>,
        currency: String,
        pending_ttl_hours: i64,
    ) -> Self {
        Self {
            bookings,
            products,
            users,
            qr_tokens,
            gateway,
            notifications,
            currency,
            pending_ttl: Duration::hours(pending_ttl_hours),
        }
    }

    fn gateway(&self) -> Result<&Arc<dyn PaymentGateway>> {
        self.gateway
            .as_ref()
            .ok_or_else(|| AppError::External("Payment gateway is not configured".to_string()))
    }

    async fn load(&self, booking_id: Uuid) -> Result<(Booking, Product)> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        let product = self
            .products
            .find_by_id(booking.product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        Ok((booking, product))
    }

    async fn reload(&self, booking_id: Uuid) -> Result<Booking> {
        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    async fn notify(&self, booking: &Booking, party: Party, product_title: &str, kind: NotificationKind) {
        let user_id = booking.user_of(party);
        match self.users.find_by_id(user_id).await {
            Ok(Some(user)) => {
                self.notifications
                    .notify(Notification::new(&user, booking.id, product_title, kind))
                    .await;
            }
            Ok(None) => tracing::warn!("No user {} to notify for booking {}", user_id, booking.id),
            Err(e) => tracing::error!("Failed to load user {} for notification: {:?}", user_id, e),
        }
    }

    fn view(&self, booking: Booking, product: &Product, viewer_id: Uuid) -> Result<BookingView> {
        BookingView::for_viewer(booking, product.title.clone(), None, viewer_id, Utc::now())
            .ok_or(AppError::Forbidden)
    }

    fn listing_views(&self, listings: Vec<BookingListing>, viewer_id: Uuid) -> Vec<BookingView> {
        let now = Utc::now();
        listings
            .into_iter()
            .filter_map(|l| {
                BookingView::for_viewer(l.booking, l.product_title, Some(l.buyer_name), viewer_id, now)
            })
            .collect()
    }

    pub async fn create(&self, buyer: &User, product_id: Uuid) -> Result<BookingView> {
        let now = Utc::now();
        let product = self
            .products
            .find_by_id(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        if product.user_id == buyer.id {
            return Err(TransitionError::OwnProduct.into());
        }
        if !product.is_available(now) {
            return Err(TransitionError::ProductUnavailable(product.title.clone()).into());
        }
        if self.bookings.has_active_booking(buyer.id, product.id).await? {
            return Err(TransitionError::ActiveBookingExists(product.title.clone()).into());
        }

        let booking = Booking::new(buyer.id, &product, now);
        let chat = Chat::for_booking(&booking, now);

        // The partial unique index catches a concurrent duplicate that slipped
        // past the check above.
        let booking = match self.bookings.create_with_chat(&booking, &chat).await {
            Ok(booking) => booking,
            Err(AppError::Conflict(_)) => {
                return Err(TransitionError::ActiveBookingExists(product.title.clone()).into())
            }
            Err(e) => return Err(e),
        };

        tracing::info!("Buyer {} booked product {} ({})", buyer.id, product.id, booking.id);

        self.notify(&booking, Party::Buyer, &product.title, NotificationKind::BookingOpened)
            .await;
        self.notify(
            &booking,
            Party::Seller,
            &product.title,
            NotificationKind::BookingRequested {
                buyer_name: buyer.full_name(),
            },
        )
        .await;

        self.view(booking, &product, buyer.id)
    }

    pub async fn get(&self, booking_id: Uuid, user_id: Uuid) -> Result<BookingView> {
        let (booking, product) = self.load(booking_id).await?;
        authorize(BookingAction::View, &booking, user_id)?;
        self.view(booking, &product, user_id)
    }

    pub async fn list_mine(&self, user_id: Uuid) -> Result<Vec<BookingView>> {
        let listings = self.bookings.list_for_user(user_id).await?;
        Ok(self.listing_views(listings, user_id))
    }

    pub async fn list_as_seller(&self, seller_id: Uuid) -> Result<Vec<BookingView>> {
        let listings = self.bookings.list_for_seller(seller_id).await?;
        Ok(self.listing_views(listings, seller_id))
    }

    pub async fn list_pending_for_seller(&self, seller_id: Uuid) -> Result<Vec<BookingView>> {
        let listings = self.bookings.list_pending_for_seller(seller_id).await?;
        Ok(self.listing_views(listings, seller_id))
    }

    pub async fn respond(&self, booking_id: Uuid, seller_id: Uuid, action: &str) -> Result<BookingView> {
        let now = Utc::now();
        let (mut booking, product) = self.load(booking_id).await?;
        authorize(BookingAction::Respond, &booking, seller_id)?;

        let action = RespondAction::parse(action).ok_or_else(|| {
            AppError::Validation(format!("Invalid action '{}', expected confirm or reject", action))
        })?;

        let kind = match action {
            RespondAction::Confirm => {
                booking.confirm(now)?;
                if !self.bookings.mark_confirmed(booking.id, now).await? {
                    return Err(TransitionError::AlreadyProcessed.into());
                }
                NotificationKind::BookingConfirmed
            }
            RespondAction::Reject => {
                booking.reject(now)?;
                if !self.bookings.mark_rejected(booking.id, now).await? {
                    return Err(TransitionError::AlreadyProcessed.into());
                }
                NotificationKind::BookingRejected
            }
        };

        tracing::info!("Seller {} answered booking {} with {:?}", seller_id, booking.id, action);
        self.notify(&booking, Party::Buyer, &product.title, kind).await;

        self.view(booking, &product, seller_id)
    }

    pub async fn cancel(&self, booking_id: Uuid, user_id: Uuid) -> Result<BookingView> {
        let now = Utc::now();
        let (mut booking, product) = self.load(booking_id).await?;
        let party = authorize(BookingAction::Cancel, &booking, user_id)?;

        booking.cancel(now)?;
        if !self.bookings.mark_cancelled(booking.id, now).await? {
            return Err(TransitionError::AlreadyOutdated.into());
        }

        tracing::info!("Booking {} cancelled by the {}", booking.id, party.as_str());
        self.notify(
            &booking,
            party.other(),
            &product.title,
            NotificationKind::BookingCancelled { by: party },
        )
        .await;

        self.view(booking, &product, user_id)
    }

    pub async fn create_payment_intent(
        &self,
        booking_id: Uuid,
        buyer_id: Uuid,
    ) -> Result<PaymentIntentHandle> {
        let (booking, product) = self.load(booking_id).await?;
        authorize(BookingAction::Pay, &booking, buyer_id)?;

        if booking.is_free() {
            return Err(TransitionError::NothingToPay.into());
        }

        let mut metadata = HashMap::new();
        metadata.insert("booking_id".to_string(), booking.id.to_string());
        metadata.insert("user_id".to_string(), buyer_id.to_string());
        metadata.insert("product_title".to_string(), product.title.clone());

        let handle = self
            .gateway()?
            .create_intent(booking.total_price_cents, &self.currency, metadata)
            .await?;

        if !self.bookings.set_payment_intent(booking.id, &handle.id).await? {
            return Err(TransitionError::AlreadyPaid.into());
        }

        Ok(handle)
    }

    pub async fn confirm_payment(
        &self,
        booking_id: Uuid,
        buyer_id: Uuid,
        payment_intent_id: &str,
    ) -> Result<BookingView> {
        let now = Utc::now();
        let (mut booking, product) = self.load(booking_id).await?;
        authorize(BookingAction::Pay, &booking, buyer_id)?;

        let intent_id = payment_intent_id.trim();
        if intent_id.is_empty() {
            return Err(AppError::Validation("payment_intent_id is required".to_string()));
        }
        if booking.is_free() {
            return Err(TransitionError::NothingToPay.into());
        }
        match booking.payment_intent_id.as_deref() {
            Some(issued) if issued == intent_id => {}
            Some(_) => {
                return Err(AppError::Validation(
                    "Payment intent does not belong to this booking".to_string(),
                ))
            }
            None => {
                return Err(AppError::Validation(
                    "No payment intent was issued for this booking".to_string(),
                ))
            }
        }

        let status = self.gateway()?.retrieve_status(intent_id).await?;
        if status != IntentStatus::Succeeded {
            tracing::warn!(
                "Payment intent {} for booking {} is {}",
                intent_id,
                booking.id,
                status.as_str()
            );
            return Err(TransitionError::PaymentNotValidated.into());
        }

        booking.mark_paid(intent_id, now)?;
        if !self.bookings.mark_paid(booking.id, intent_id, now).await? {
            return Err(TransitionError::AlreadyPaid.into());
        }

        tracing::info!("Booking {} paid with {}", booking.id, intent_id);

        let amount_cents = booking.total_price_cents;
        self.notify(
            &booking,
            Party::Buyer,
            &product.title,
            NotificationKind::PaymentConfirmed { amount_cents },
        )
        .await;
        self.notify(
            &booking,
            Party::Seller,
            &product.title,
            NotificationKind::PaymentReceived { amount_cents },
        )
        .await;

        self.view(booking, &product, buyer_id)
    }

    pub async fn generate_qr_code(&self, booking_id: Uuid, buyer_id: Uuid) -> Result<QrCodeGrant> {
        let now = Utc::now();
        let booking = self.reload(booking_id).await?;
        authorize(BookingAction::GenerateQr, &booking, buyer_id)?;

        let (token, plaintext) = QrValidationToken::issue(booking.id, now);
        self.qr_tokens.create(&token).await?;

        let payload = serde_json::json!({
            "booking_id": booking.id,
            "token": plaintext,
        })
        .to_string();
        let qr_code_svg = QrCode::new(payload.as_bytes())
            .map_err(|e| AppError::Internal(format!("QR encoding failed: {}", e)))?
            .render::<svg::Color>()
            .min_dimensions(256, 256)
            .build();

        tracing::debug!("Issued pickup token {} for booking {}", token.id, booking.id);

        Ok(QrCodeGrant {
            booking_id: booking.id,
            token: plaintext,
            expires_at: token.expires_at,
            valid_duration: QR_TOKEN_TTL_SECS,
            qr_code_svg,
        })
    }

    pub async fn validate_transaction(
        &self,
        booking_id: Uuid,
        seller_id: Uuid,
        token: &str,
        validation_data: Option<ValidationData>,
    ) -> Result<TransactionStatus> {
        let now = Utc::now();
        let (booking, product) = self.load(booking_id).await?;

        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::Validation("Token is required".to_string()));
        }
        let token_hash = hash_token(token);

        match authorize(BookingAction::ValidateTransaction, &booking, seller_id) {
            Ok(_) => {}
            // A replayed token reads better as "already used" than as a
            // generic completed-transaction error.
            Err(AppError::Transition(TransitionError::AlreadyDelivered)) => {
                let replayed = self
                    .qr_tokens
                    .find_for_booking(booking.id, &token_hash)
                    .await?
                    .map_or(false, |t| t.is_used);
                let reason = if replayed {
                    TransitionError::TokenAlreadyUsed
                } else {
                    TransitionError::AlreadyDelivered
                };
                return Err(reason.into());
            }
            Err(e) => return Err(e),
        }

        let qr_token = self
            .qr_tokens
            .find_for_booking(booking.id, &token_hash)
            .await?
            .ok_or(TransitionError::TokenNotFound)?;
        qr_token.ensure_redeemable(now)?;

        if let Some(amount) = validation_data.and_then(|d| d.amount) {
            if !booking.amount_matches(amount) {
                return Err(TransitionError::AmountMismatch.into());
            }
        }

        // The domain transition runs first; `redeem` persists the same flip
        // under its own row guards.
        let mut booking = booking;
        booking.mark_delivered(now)?;

        if !self.qr_tokens.redeem(qr_token.id, booking.id, now).await? {
            return Err(TransitionError::TokenAlreadyUsed.into());
        }

        tracing::info!("Booking {} delivered", booking.id);

        for party in [Party::Buyer, Party::Seller] {
            self.notify(&booking, party, &product.title, NotificationKind::TransactionCompleted)
                .await;
        }

        Ok(TransactionStatus::of(&booking, Party::Seller))
    }

    pub async fn transaction_status(&self, booking_id: Uuid, user_id: Uuid) -> Result<TransactionStatus> {
        let booking = self.reload(booking_id).await?;
        let party = authorize(BookingAction::View, &booking, user_id)?;
        Ok(TransactionStatus::of(&booking, party))
    }

    /// Outdates pending bookings older than the configured TTL and tells the
    /// buyers. Returns how many were expired.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - self.pending_ttl;
        let stale = self.bookings.list_pending_created_before(cutoff).await?;
        let mut expired = 0;

        for mut booking in stale {
            if booking.expire(now).is_err() {
                continue;
            }
            // Lost to a concurrent respond or cancel.
            if !self.bookings.mark_rejected(booking.id, now).await? {
                continue;
            }
            expired += 1;

            let title = match self.products.find_by_id(booking.product_id).await? {
                Some(product) => product.title,
                None => String::new(),
            };
            self.notify(&booking, Party::Buyer, &title, NotificationKind::BookingExpired)
                .await;
        }

        tracing::info!("Expired {} stale bookings", expired);
        Ok(expired)
    }

    /// Reminds parties of recently delivered bookings that they still owe a
    /// review. Returns how many bookings were reminded about.
    pub async fn send_review_reminders(&self, now: DateTime<Utc>) -> Result<usize> {
        let due = self.bookings.list_needing_review_reminder(now).await?;
        let mut reminded = 0;

        for booking in due {
            let title = match self.products.find_by_id(booking.product_id).await? {
                Some(product) => product.title,
                None => String::new(),
            };
            for party in booking.pending_reviewers() {
                self.notify(&booking, party, &title, NotificationKind::ReviewReminder)
                    .await;
            }
            self.bookings.mark_review_reminder_sent(booking.id, now).await?;
            reminded += 1;
        }

        tracing::info!("Sent review reminders for {} bookings", reminded);
        Ok(reminded)
    }
}
