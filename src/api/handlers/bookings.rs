use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{ConfirmPaymentRequest, CreateBookingRequest, RespondRequest, ValidateTransactionRequest},
    error::Result,
    payments::PaymentIntentHandle,
    service::{BookingView, QrCodeGrant, TransactionStatus},
};

#[utoipa::path(
    post,
    path = "/bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking created", body = BookingView),
        (status = 400, description = "Own product, unavailable product or active booking exists"),
        (status = 404, description = "Product not found")
    ),
    tag = "Bookings",
    security(("bearer_auth" = []))
)]
pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingView>)> {
    let view = state
        .service_context
        .booking_service
        .create(&current.user, req.product_id)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[utoipa::path(
    get,
    path = "/bookings/my",
    responses((status = 200, description = "Bookings where the caller is buyer or seller", body = [BookingView])),
    tag = "Bookings",
    security(("bearer_auth" = []))
)]
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<BookingView>>> {
    let views = state
        .service_context
        .booking_service
        .list_mine(current.user.id)
        .await?;
    Ok(Json(views))
}

#[utoipa::path(
    get,
    path = "/bookings/seller",
    responses((status = 200, description = "Bookings on the caller's products", body = [BookingView])),
    tag = "Bookings",
    security(("bearer_auth" = []))
)]
pub async fn list_as_seller(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<BookingView>>> {
    let views = state
        .service_context
        .booking_service
        .list_as_seller(current.user.id)
        .await?;
    Ok(Json(views))
}

#[utoipa::path(
    get,
    path = "/bookings/pending",
    responses((status = 200, description = "Pending bookings awaiting the caller's answer", body = [BookingView])),
    tag = "Bookings",
    security(("bearer_auth" = []))
)]
pub async fn list_pending(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<BookingView>>> {
    let views = state
        .service_context
        .booking_service
        .list_pending_for_seller(current.user.id)
        .await?;
    Ok(Json(views))
}

#[utoipa::path(
    get,
    path = "/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking", body = BookingView),
        (status = 403, description = "Caller is not a party to the booking"),
        (status = 404, description = "Booking not found")
    ),
    tag = "Bookings",
    security(("bearer_auth" = []))
)]
pub async fn get(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingView>> {
    let view = state
        .service_context
        .booking_service
        .get(id, current.user.id)
        .await?;
    Ok(Json(view))
}

#[utoipa::path(
    patch,
    path = "/bookings/{id}/respond",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = RespondRequest,
    responses(
        (status = 200, description = "Booking confirmed or rejected", body = BookingView),
        (status = 400, description = "Already processed or unknown action"),
        (status = 403, description = "Only the seller can respond")
    ),
    tag = "Bookings",
    security(("bearer_auth" = []))
)]
pub async fn respond(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<BookingView>> {
    let view = state
        .service_context
        .booking_service
        .respond(id, current.user.id, &req.action)
        .await?;
    Ok(Json(view))
}

#[utoipa::path(
    patch,
    path = "/bookings/{id}/cancel",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking cancelled", body = BookingView),
        (status = 400, description = "Already outdated, paid or delivered"),
        (status = 403, description = "Caller is not a party to the booking")
    ),
    tag = "Bookings",
    security(("bearer_auth" = []))
)]
pub async fn cancel(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingView>> {
    let view = state
        .service_context
        .booking_service
        .cancel(id, current.user.id)
        .await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/bookings/{id}/create-payment-intent",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Intent created", body = PaymentIntentHandle),
        (status = 400, description = "Not confirmed, already paid or free"),
        (status = 403, description = "Only the buyer can pay"),
        (status = 500, description = "Payment provider error")
    ),
    tag = "Payments",
    security(("bearer_auth" = []))
)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentIntentHandle>> {
    let handle = state
        .service_context
        .booking_service
        .create_payment_intent(id, current.user.id)
        .await?;
    Ok(Json(handle))
}

#[utoipa::path(
    post,
    path = "/bookings/{id}/confirm-payment",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Payment recorded", body = BookingView),
        (status = 400, description = "Missing intent or payment not validated"),
        (status = 403, description = "Only the buyer can pay")
    ),
    tag = "Payments",
    security(("bearer_auth" = []))
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> Result<Json<BookingView>> {
    let view = state
        .service_context
        .booking_service
        .confirm_payment(id, current.user.id, &req.payment_intent_id)
        .await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/bookings/{id}/generate-qr-code",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Pickup token issued, valid for 300 seconds", body = QrCodeGrant),
        (status = 400, description = "Not confirmed, not paid or already delivered"),
        (status = 403, description = "Only the buyer can generate the code")
    ),
    tag = "Pickup",
    security(("bearer_auth" = []))
)]
pub async fn generate_qr_code(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<QrCodeGrant>> {
    let grant = state
        .service_context
        .booking_service
        .generate_qr_code(id, current.user.id)
        .await?;
    Ok(Json(grant))
}

#[utoipa::path(
    post,
    path = "/bookings/{id}/validate-transaction",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = ValidateTransactionRequest,
    responses(
        (status = 200, description = "Booking delivered", body = TransactionStatus),
        (status = 400, description = "Invalid, used or expired token, or amount mismatch"),
        (status = 403, description = "Only the seller can validate")
    ),
    tag = "Pickup",
    security(("bearer_auth" = []))
)]
pub async fn validate_transaction(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ValidateTransactionRequest>,
) -> Result<Json<TransactionStatus>> {
    let status = state
        .service_context
        .booking_service
        .validate_transaction(id, current.user.id, &req.token, req.validation_data)
        .await?;
    Ok(Json(status))
}

#[utoipa::path(
    get,
    path = "/bookings/{id}/transaction-status",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Handoff status", body = TransactionStatus),
        (status = 403, description = "Caller is not a party to the booking")
    ),
    tag = "Pickup",
    security(("bearer_auth" = []))
)]
pub async fn transaction_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionStatus>> {
    let status = state
        .service_context
        .booking_service
        .transaction_status(id, current.user.id)
        .await?;
    Ok(Json(status))
}
