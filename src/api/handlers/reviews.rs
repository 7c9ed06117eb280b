use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{CreateReviewRequest, ModerateReviewRequest, RatingSummary, Review, UpdateReviewRequest},
    error::Result,
};

#[utoipa::path(
    post,
    path = "/bookings/{id}/reviews",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 400, description = "Not delivered, already reviewed or invalid ratings"),
        (status = 403, description = "Caller is not a party to the booking")
    ),
    tag = "Reviews",
    security(("bearer_auth" = []))
)]
pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    let review = state
        .service_context
        .review_service
        .create(booking_id, &current.user, req)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[utoipa::path(
    get,
    path = "/bookings/{id}/reviews",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses((status = 200, description = "Reviews on the booking", body = [Review])),
    tag = "Reviews",
    security(("bearer_auth" = []))
)]
pub async fn list_for_booking(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Vec<Review>>> {
    let reviews = state
        .service_context
        .review_service
        .list_for_booking(booking_id, &current.user)
        .await?;
    Ok(Json(reviews))
}

#[utoipa::path(
    get,
    path = "/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review", body = Review),
        (status = 403, description = "Hidden review"),
        (status = 404, description = "Review not found")
    ),
    tag = "Reviews"
)]
pub async fn get(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Review>> {
    let viewer = current.as_ref().map(|Extension(c)| &c.user);
    let review = state.service_context.review_service.get(id, viewer).await?;
    Ok(Json(review))
}

#[utoipa::path(
    put,
    path = "/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review id")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = Review),
        (status = 403, description = "Not the author, or the edit window has passed")
    ),
    tag = "Reviews",
    security(("bearer_auth" = []))
)]
pub async fn update(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateReviewRequest>,
) -> Result<Json<Review>> {
    let review = state
        .service_context
        .review_service
        .update(id, &current.user, req)
        .await?;
    Ok(Json(review))
}

#[utoipa::path(
    delete,
    path = "/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review id")),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 403, description = "Not the author, or the delete window has passed")
    ),
    tag = "Reviews",
    security(("bearer_auth" = []))
)]
pub async fn delete(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state
        .service_context
        .review_service
        .delete(id, &current.user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    patch,
    path = "/reviews/{id}/moderate",
    params(("id" = Uuid, Path, description = "Review id")),
    request_body = ModerateReviewRequest,
    responses(
        (status = 200, description = "Visibility updated", body = Review),
        (status = 403, description = "Moderators only")
    ),
    tag = "Reviews",
    security(("bearer_auth" = []))
)]
pub async fn moderate(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ModerateReviewRequest>,
) -> Result<Json<Review>> {
    let review = state
        .service_context
        .review_service
        .moderate(id, &current.user, req)
        .await?;
    Ok(Json(review))
}

#[utoipa::path(
    get,
    path = "/reviews/moderation",
    responses(
        (status = 200, description = "Visible reviews no moderator has looked at yet", body = [Review]),
        (status = 403, description = "Moderators only")
    ),
    tag = "Reviews",
    security(("bearer_auth" = []))
)]
pub async fn pending_moderation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<Review>>> {
    let reviews = state
        .service_context
        .review_service
        .pending_moderation(&current.user)
        .await?;
    Ok(Json(reviews))
}

#[utoipa::path(
    get,
    path = "/users/{id}/reviews",
    params(("id" = Uuid, Path, description = "Reviewed user id")),
    responses((status = 200, description = "Visible reviews, newest first", body = [Review])),
    tag = "Reviews"
)]
pub async fn list_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<Review>>> {
    let reviews = state
        .service_context
        .review_service
        .list_for_user(user_id)
        .await?;
    Ok(Json(reviews))
}

#[utoipa::path(
    get,
    path = "/users/{id}/ratings",
    params(("id" = Uuid, Path, description = "Reviewed user id")),
    responses((status = 200, description = "Average ratings over visible reviews", body = RatingSummary)),
    tag = "Reviews"
)]
pub async fn rating_summary(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<RatingSummary>> {
    let summary = state
        .service_context
        .review_service
        .rating_summary(user_id)
        .await?;
    Ok(Json(summary))
}
