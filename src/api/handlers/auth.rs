use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    api::state::AppState,
    auth::AuthToken,
    domain::RegisterRequest,
    error::Result,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthToken),
        (status = 400, description = "Invalid input or email already registered")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthToken>)> {
    let token = state.service_context.auth_service.register(req).await?;
    Ok((StatusCode::CREATED, Json(token)))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthToken),
        (status = 401, description = "Wrong email or password")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthToken>> {
    let token = state
        .service_context
        .auth_service
        .login(&req.email, &req.password)
        .await?;
    Ok(Json(token))
}
