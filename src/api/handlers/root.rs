use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api::docs::ApiDoc;
use utoipa::OpenApi;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "MealMates API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Booking, payment and pickup validation for shared meals",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "auth": "/auth/login",
            "bookings": "/bookings",
            "reviews": "/reviews",
            "openapi": "/api/openapi.json"
        }
    }))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = serde_json::Value)
    ),
    tag = "Health"
)]
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub async fn openapi_spec() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
