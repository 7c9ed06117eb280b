mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use mealmates::api::create_app;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{harness, Harness};

fn app(h: &Harness) -> Router {
    create_app(h.ctx.clone(), Arc::new(h.settings.clone()))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> anyhow::Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

async fn register(app: &Router, email: &str) -> anyhow::Result<(String, String)> {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "email": email,
            "first_name": "Test",
            "last_name": "User",
            "password": "correct horse battery"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let token = body["token"].as_str().unwrap_or_default().to_string();
    let user_id = body["user"]["id"].as_str().unwrap_or_default().to_string();
    Ok((token, user_id))
}

#[tokio::test]
async fn test_health_and_openapi_are_public() -> anyhow::Result<()> {
    let h = harness().await?;
    let app = app(&h);

    let (status, body) = send(&app, Method::GET, "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/api/openapi.json", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/bookings/{id}/generate-qr-code"].is_object());

    Ok(())
}

#[tokio::test]
async fn test_register_login_and_auth_errors() -> anyhow::Result<()> {
    let h = harness().await?;
    let app = app(&h);

    register(&app, "Ada@Example.com").await?;

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "email": "ada@example.com",
            "first_name": "Ada",
            "last_name": "Again",
            "password": "correct horse battery"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "correct horse battery" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ada@example.com");

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "wrong" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::GET, "/bookings/my", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized");

    let (status, _) = send(&app, Method::GET, "/bookings/my", Some("garbage"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_free_booking_over_http() -> anyhow::Result<()> {
    let h = harness().await?;
    let app = app(&h);

    let (seller_token, seller_id) = register(&app, "seller@example.com").await?;
    let (buyer_token, _) = register(&app, "buyer@example.com").await?;
    let seller = h
        .ctx
        .user_repo
        .find_by_id(seller_id.parse()?)
        .await?
        .expect("seller exists");
    let product = h.product(&seller, "Bread", 0).await?;

    let (status, body) = send(
        &app,
        Method::POST,
        "/bookings",
        Some(&buyer_token),
        Some(json!({ "product_id": product.id })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["role"], "buyer");
    assert_eq!(body["is_confirmed"], false);
    let booking_id = body["id"].as_str().unwrap_or_default().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        "/bookings",
        Some(&buyer_token),
        Some(json!({ "product_id": product.id })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You already have an active booking for 'Bread'");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/bookings/{}/respond", booking_id),
        Some(&buyer_token),
        Some(json!({ "action": "confirm" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/bookings/{}/respond", booking_id),
        Some(&seller_token),
        Some(json!({ "action": "confirm" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_confirmed"], true);
    assert_eq!(body["role"], "seller");

    let (status, grant) = send(
        &app,
        Method::POST,
        &format!("/bookings/{}/generate-qr-code", booking_id),
        Some(&buyer_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(grant["valid_duration"], 300);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/bookings/{}/validate-transaction", booking_id),
        Some(&seller_token),
        Some(json!({ "token": grant["token"] })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["is_completed"], true);
    assert_eq!(body["validation_method"], "qr_code");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/bookings/{}/validate-transaction", booking_id),
        Some(&seller_token),
        Some(json!({ "token": grant["token"] })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Token already used");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/bookings/{}/reviews", booking_id),
        Some(&buyer_token),
        Some(json!({ "overall_rating": 5, "friendliness_rating": 5 })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let review_id = body["id"].as_str().unwrap_or_default().to_string();

    let (status, body) = send(&app, Method::GET, &format!("/reviews/{}", review_id), None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["review_type"], "buyer_to_seller");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/users/{}/ratings", seller_id),
        None,
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_reviews"], 1);
    assert_eq!(body["average_overall_rating"], 5.0);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/reviews/{}", review_id),
        Some(&buyer_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    Ok(())
}

#[tokio::test]
async fn test_unknown_booking_is_not_found() -> anyhow::Result<()> {
    let h = harness().await?;
    let app = app(&h);
    let (token, _) = register(&app, "someone@example.com").await?;

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/bookings/{}", uuid::Uuid::new_v4()),
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Booking not found");

    Ok(())
}
