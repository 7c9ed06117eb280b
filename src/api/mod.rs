pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        .route("/api/openapi.json", get(handlers::root::openapi_spec))

        // Auth routes
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))

        .nest("/bookings", booking_routes(app_state.clone()))
        .nest("/reviews", review_routes(app_state.clone()))
        .nest("/users", user_routes())

        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn booking_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::bookings::create))
        .route("/my", get(handlers::bookings::list_mine))
        .route("/seller", get(handlers::bookings::list_as_seller))
        .route("/pending", get(handlers::bookings::list_pending))
        .route("/:id", get(handlers::bookings::get))
        .route("/:id/respond", patch(handlers::bookings::respond))
        .route("/:id/cancel", patch(handlers::bookings::cancel))
        .route("/:id/create-payment-intent", post(handlers::bookings::create_payment_intent))
        .route("/:id/confirm-payment", post(handlers::bookings::confirm_payment))
        .route("/:id/generate-qr-code", post(handlers::bookings::generate_qr_code))
        .route("/:id/validate-transaction", post(handlers::bookings::validate_transaction))
        .route("/:id/transaction-status", get(handlers::bookings::transaction_status))
        .route(
            "/:id/reviews",
            get(handlers::reviews::list_for_booking).post(handlers::reviews::create),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn review_routes(state: AppState) -> Router<AppState> {
    // Reading a single review works anonymously; hidden reviews are only
    // shown to their author, their subject and moderators.
    let public = Router::new()
        .route("/:id", get(handlers::reviews::get))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::optional_auth,
        ));

    let protected = Router::new()
        .route("/moderation", get(handlers::reviews::pending_moderation))
        .route(
            "/:id",
            put(handlers::reviews::update).delete(handlers::reviews::delete),
        )
        .route("/:id/moderate", patch(handlers::reviews::moderate))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ));

    public.merge(protected)
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/:id/reviews", get(handlers::reviews::list_for_user))
        .route("/:id/ratings", get(handlers::reviews::rating_summary))
}
