use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    api::handlers::{self, auth::LoginRequest},
    auth::AuthToken,
    domain::{
        Booking, ConfirmPaymentRequest, CreateBookingRequest, CreateReviewRequest,
        ModerateReviewRequest, Party, Product, RatingSummary, RegisterRequest, RespondRequest,
        Review, ReviewType, Role, UpdateReviewRequest, User, ValidateTransactionRequest,
        ValidationData,
    },
    payments::PaymentIntentHandle,
    service::{BookingView, QrCodeGrant, TransactionStatus},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::root::health_check,
        handlers::auth::register,
        handlers::auth::login,
        handlers::bookings::create,
        handlers::bookings::list_mine,
        handlers::bookings::list_as_seller,
        handlers::bookings::list_pending,
        handlers::bookings::get,
        handlers::bookings::respond,
        handlers::bookings::cancel,
        handlers::bookings::create_payment_intent,
        handlers::bookings::confirm_payment,
        handlers::bookings::generate_qr_code,
        handlers::bookings::validate_transaction,
        handlers::bookings::transaction_status,
        handlers::reviews::create,
        handlers::reviews::list_for_booking,
        handlers::reviews::get,
        handlers::reviews::update,
        handlers::reviews::delete,
        handlers::reviews::moderate,
        handlers::reviews::pending_moderation,
        handlers::reviews::list_for_user,
        handlers::reviews::rating_summary
    ),
    components(
        schemas(
            AuthToken, LoginRequest, RegisterRequest, User, Role, Product,
            Booking, BookingView, Party, CreateBookingRequest, RespondRequest,
            ConfirmPaymentRequest, PaymentIntentHandle,
            ValidateTransactionRequest, ValidationData, QrCodeGrant, TransactionStatus,
            Review, ReviewType, CreateReviewRequest, UpdateReviewRequest,
            ModerateReviewRequest, RatingSummary
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Registration and token issuance"),
        (name = "Bookings", description = "Booking requests and seller responses"),
        (name = "Payments", description = "Stripe payment intents for paid bookings"),
        (name = "Pickup", description = "QR token handoff and delivery validation"),
        (name = "Reviews", description = "Post-delivery reviews and moderation"),
        (name = "Health", description = "Health check endpoints")
    ),
    info(
        title = "MealMates API",
        version = "0.1.0",
        description = "Booking, payment and pickup validation for shared meals"
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_lists_booking_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        assert!(paths.contains_key("/bookings"));
        assert!(paths.contains_key("/bookings/{id}/validate-transaction"));
        assert!(paths.contains_key("/users/{id}/ratings"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("BookingView"));
    }
}
