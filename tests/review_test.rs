mod common;

use mealmates::{
    domain::{
        CreateReviewRequest, ModerateReviewRequest, Product, ReviewType, Role, TransitionError,
        UpdateReviewRequest, User,
    },
    error::AppError,
};
use uuid::Uuid;

use common::{harness, Harness};

/// Books `product` for `buyer` and walks it through to delivery.
async fn delivered_booking(h: &Harness, buyer: &User, seller: &User, product: &Product) -> anyhow::Result<Uuid> {
    let bookings = &h.ctx.booking_service;
    let booking_id = bookings.create(buyer, product.id).await?.booking.id;
    bookings.respond(booking_id, seller.id, "confirm").await?;
    let grant = bookings.generate_qr_code(booking_id, buyer.id).await?;
    bookings
        .validate_transaction(booking_id, seller.id, &grant.token, None)
        .await?;
    Ok(booking_id)
}

fn buyer_review(overall: i16) -> CreateReviewRequest {
    CreateReviewRequest {
        overall_rating: overall,
        product_quality_rating: Some(5),
        punctuality_rating: Some(4),
        friendliness_rating: Some(5),
        comment: Some("Great soup".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_both_parties_review_a_delivered_booking() -> anyhow::Result<()> {
    let h = harness().await?;
    let seller = h.user("Sam").await?;
    let buyer = h.user("Bea").await?;
    let product = h.product(&seller, "Soup", 0).await?;
    let reviews = &h.ctx.review_service;

    let booking_id = delivered_booking(&h, &buyer, &seller, &product).await?;

    let review = reviews.create(booking_id, &buyer, buyer_review(5)).await?;
    assert_eq!(review.review_type, ReviewType::BuyerToSeller);
    assert_eq!(review.author_id, buyer.id);
    assert_eq!(review.reviewed_user_id, seller.id);
    assert!(review.is_visible);

    let err = reviews
        .create(booking_id, &buyer, buyer_review(4))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Transition(TransitionError::AlreadyReviewed)));

    // Product quality is a buyer-side dimension.
    let err = reviews
        .create(
            booking_id,
            &seller,
            CreateReviewRequest {
                overall_rating: 4,
                product_quality_rating: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let seller_review = reviews
        .create(
            booking_id,
            &seller,
            CreateReviewRequest {
                overall_rating: 4,
                communication_rating: Some(4),
                reliability_rating: Some(5),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(seller_review.review_type, ReviewType::SellerToBuyer);
    assert_eq!(seller_review.reviewed_user_id, buyer.id);

    let booking = h.ctx.booking_service.get(booking_id, buyer.id).await?.booking;
    assert!(booking.buyer_review_left);
    assert!(booking.seller_review_left);

    let on_booking = reviews.list_for_booking(booking_id, &buyer).await?;
    assert_eq!(on_booking.len(), 2);

    let summary = reviews.rating_summary(seller.id).await?;
    assert_eq!(summary.total_reviews, 1);
    assert_eq!(summary.average_overall_rating, Some(5.0));
    assert_eq!(summary.average_product_quality, Some(5.0));
    assert_eq!(summary.average_communication, None);

    Ok(())
}

#[tokio::test]
async fn test_review_requires_delivery_and_participation() -> anyhow::Result<()> {
    let h = harness().await?;
    let seller = h.user("Sam").await?;
    let buyer = h.user("Bea").await?;
    let stranger = h.user("Stan").await?;
    let product = h.product(&seller, "Soup", 0).await?;
    let reviews = &h.ctx.review_service;

    let booking_id = h.ctx.booking_service.create(&buyer, product.id).await?.booking.id;

    let err = reviews
        .create(booking_id, &buyer, buyer_review(5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Transition(TransitionError::NotDelivered)));

    let err = reviews
        .create(booking_id, &stranger, buyer_review(5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = reviews
        .create(booking_id, &buyer, buyer_review(9))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn test_author_edits_and_deletes() -> anyhow::Result<()> {
    let h = harness().await?;
    let seller = h.user("Sam").await?;
    let buyer = h.user("Bea").await?;
    let product = h.product(&seller, "Soup", 0).await?;
    let reviews = &h.ctx.review_service;

    let booking_id = delivered_booking(&h, &buyer, &seller, &product).await?;
    let review = reviews.create(booking_id, &buyer, buyer_review(3)).await?;

    let err = reviews
        .update(review.id, &seller, UpdateReviewRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let updated = reviews
        .update(
            review.id,
            &buyer,
            UpdateReviewRequest {
                overall_rating: Some(4),
                comment: Some("Better on reflection".to_string()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.overall_rating, 4);
    assert_eq!(updated.comment.as_deref(), Some("Better on reflection"));
    assert_eq!(updated.product_quality_rating, Some(5));

    let err = reviews.delete(review.id, &seller).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    reviews.delete(review.id, &buyer).await?;
    assert!(matches!(reviews.get(review.id, Some(&buyer)).await, Err(AppError::NotFound(_))));

    // The buyer may review again once their review is gone.
    let booking = h.ctx.booking_service.get(booking_id, buyer.id).await?.booking;
    assert!(!booking.buyer_review_left);
    reviews.create(booking_id, &buyer, buyer_review(4)).await?;

    Ok(())
}

#[tokio::test]
async fn test_moderation_hides_reviews() -> anyhow::Result<()> {
    let h = harness().await?;
    let seller = h.user("Sam").await?;
    let buyer = h.user("Bea").await?;
    let stranger = h.user("Stan").await?;
    let moderator = h.user_with_roles("Mo", vec![Role::User, Role::Moderator]).await?;
    let product = h.product(&seller, "Soup", 0).await?;
    let reviews = &h.ctx.review_service;

    let booking_id = delivered_booking(&h, &buyer, &seller, &product).await?;
    let review = reviews.create(booking_id, &buyer, buyer_review(1)).await?;

    let queue = reviews.pending_moderation(&moderator).await?;
    assert_eq!(queue.len(), 1);

    let err = reviews.pending_moderation(&buyer).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let hide = ModerateReviewRequest {
        is_visible: false,
        reason: Some("Abusive language".to_string()),
    };
    let err = reviews.moderate(review.id, &seller, hide.clone()).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let hidden = reviews.moderate(review.id, &moderator, hide).await?;
    assert!(!hidden.is_visible);
    assert!(hidden.moderated_at.is_some());
    assert_eq!(hidden.moderation_reason.as_deref(), Some("Abusive language"));
    assert!(reviews.pending_moderation(&moderator).await?.is_empty());

    assert!(reviews.list_for_user(seller.id).await?.is_empty());
    assert_eq!(reviews.rating_summary(seller.id).await?.total_reviews, 0);

    assert!(matches!(reviews.get(review.id, None).await, Err(AppError::Forbidden)));
    assert!(matches!(reviews.get(review.id, Some(&stranger)).await, Err(AppError::Forbidden)));
    assert!(reviews.get(review.id, Some(&buyer)).await.is_ok());
    assert!(reviews.get(review.id, Some(&seller)).await.is_ok());
    assert!(reviews.get(review.id, Some(&moderator)).await.is_ok());

    let shown = reviews
        .moderate(
            review.id,
            &moderator,
            ModerateReviewRequest {
                is_visible: true,
                reason: None,
            },
        )
        .await?;
    assert!(shown.is_visible);
    assert_eq!(reviews.list_for_user(seller.id).await?.len(), 1);
    assert!(reviews.get(review.id, None).await.is_ok());

    Ok(())
}
