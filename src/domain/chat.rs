use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::booking::Booking;

/// Conversation thread between buyer and seller, opened with the booking.
#[derive(Debug, Clone, Serialize)]
pub struct Chat {
    pub id: Uuid,
    pub product_id: Uuid,
    pub booking_id: Uuid,
    pub user_one_id: Uuid,
    pub user_two_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn for_booking(booking: &Booking, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id: booking.product_id,
            booking_id: booking.id,
            user_one_id: booking.buyer_id,
            user_two_id: booking.seller_id,
            created_at: now,
        }
    }
}
