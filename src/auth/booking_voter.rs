use uuid::Uuid;

use crate::{
    domain::{Booking, Party, TransitionError},
    error::{AppError, Result},
};

/// Every transition handler names one of these before touching a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    View,
    Respond,
    Cancel,
    Pay,
    GenerateQr,
    ValidateTransaction,
}

impl BookingAction {
    /// The party allowed to attempt the action, `None` when either may.
    fn required_party(&self) -> Option<Party> {
        match self {
            BookingAction::View | BookingAction::Cancel => None,
            BookingAction::Respond | BookingAction::ValidateTransaction => Some(Party::Seller),
            BookingAction::Pay | BookingAction::GenerateQr => Some(Party::Buyer),
        }
    }
}

pub fn can_perform(action: BookingAction, booking: &Booking, user_id: Uuid) -> bool {
    let party = match booking.party_of(user_id) {
        Some(party) => party,
        None => return false,
    };

    if let Some(required) = action.required_party() {
        if party != required {
            return false;
        }
    }

    match action {
        BookingAction::View | BookingAction::Respond => true,
        BookingAction::Cancel => !booking.is_outdated,
        BookingAction::Pay => booking.is_confirmed && !booking.is_paid && !booking.is_outdated,
        BookingAction::GenerateQr | BookingAction::ValidateTransaction => {
            booking.is_ready_for_handoff()
        }
    }
}

/// Runs the voter and, on denial, explains why: `Forbidden` when the user is
/// on the wrong side of the booking, otherwise the state rule that failed.
/// Returns the caller's party on success.
pub fn authorize(action: BookingAction, booking: &Booking, user_id: Uuid) -> Result<Party> {
    let party = booking.party_of(user_id).ok_or(AppError::Forbidden)?;

    if can_perform(action, booking, user_id) {
        return Ok(party);
    }

    if action.required_party().map_or(false, |required| required != party) {
        return Err(AppError::Forbidden);
    }

    let reason = match action {
        BookingAction::Cancel => TransitionError::AlreadyOutdated,
        BookingAction::Pay => match booking.ensure_payable() {
            Err(e) => e,
            Ok(()) => return Err(AppError::Forbidden),
        },
        BookingAction::GenerateQr | BookingAction::ValidateTransaction => {
            match booking.ensure_ready_for_handoff() {
                Err(e) => e,
                Ok(()) => return Err(AppError::Forbidden),
            }
        }
        BookingAction::View | BookingAction::Respond => return Err(AppError::Forbidden),
    };

    Err(AppError::Transition(reason))
}
