use crate::model::*;

use super::EngineError;

/// A pending booking holds its slot while it is paid for or still inside the grace window.
/// Once the grace has lapsed unpaid it is dead weight awaiting cleanup.
pub(crate) fn pending_holds_slot(booking: &Booking, now: Ms, grace_ms: Ms) -> bool {
    booking.status == BookingStatus::Pending && !booking.is_unpaid_expired(now, grace_ms)
}

/// New standalone or seeking bookings need a key with no confirmed booking,
/// no open seat, and no live pending hold.
pub(crate) fn check_slot_free(slot: &SlotState, now: Ms, grace_ms: Ms) -> Result<(), EngineError> {
    for b in &slot.bookings {
        let blocks = match b.status {
            BookingStatus::Confirmed | BookingStatus::FindingTeam => true,
            BookingStatus::Pending => pending_holds_slot(b, now, grace_ms),
            BookingStatus::Cancelled | BookingStatus::Completed => false,
        };
        if blocks {
            return Err(EngineError::Conflict(b.id));
        }
    }
    Ok(())
}

/// A pending booking may be confirmed only if nobody else holds the key
/// as confirmed or as an open seat.
pub(crate) fn check_confirmable(slot: &SlotState, id: &BookingId) -> Result<(), EngineError> {
    match slot.bookings.iter().find(|b| {
        b.id != *id
            && matches!(
                b.status,
                BookingStatus::Confirmed | BookingStatus::FindingTeam
            )
    }) {
        Some(holder) => Err(EngineError::Conflict(holder.id)),
        None => Ok(()),
    }
}

/// Rival pending bookings purged when `keep` is confirmed.
pub(crate) fn rival_pending(slot: &SlotState, keep: &BookingId) -> Vec<BookingId> {
    slot.with_status(BookingStatus::Pending)
        .filter(|b| b.id != *keep)
        .map(|b| b.id)
        .collect()
}
