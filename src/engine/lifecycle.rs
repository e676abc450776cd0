//! Booking state machine rules: who may act, and which transitions are legal.
//!
//! ```text
//! pending ──confirm──▶ confirmed ──(end passes)──▶ completed
//!    │                    ▲   │
//!    │            join ───┘   └──cancel──▶ cancelled
//! finding_team ──(start−2h, unjoined)──────▶ cancelled
//! ```
//! Nothing ever returns to `pending` or `finding_team`.

use crate::config::Policy;
use crate::model::*;
use crate::notify::{Notification, NotificationKind};

use super::EngineError;

pub(crate) fn manages_court(actor: &Actor, court: Option<&Court>) -> bool {
    actor.is_admin() || court.is_some_and(|c| c.manager_id == actor.user_id)
}

/// Owner, the court's manager, or an administrator.
pub(crate) fn authorize(
    actor: &Actor,
    booking: &Booking,
    court: Option<&Court>,
) -> Result<(), EngineError> {
    if booking.requester == actor.user_id || manages_court(actor, court) {
        Ok(())
    } else {
        Err(EngineError::Forbidden("not the owner or manager of this booking"))
    }
}

/// Guards on cancelling a live booking. Applies to every actor alike.
pub(crate) fn check_cancel(booking: &Booking, now: Ms, policy: &Policy) -> Result<(), EngineError> {
    if booking.status.is_terminal() {
        return Err(EngineError::Guard(format!(
            "booking is already {}",
            booking.status
        )));
    }
    if booking.is_matchmaking && booking.status != BookingStatus::FindingTeam {
        return Err(EngineError::Guard(
            "a matched matchmaking booking cannot be cancelled".into(),
        ));
    }
    let until_start = booking.key.start_ms(policy.utc_offset) - now;
    if until_start <= policy.cancel_cutoff_ms {
        return Err(EngineError::Guard(
            "bookings cannot be cancelled within 1 hour of the start time".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Confirm,
    Complete,
    Cancel,
}

/// Classify a requested status change. `Ok(None)` means no change.
pub(crate) fn plan_transition(
    from: BookingStatus,
    to: BookingStatus,
) -> Result<Option<Transition>, EngineError> {
    use BookingStatus::*;
    if from == to {
        return Ok(None);
    }
    match (from, to) {
        _ if to.is_initial() => Err(EngineError::Guard(format!(
            "a booking cannot return to {to}"
        ))),
        _ if from.is_terminal() => Err(EngineError::Guard(format!(
            "booking is already {from}"
        ))),
        (Pending, Confirmed) => Ok(Some(Transition::Confirm)),
        (Confirmed, Completed) => Ok(Some(Transition::Complete)),
        (_, Cancelled) => Ok(Some(Transition::Cancel)),
        (FindingTeam, Confirmed) => Err(EngineError::Guard(
            "an open matchmaking seat is confirmed by another team joining".into(),
        )),
        _ => Err(EngineError::Guard(format!(
            "cannot move a {from} booking to {to}"
        ))),
    }
}

pub(crate) fn notice(kind: NotificationKind, booking: &Booking, opponent: Option<&str>) -> Notification {
    let when = format!(
        "{} {}-{} ({})",
        booking.key.date,
        booking.key.start.format("%H:%M"),
        booking.key.end.format("%H:%M"),
        booking.key.match_size
    );
    let (title, body) = match kind {
        NotificationKind::BookingConfirmed => (
            "Booking Confirmed",
            format!("Your booking for {when} is confirmed."),
        ),
        NotificationKind::BookingCancelled => (
            "Booking Cancelled",
            format!("Your booking for {when} has been cancelled."),
        ),
        NotificationKind::BookingCompleted => (
            "Booking Completed",
            format!("Thanks for playing on {when}."),
        ),
        NotificationKind::MatchmakingOpened => (
            "Looking for Opponent",
            format!("{} is waiting for an opponent on {when}.", booking.team_name),
        ),
        NotificationKind::TeamFound => (
            "Team Found",
            format!(
                "{} will play you on {when}.",
                opponent.unwrap_or("Another team")
            ),
        ),
        NotificationKind::MatchJoined => (
            "Match Joined",
            format!(
                "You joined {} for {when}.",
                opponent.unwrap_or("another team")
            ),
        ),
        NotificationKind::TeamNotFound => (
            "Team Not Found",
            format!("No opponent joined in time for {when}; the slot was released."),
        ),
    };
    Notification {
        kind,
        title: title.to_string(),
        body,
        related_booking_id: booking.id,
        opponent_name: opponent.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::local_ms;
    use crate::model::fixtures::{booking, key};
    use ulid::Ulid;

    const M: Ms = 60_000;

    fn confirmed() -> Booking {
        booking(key(Ulid::new(), 10, MatchSize::Five), BookingStatus::Confirmed)
    }

    fn kickoff(b: &Booking) -> Ms {
        local_ms(b.key.date, b.key.start, Policy::default().utc_offset)
    }

    #[test]
    fn cancel_at_61_minutes_ok_59_refused() {
        let p = Policy::default();
        let b = confirmed();
        assert!(check_cancel(&b, kickoff(&b) - 61 * M, &p).is_ok());
        assert!(matches!(
            check_cancel(&b, kickoff(&b) - 59 * M, &p),
            Err(EngineError::Guard(_))
        ));
        assert!(check_cancel(&b, kickoff(&b) - 60 * M, &p).is_err());
    }

    #[test]
    fn matched_pair_cannot_cancel_but_open_seat_can() {
        let p = Policy::default();
        let mut paired = confirmed();
        paired.is_matchmaking = true;
        let early = kickoff(&paired) - 24 * 60 * M;
        assert!(check_cancel(&paired, early, &p).is_err());

        let mut seat = paired.clone();
        seat.status = BookingStatus::FindingTeam;
        assert!(check_cancel(&seat, early, &p).is_ok());
    }

    #[test]
    fn terminal_bookings_refuse_cancel() {
        let p = Policy::default();
        let mut b = confirmed();
        b.status = BookingStatus::Completed;
        assert!(check_cancel(&b, 0, &p).is_err());
    }

    #[test]
    fn transitions_are_monotonic() {
        use BookingStatus::*;
        assert_eq!(plan_transition(Pending, Confirmed).unwrap(), Some(Transition::Confirm));
        assert_eq!(plan_transition(Confirmed, Completed).unwrap(), Some(Transition::Complete));
        assert_eq!(plan_transition(FindingTeam, Cancelled).unwrap(), Some(Transition::Cancel));
        assert_eq!(plan_transition(Confirmed, Confirmed).unwrap(), None);
        assert!(plan_transition(Confirmed, Pending).is_err());
        assert!(plan_transition(Confirmed, FindingTeam).is_err());
        assert!(plan_transition(Cancelled, Confirmed).is_err());
        assert!(plan_transition(Completed, Cancelled).is_err());
        assert!(plan_transition(FindingTeam, Confirmed).is_err());
        assert!(plan_transition(Pending, Completed).is_err());
    }

    #[test]
    fn authorization_owner_manager_admin() {
        let b = confirmed();
        let court = Court {
            id: b.key.court_id,
            name: "North".into(),
            manager_id: Ulid::new(),
        };
        let owner = Actor::new(b.requester, Role::Player);
        let manager = Actor::new(court.manager_id, Role::Manager);
        let admin = Actor::new(Ulid::new(), Role::Admin);
        let stranger = Actor::new(Ulid::new(), Role::Manager);

        assert!(authorize(&owner, &b, Some(&court)).is_ok());
        assert!(authorize(&manager, &b, Some(&court)).is_ok());
        assert!(authorize(&admin, &b, None).is_ok());
        assert!(matches!(
            authorize(&stranger, &b, Some(&court)),
            Err(EngineError::Forbidden(_))
        ));
    }

    #[test]
    fn team_notices_name_the_opponent() {
        let b = confirmed();
        let n = notice(NotificationKind::TeamFound, &b, Some("Harbour FC"));
        assert_eq!(n.title, "Team Found");
        assert_eq!(n.opponent_name.as_deref(), Some("Harbour FC"));
        assert!(n.body.contains("Harbour FC"));
        assert_eq!(n.related_booking_id, b.id);
    }
}
