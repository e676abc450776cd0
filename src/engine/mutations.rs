use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::NotificationKind;

use super::catalog::{find_slot, is_past};
use super::conflict::{check_confirmable, check_slot_free, rival_pending};
use super::lifecycle::{authorize, check_cancel, manages_court, notice, plan_transition, Transition};
use super::{Engine, EngineError, Outbox};

#[derive(Debug, Clone, Deserialize)]
pub struct NewCourt {
    pub name: String,
    pub manager_id: UserId,
}

/// A reservation request. `matchmaking` opens the slot to a second team
/// instead of reserving it outright.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub court_id: CourtId,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub match_size: MatchSize,
    pub team_name: String,
    pub contact_phone: String,
    pub player_count: u8,
    #[serde(default)]
    pub matchmaking: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<BookingStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: Option<PaymentStatus>,
}

pub(super) fn validate_team(
    team_name: &str,
    contact_phone: &str,
    player_count: u8,
    match_size: MatchSize,
) -> Result<(), EngineError> {
    let name = team_name.trim();
    if name.is_empty() {
        return Err(EngineError::Validation("team_name is required".into()));
    }
    if name.chars().count() > MAX_TEAM_NAME_LEN {
        return Err(EngineError::Validation("team_name too long".into()));
    }
    let phone = contact_phone.trim();
    if !(MIN_PHONE_LEN..=MAX_PHONE_LEN).contains(&phone.len())
        || !phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' '))
    {
        return Err(EngineError::Validation("contact_phone is malformed".into()));
    }
    let max_players = match_size.players_per_side() * 2;
    if player_count == 0 || player_count > max_players {
        return Err(EngineError::Validation(format!(
            "player_count must be between 1 and {max_players} for {match_size}"
        )));
    }
    Ok(())
}

impl Engine {
    pub async fn register_court(&self, actor: &Actor, req: NewCourt) -> Result<Court, EngineError> {
        if !actor.is_admin() {
            return Err(EngineError::Forbidden("only administrators register courts"));
        }
        let name = req.name.trim();
        if name.is_empty() || name.chars().count() > MAX_COURT_NAME_LEN {
            return Err(EngineError::Validation("court name must be 1-128 characters".into()));
        }
        let court = Court {
            id: Ulid::new(),
            name: name.to_string(),
            manager_id: req.manager_id,
        };
        self.commit_court(court.clone()).await?;
        tracing::info!(court_id = %court.id, name = %court.name, "court registered");
        Ok(court)
    }

    /// Reserve a slot as `pending`, or open it as `finding_team` for matchmaking.
    pub async fn create_booking(&self, actor: &Actor, req: NewBooking) -> Result<Booking, EngineError> {
        validate_team(&req.team_name, &req.contact_phone, req.player_count, req.match_size)?;
        if self.court(&req.court_id).is_none() {
            return Err(EngineError::court_not_found(req.court_id));
        }
        let daily = find_slot(req.start, req.end).ok_or_else(|| {
            EngineError::Validation(format!(
                "{}-{} is not a bookable slot",
                req.start.format("%H:%M"),
                req.end.format("%H:%M")
            ))
        })?;
        let key = SlotKey {
            court_id: req.court_id,
            date: req.date,
            start: daily.start,
            end: daily.end,
            match_size: req.match_size,
        };

        let now = self.now();
        if is_past(key.date, key.start, now, &self.policy) {
            return Err(EngineError::Guard("this slot is no longer bookable".into()));
        }
        if req.matchmaking
            && key.start_ms(self.policy.utc_offset) - now <= self.policy.matchmaking_cutoff_ms
        {
            return Err(EngineError::Guard(
                "matchmaking must open more than 2 hours before the start time".into(),
            ));
        }
        let total_price = self.resolve_price(&key, &daily.label()).await;

        let (booking, outbox) = {
            let mut txn = self.begin(key).await?;
            let now = self.now();
            check_slot_free(&txn.slot, now, self.policy.unpaid_grace_ms)?;
            if txn.slot.bookings.len() >= MAX_BOOKINGS_PER_SLOT {
                return Err(EngineError::Validation("too many bookings on this slot".into()));
            }

            let status = if req.matchmaking {
                BookingStatus::FindingTeam
            } else {
                BookingStatus::Pending
            };
            let booking = Booking {
                id: Ulid::new(),
                key,
                requester: actor.user_id,
                team_name: req.team_name.trim().to_string(),
                contact_phone: req.contact_phone.trim().to_string(),
                player_count: req.player_count,
                status,
                payment_method: PaymentMethod::None,
                payment_status: PaymentStatus::Pending,
                is_matchmaking: req.matchmaking,
                total_price,
                opponent: None,
                created_at: now,
                updated_at: now,
            };
            self.commit(
                &mut txn,
                vec![Event::BookingCreated {
                    booking: booking.clone(),
                }],
            )
            .await?;

            let mut outbox = Outbox::default();
            if booking.status == BookingStatus::FindingTeam {
                outbox.user(
                    booking.requester,
                    notice(NotificationKind::MatchmakingOpened, &booking, None),
                );
                outbox.invalidate(&key, now);
            }
            (booking, outbox)
        };
        self.dispatch(outbox);

        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL,
            "status" => booking.status.as_str())
        .increment(1);
        tracing::info!(booking_id = %booking.id, slot = %booking.key, status = %booking.status, "booking created");
        Ok(booking)
    }

    /// Apply a status and/or payment update under the state-machine guards.
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: BookingId,
        update: StatusUpdate,
    ) -> Result<Booking, EngineError> {
        if update.status.is_none() && update.payment_method.is_none() && update.payment_status.is_none() {
            return Err(EngineError::Validation("nothing to update".into()));
        }
        if update.payment_method == Some(PaymentMethod::None) {
            return Err(EngineError::Validation("payment_method cannot be reset to none".into()));
        }

        let (booking, outbox) = {
            let mut txn = self.begin_for_booking(id).await?;
            let current = txn
                .slot
                .get(&id)
                .cloned()
                .ok_or_else(|| EngineError::booking_not_found(id))?;
            let court = self.court(&current.key.court_id);
            authorize(actor, &current, court.as_ref())?;

            let now = self.now();
            // A lapsed unpaid booking no longer holds its slot; it only awaits deletion.
            if current.is_unpaid_expired(now, self.policy.unpaid_grace_ms) {
                return Err(EngineError::Guard(format!(
                    "booking {id} lapsed unpaid and can no longer be updated"
                )));
            }
            let transition = match update.status {
                Some(target) => plan_transition(current.status, target)?,
                None => None,
            };

            let mut next = current.clone();
            if let Some(method) = update.payment_method {
                if current.status.is_terminal() && method != current.payment_method {
                    return Err(EngineError::Guard(format!(
                        "payment method of a {} booking is fixed",
                        current.status
                    )));
                }
                next.payment_method = method;
            }
            if let Some(payment_status) = update.payment_status {
                next.payment_status = payment_status;
            }

            let mut events = Vec::new();
            let mut outbox = Outbox::default();
            match transition {
                Some(Transition::Confirm) => {
                    if next.payment_method == PaymentMethod::None {
                        return Err(EngineError::Guard(
                            "a payment method is required to confirm".into(),
                        ));
                    }
                    check_confirmable(&txn.slot, &id)?;
                    next.status = BookingStatus::Confirmed;
                    for rival in rival_pending(&txn.slot, &id) {
                        events.push(Event::BookingDeleted {
                            id: rival,
                            key: current.key,
                        });
                    }
                    outbox.user(next.requester, notice(NotificationKind::BookingConfirmed, &next, None));
                    outbox.invalidate(&next.key, now);
                }
                Some(Transition::Complete) => {
                    if !manages_court(actor, court.as_ref()) {
                        return Err(EngineError::Forbidden(
                            "only the court manager can complete a booking",
                        ));
                    }
                    next.status = BookingStatus::Completed;
                    next.payment_status = PaymentStatus::Paid;
                    outbox.user(next.requester, notice(NotificationKind::BookingCompleted, &next, None));
                }
                Some(Transition::Cancel) => {
                    check_cancel(&current, now, &self.policy)?;
                    next.status = BookingStatus::Cancelled;
                    outbox.user(next.requester, notice(NotificationKind::BookingCancelled, &next, None));
                    outbox.invalidate(&next.key, now);
                }
                None => {}
            }

            if next == current {
                return Ok(current);
            }
            next.updated_at = now;
            let purged = events.len();
            events.insert(0, Event::BookingUpdated { booking: next.clone() });
            self.commit(&mut txn, events).await?;
            if purged > 0 {
                tracing::info!(booking_id = %id, purged, "rival pending bookings purged on confirm");
            }
            (next, outbox)
        };
        self.dispatch(outbox);

        if booking.status != BookingStatus::Pending {
            metrics::counter!(crate::observability::TRANSITIONS_TOTAL,
                "to" => booking.status.as_str())
            .increment(1);
        }
        tracing::info!(booking_id = %booking.id, status = %booking.status, "booking updated");
        Ok(booking)
    }

    /// Cancel a live booking. Cancelling an already-cancelled booking is a no-op.
    pub async fn cancel_booking(&self, actor: &Actor, id: BookingId) -> Result<Booking, EngineError> {
        let (booking, outbox) = {
            let mut txn = self.begin_for_booking(id).await?;
            let current = txn
                .slot
                .get(&id)
                .cloned()
                .ok_or_else(|| EngineError::booking_not_found(id))?;
            authorize(actor, &current, self.court(&current.key.court_id).as_ref())?;
            if current.status == BookingStatus::Cancelled {
                return Ok(current);
            }

            let now = self.now();
            check_cancel(&current, now, &self.policy)?;
            let mut next = current;
            next.status = BookingStatus::Cancelled;
            next.updated_at = now;
            self.commit(
                &mut txn,
                vec![Event::BookingUpdated {
                    booking: next.clone(),
                }],
            )
            .await?;

            let mut outbox = Outbox::default();
            outbox.user(next.requester, notice(NotificationKind::BookingCancelled, &next, None));
            outbox.invalidate(&next.key, now);
            (next, outbox)
        };
        self.dispatch(outbox);

        metrics::counter!(crate::observability::TRANSITIONS_TOTAL, "to" => "cancelled").increment(1);
        tracing::info!(booking_id = %booking.id, actor = %actor.user_id, "booking cancelled");
        Ok(booking)
    }
}
