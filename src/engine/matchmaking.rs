use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotificationKind;

use super::catalog::find_slot;
use super::lifecycle::notice;
use super::mutations::validate_team;
use super::{Engine, EngineError, Outbox};

/// Request to take the open seat on a slot. The slot key is resolved from these fields.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinRequest {
    pub court_id: CourtId,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub match_size: MatchSize,
    pub team_name: String,
    pub contact_phone: String,
    pub player_count: u8,
}

/// Both halves of a matched slot, as committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchPair {
    pub seeker: Booking,
    pub joiner: Booking,
}

impl Engine {
    /// Pair the caller with the team holding the open seat on the requested slot.
    ///
    /// The seeker's booking and the joiner's new booking are committed as one
    /// unit: both end up `confirmed` with cash payment, or nothing changes.
    /// A missing seat is `NotFound`: it may have expired or been taken by a
    /// concurrent join.
    pub async fn join_matchmaking(&self, actor: &Actor, req: JoinRequest) -> Result<MatchPair, EngineError> {
        validate_team(&req.team_name, &req.contact_phone, req.player_count, req.match_size)?;
        if self.court(&req.court_id).is_none() {
            return Err(EngineError::court_not_found(req.court_id));
        }
        let daily = find_slot(req.start, req.end)
            .ok_or_else(|| EngineError::Validation("not a bookable slot".into()))?;
        let key = SlotKey {
            court_id: req.court_id,
            date: req.date,
            start: daily.start,
            end: daily.end,
            match_size: req.match_size,
        };
        let joiner_price = self.resolve_price(&key, &daily.label()).await;
        let no_seat = || EngineError::NotFound(format!("open matchmaking seat on {key}"));

        let (pair, outbox) = {
            let mut txn = self.begin(key).await?;
            let now = self.now();
            let seat = txn.slot.open_seat().cloned().ok_or_else(no_seat)?;
            // Past its deadline the seat is only waiting for the sweep to cancel it.
            if key.start_ms(self.policy.utc_offset) - now <= self.policy.matchmaking_cutoff_ms {
                return Err(no_seat());
            }
            if seat.requester == actor.user_id {
                return Err(EngineError::Guard(
                    "cannot join your own matchmaking booking".into(),
                ));
            }

            let joiner = Booking {
                id: Ulid::new(),
                key,
                requester: actor.user_id,
                team_name: req.team_name.trim().to_string(),
                contact_phone: req.contact_phone.trim().to_string(),
                player_count: req.player_count,
                status: BookingStatus::Confirmed,
                payment_method: PaymentMethod::Cash,
                payment_status: PaymentStatus::Pending,
                is_matchmaking: true,
                total_price: joiner_price,
                opponent: Some(seat.id),
                created_at: now,
                updated_at: now,
            };
            let seeker = Booking {
                status: BookingStatus::Confirmed,
                payment_method: PaymentMethod::Cash,
                is_matchmaking: true,
                opponent: Some(joiner.id),
                updated_at: now,
                ..seat
            };

            self.commit(
                &mut txn,
                vec![
                    Event::BookingUpdated {
                        booking: seeker.clone(),
                    },
                    Event::BookingCreated {
                        booking: joiner.clone(),
                    },
                ],
            )
            .await?;

            let mut outbox = Outbox::default();
            outbox.user(
                seeker.requester,
                notice(NotificationKind::TeamFound, &seeker, Some(&joiner.team_name)),
            );
            outbox.user(
                joiner.requester,
                notice(NotificationKind::MatchJoined, &joiner, Some(&seeker.team_name)),
            );
            outbox.invalidate(&key, now);
            (MatchPair { seeker, joiner }, outbox)
        };
        self.dispatch(outbox);

        metrics::counter!(crate::observability::MATCHES_MADE_TOTAL).increment(1);
        tracing::info!(
            seeker = %pair.seeker.id,
            joiner = %pair.joiner.id,
            slot = %key,
            "matchmaking pair confirmed"
        );
        Ok(pair)
    }
}
