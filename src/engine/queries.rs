use std::collections::HashMap;

use chrono::NaiveDate;

use crate::limits::MAX_LIST_RESULTS;
use crate::model::*;

use super::catalog::{classify_day, daily_slots};
use super::lifecycle::{authorize, manages_court};
use super::{Engine, EngineError};

impl Engine {
    /// Public availability for one court and date: 30 entries, kickoff order.
    pub async fn list_slots(&self, court_id: CourtId, date: NaiveDate) -> Result<Vec<SlotView>, EngineError> {
        if self.court(&court_id).is_none() {
            return Err(EngineError::court_not_found(court_id));
        }

        let mut guards = Vec::new();
        for daily in daily_slots() {
            for match_size in MatchSize::ALL {
                let key = SlotKey {
                    court_id,
                    date,
                    start: daily.start,
                    end: daily.end,
                    match_size,
                };
                if let Some(slot) = self.existing_slot(&key) {
                    guards.push(slot.read_owned().await);
                }
            }
        }
        let by_key: HashMap<SlotKey, &SlotState> = guards.iter().map(|g| (g.key, &**g)).collect();

        Ok(classify_day(court_id, date, self.now(), &self.policy, |key| {
            by_key.get(key).copied()
        }))
    }

    /// The court, if `actor` manages it (administrators manage every court).
    pub fn managed_court(&self, actor: &Actor, court_id: CourtId) -> Result<Court, EngineError> {
        let court = self
            .court(&court_id)
            .ok_or_else(|| EngineError::court_not_found(court_id))?;
        if !manages_court(actor, Some(&court)) {
            return Err(EngineError::Forbidden("not the manager of this court"));
        }
        Ok(court)
    }

    pub async fn get_booking(&self, actor: &Actor, id: BookingId) -> Result<Booking, EngineError> {
        let key = self
            .booking_index
            .get(&id)
            .map(|e| *e.value())
            .ok_or_else(|| EngineError::booking_not_found(id))?;
        let slot = self
            .existing_slot(&key)
            .ok_or_else(|| EngineError::booking_not_found(id))?;
        let booking = slot
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::booking_not_found(id))?;
        authorize(actor, &booking, self.court(&key.court_id).as_ref())?;
        Ok(booking)
    }

    /// Bookings matching `keep`, newest slot first.
    async fn collect_bookings(&self, keep: impl Fn(&Booking) -> bool) -> Vec<Booking> {
        let mut out = Vec::new();
        for slot in self.all_slots() {
            let guard = slot.read().await;
            out.extend(guard.bookings.iter().filter(|b| keep(b)).cloned());
        }
        out.sort_by(|a, b| {
            (b.key.date, b.key.start, b.created_at).cmp(&(a.key.date, a.key.start, a.created_at))
        });
        out.truncate(MAX_LIST_RESULTS);
        out
    }

    pub async fn list_user_bookings(&self, actor: &Actor, user_id: UserId) -> Result<Vec<Booking>, EngineError> {
        if actor.user_id != user_id && !actor.is_admin() {
            return Err(EngineError::Forbidden("cannot list another user's bookings"));
        }
        Ok(self.collect_bookings(|b| b.requester == user_id).await)
    }

    pub async fn list_court_bookings(
        &self,
        actor: &Actor,
        court_id: CourtId,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Booking>, EngineError> {
        self.managed_court(actor, court_id)?;
        Ok(self
            .collect_bookings(|b| b.key.court_id == court_id && date.is_none_or(|d| b.key.date == d))
            .await)
    }

    /// Aggregate counts and revenue, for one court (its manager) or everything (administrators).
    pub async fn stats(&self, actor: &Actor, court_id: Option<CourtId>) -> Result<BookingStats, EngineError> {
        match court_id {
            Some(id) => {
                self.managed_court(actor, id)?;
            }
            None if !actor.is_admin() => {
                return Err(EngineError::Forbidden("only administrators see global stats"));
            }
            None => {}
        }

        let mut stats = BookingStats::default();
        for slot in self.all_slots() {
            let guard = slot.read().await;
            if court_id.is_some_and(|c| c != guard.key.court_id) {
                continue;
            }
            for booking in &guard.bookings {
                stats.record(booking);
            }
        }
        Ok(stats)
    }
}
