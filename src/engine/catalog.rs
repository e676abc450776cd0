use chrono::{NaiveDate, NaiveTime};

use crate::clock::{local_date, local_ms};
use crate::config::Policy;
use crate::model::*;
use crate::timefmt::slot_label;

// ── Slot Catalog ─────────────────────────────────────────────────

/// First kickoff of the day, court-local.
pub const FIRST_SLOT_HOUR: u32 = 6;
/// One-hour slots per day: 06:00 through 21:00.
pub const SLOTS_PER_DAY: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DailySlot {
    pub fn label(&self) -> String {
        slot_label(self.start, self.end)
    }
}

/// The fixed daily timetable, in kickoff order.
pub fn daily_slots() -> impl Iterator<Item = DailySlot> {
    (FIRST_SLOT_HOUR..FIRST_SLOT_HOUR + SLOTS_PER_DAY).filter_map(|hour| {
        Some(DailySlot {
            start: NaiveTime::from_hms_opt(hour, 0, 0)?,
            end: NaiveTime::from_hms_opt(hour + 1, 0, 0)?,
        })
    })
}

/// The catalog slot with exactly this time range, if any.
pub fn find_slot(start: NaiveTime, end: NaiveTime) -> Option<DailySlot> {
    daily_slots().find(|s| s.start == start && s.end == end)
}

/// A slot is past once its kickoff is within the look-ahead window of now.
/// Every slot of an earlier date is past.
pub fn is_past(date: NaiveDate, start: NaiveTime, now: Ms, policy: &Policy) -> bool {
    let Some(today) = local_date(now, policy.utc_offset) else {
        return false;
    };
    if date != today {
        return date < today;
    }
    local_ms(date, start, policy.utc_offset) - now <= policy.lookahead_ms
}

/// Status of one catalog entry. Priority: past, booked, finding_team, available.
pub fn slot_status(slot: Option<&SlotState>, past: bool) -> (SlotStatus, Option<String>) {
    if past {
        return (SlotStatus::Past, None);
    }
    let Some(slot) = slot else {
        return (SlotStatus::Available, None);
    };
    if slot.with_status(BookingStatus::Confirmed).next().is_some() {
        return (SlotStatus::Booked, None);
    }
    if let Some(seat) = slot.open_seat() {
        return (SlotStatus::FindingTeam, Some(seat.team_name.clone()));
    }
    (SlotStatus::Available, None)
}

/// Build the 30-entry view (15 slots × 2 sizes) for one court and date.
pub fn classify_day<'a>(
    court_id: CourtId,
    date: NaiveDate,
    now: Ms,
    policy: &Policy,
    slot_of: impl Fn(&SlotKey) -> Option<&'a SlotState>,
) -> Vec<SlotView> {
    let mut views = Vec::with_capacity((SLOTS_PER_DAY as usize) * MatchSize::ALL.len());
    for daily in daily_slots() {
        let past = is_past(date, daily.start, now, policy);
        let label = daily.label();
        for match_size in MatchSize::ALL {
            let key = SlotKey {
                court_id,
                date,
                start: daily.start,
                end: daily.end,
                match_size,
            };
            let (status, team_name) = slot_status(slot_of(&key), past);
            views.push(SlotView {
                start_time: daily.start,
                end_time: daily.end,
                label: label.clone(),
                match_size,
                status,
                team_name,
            });
        }
    }
    views
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::model::fixtures::{booking, key};
    use ulid::Ulid;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
    }

    fn at(h: u32, m: u32) -> Ms {
        local_ms(day(), t(h, m), Policy::default().utc_offset)
    }

    #[test]
    fn timetable_has_fifteen_hourly_slots() {
        let slots: Vec<_> = daily_slots().collect();
        assert_eq!(slots.len(), 15);
        assert_eq!(slots[0].start, t(6, 0));
        assert_eq!(slots[14].end, t(21, 0));
        assert!(slots.windows(2).all(|w| w[0].end == w[1].start));
    }

    #[test]
    fn find_slot_requires_exact_range() {
        assert!(find_slot(t(10, 0), t(11, 0)).is_some());
        assert!(find_slot(t(10, 0), t(12, 0)).is_none());
        assert!(find_slot(t(5, 0), t(6, 0)).is_none());
        assert!(find_slot(t(10, 30), t(11, 30)).is_none());
    }

    #[test]
    fn past_uses_fifteen_minute_lookahead_inclusive() {
        let p = Policy::default();
        assert!(is_past(day(), t(10, 0), at(9, 45), &p));
        assert!(!is_past(day(), t(10, 0), at(9, 44), &p));
        assert!(is_past(day(), t(10, 0), at(10, 30), &p));
    }

    #[test]
    fn other_dates_are_past_or_future_wholesale() {
        let p = Policy::default();
        let yesterday = day().pred_opt().unwrap();
        let tomorrow = day().succ_opt().unwrap();
        assert!(is_past(yesterday, t(20, 0), at(7, 0), &p));
        assert!(!is_past(tomorrow, t(6, 0), at(20, 59), &p));
    }

    #[test]
    fn classify_priorities() {
        let p = Policy::default();
        let court = Ulid::new();
        let booked = key(court, 12, MatchSize::Five);
        let seeking = key(court, 12, MatchSize::Seven);

        let mut booked_slot = SlotState::new(booked);
        booked_slot.upsert(booking(booked, BookingStatus::Confirmed));
        let mut seeking_slot = SlotState::new(seeking);
        let mut seat = booking(seeking, BookingStatus::FindingTeam);
        seat.team_name = "Night Owls".into();
        seeking_slot.upsert(seat);

        let slots: HashMap<SlotKey, &SlotState> =
            [(booked, &booked_slot), (seeking, &seeking_slot)].into_iter().collect();

        let views = classify_day(court, day(), at(8, 0), &p, |k| slots.get(k).copied());
        assert_eq!(views.len(), 30);

        let find = |h: u32, size: MatchSize| {
            views
                .iter()
                .find(|v| v.start_time == t(h, 0) && v.match_size == size)
                .unwrap()
        };
        assert_eq!(find(6, MatchSize::Five).status, SlotStatus::Past);
        assert_eq!(find(8, MatchSize::Seven).status, SlotStatus::Past);
        assert_eq!(find(9, MatchSize::Five).status, SlotStatus::Available);
        assert_eq!(find(12, MatchSize::Five).status, SlotStatus::Booked);
        let open = find(12, MatchSize::Seven);
        assert_eq!(open.status, SlotStatus::FindingTeam);
        assert_eq!(open.team_name.as_deref(), Some("Night Owls"));
        assert_eq!(open.label, "12:00 PM - 1:00 PM");
    }

    #[test]
    fn cancelled_and_pending_leave_slot_available() {
        let court = Ulid::new();
        let k = key(court, 15, MatchSize::Five);
        let mut slot = SlotState::new(k);
        slot.upsert(booking(k, BookingStatus::Cancelled));
        slot.upsert(booking(k, BookingStatus::Pending));
        assert_eq!(slot_status(Some(&slot), false).0, SlotStatus::Available);
    }

    #[test]
    fn past_beats_booked() {
        let court = Ulid::new();
        let k = key(court, 15, MatchSize::Five);
        let mut slot = SlotState::new(k);
        slot.upsert(booking(k, BookingStatus::Confirmed));
        assert_eq!(slot_status(Some(&slot), true).0, SlotStatus::Past);
    }

    #[test]
    fn entries_ordered_by_time_then_size() {
        let views = classify_day(Ulid::new(), day(), at(0, 0), &Policy::default(), |_| None);
        assert_eq!(views[0].match_size, MatchSize::Five);
        assert_eq!(views[1].match_size, MatchSize::Seven);
        assert_eq!(views[0].start_time, views[1].start_time);
        assert!(views.iter().all(|v| v.status == SlotStatus::Available));
    }
}
