use std::fmt;
use std::str::FromStr;

use chrono::{FixedOffset, NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::clock::local_ms;
use crate::timefmt::to_24h;

/// Unix milliseconds. The only instant type inside the engine.
pub type Ms = i64;

pub type BookingId = Ulid;
pub type CourtId = Ulid;
pub type UserId = Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchSize {
    #[serde(rename = "5v5")]
    Five,
    #[serde(rename = "7v7")]
    Seven,
}

impl MatchSize {
    pub const ALL: [MatchSize; 2] = [MatchSize::Five, MatchSize::Seven];

    pub fn players_per_side(self) -> u8 {
        match self {
            MatchSize::Five => 5,
            MatchSize::Seven => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchSize::Five => "5v5",
            MatchSize::Seven => "7v7",
        }
    }
}

impl fmt::Display for MatchSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "5v5" | "5" | "5-a-side" => Ok(MatchSize::Five),
            "7v7" | "7" | "7-a-side" => Ok(MatchSize::Seven),
            other => Err(format!("unknown match size: {other}")),
        }
    }
}

/// The unit of conflict: one bookable court window at one match size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub court_id: CourtId,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub match_size: MatchSize,
}

impl SlotKey {
    pub fn start_ms(&self, offset: FixedOffset) -> Ms {
        local_ms(self.date, self.start, offset)
    }

    pub fn end_ms(&self, offset: FixedOffset) -> Ms {
        local_ms(self.date, self.end, offset)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} {}-{} {}",
            self.court_id,
            self.date,
            to_24h(self.start),
            to_24h(self.end),
            self.match_size
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    FindingTeam,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    /// Initial states are only reachable through creation.
    pub fn is_initial(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::FindingTeam)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::FindingTeam => "finding_team",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    None,
    Cash,
    Online,
    Provider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    AdvancePaid,
    Paid,
    Refunded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub key: SlotKey,
    pub requester: UserId,
    pub team_name: String,
    pub contact_phone: String,
    pub player_count: u8,
    pub status: BookingStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub is_matchmaking: bool,
    pub total_price: Decimal,
    /// The other half of a matchmaking pair, once joined.
    pub opponent: Option<BookingId>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Booking {
    /// Unpaid bookings outside matchmaking are reclaimed after the grace period.
    pub fn is_unpaid_expired(&self, now: Ms, grace_ms: Ms) -> bool {
        self.payment_method == PaymentMethod::None
            && matches!(self.status, BookingStatus::Pending | BookingStatus::Confirmed)
            && now - self.created_at >= grace_ms
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Court {
    pub id: CourtId,
    pub name: String,
    pub manager_id: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Player,
    Manager,
    Admin,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "player" | "user" => Ok(Role::Player),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// An already-authenticated party acting on the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Bookings sharing one slot key. Guarded by a per-key lock in the engine.
#[derive(Debug, Clone)]
pub struct SlotState {
    pub key: SlotKey,
    /// Every booking ever made on this key, in creation order.
    pub bookings: Vec<Booking>,
}

impl SlotState {
    pub fn new(key: SlotKey) -> Self {
        Self {
            key,
            bookings: Vec::new(),
        }
    }

    pub fn get(&self, id: &BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    /// Insert or replace by id.
    pub fn upsert(&mut self, booking: Booking) {
        match self.bookings.iter_mut().find(|b| b.id == booking.id) {
            Some(existing) => *existing = booking,
            None => self.bookings.push(booking),
        }
    }

    pub fn remove(&mut self, id: &BookingId) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == *id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn with_status(&self, status: BookingStatus) -> impl Iterator<Item = &Booking> {
        self.bookings.iter().filter(move |b| b.status == status)
    }

    /// The open matchmaking seat, if any.
    pub fn open_seat(&self) -> Option<&Booking> {
        self.with_status(BookingStatus::FindingTeam).next()
    }
}

/// The journal's event vocabulary. Booking events carry the full row so replay is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    CourtRegistered { court: Court },
    BookingCreated { booking: Booking },
    BookingUpdated { booking: Booking },
    BookingDeleted { id: BookingId, key: SlotKey },
}

impl Event {
    pub fn slot_key(&self) -> Option<SlotKey> {
        match self {
            Event::BookingCreated { booking } | Event::BookingUpdated { booking } => {
                Some(booking.key)
            }
            Event::BookingDeleted { key, .. } => Some(*key),
            Event::CourtRegistered { .. } => None,
        }
    }
}

/// One unit of work: every event in it is durable together or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub at: Ms,
    pub events: Vec<Event>,
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Past,
    Available,
    Booked,
    FindingTeam,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotView {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub label: String,
    pub match_size: MatchSize,
    pub status: SlotStatus,
    /// Name of the team holding the open seat, for `finding_team` slots.
    pub team_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BookingStats {
    pub total: usize,
    pub pending: usize,
    pub finding_team: usize,
    pub confirmed: usize,
    pub cancelled: usize,
    pub completed: usize,
    pub matchmaking: usize,
    /// Sum of `total_price` over confirmed and completed bookings.
    pub revenue: Decimal,
}

impl BookingStats {
    pub fn record(&mut self, booking: &Booking) {
        self.total += 1;
        match booking.status {
            BookingStatus::Pending => self.pending += 1,
            BookingStatus::FindingTeam => self.finding_team += 1,
            BookingStatus::Confirmed => self.confirmed += 1,
            BookingStatus::Cancelled => self.cancelled += 1,
            BookingStatus::Completed => self.completed += 1,
        }
        if booking.is_matchmaking {
            self.matchmaking += 1;
        }
        if matches!(
            booking.status,
            BookingStatus::Confirmed | BookingStatus::Completed
        ) {
            self.revenue += booking.total_price;
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn key(court_id: CourtId, hour: u32, size: MatchSize) -> SlotKey {
        SlotKey {
            court_id,
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            start: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(hour + 1, 0, 0).unwrap(),
            match_size: size,
        }
    }

    pub fn booking(key: SlotKey, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            key,
            requester: Ulid::new(),
            team_name: "Rovers".into(),
            contact_phone: "+15550100".into(),
            player_count: 5,
            status,
            payment_method: PaymentMethod::None,
            payment_status: PaymentStatus::Pending,
            is_matchmaking: status == BookingStatus::FindingTeam,
            total_price: Decimal::from(1000),
            opponent: None,
            created_at: 0,
            updated_at: 0,
        }
    }
}
