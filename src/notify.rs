use chrono::NaiveDate;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::{BookingId, CourtId, Ms, UserId};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingConfirmed,
    BookingCancelled,
    BookingCompleted,
    MatchmakingOpened,
    TeamFound,
    MatchJoined,
    TeamNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub related_booking_id: BookingId,
    pub opponent_name: Option<String>,
}

/// Live-availability change for one court/date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotInvalidation {
    pub court_id: CourtId,
    pub date: NaiveDate,
    pub updated_at: Ms,
}

/// Outbound side of the engine. Fire-and-forget: implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify_user(&self, user_id: UserId, notification: Notification);
    fn invalidate_slots(&self, invalidation: SlotInvalidation);
}

/// Broadcast hub with one channel per user and one per court.
pub struct NotifyHub {
    users: DashMap<Ulid, broadcast::Sender<Notification>>,
    courts: DashMap<Ulid, broadcast::Sender<SlotInvalidation>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            courts: DashMap::new(),
        }
    }

    /// Subscribe to a user's notifications. Creates the channel if needed.
    pub fn subscribe_user(&self, user_id: UserId) -> broadcast::Receiver<Notification> {
        self.users
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Subscribe to slot invalidations for a court.
    pub fn subscribe_court(&self, court_id: CourtId) -> broadcast::Receiver<SlotInvalidation> {
        self.courts
            .entry(court_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

impl Notifier for NotifyHub {
    fn notify_user(&self, user_id: UserId, notification: Notification) {
        tracing::debug!(%user_id, kind = ?notification.kind, "notify");
        if let Some(sender) = self.users.get(&user_id) {
            let _ = sender.send(notification);
        }
    }

    fn invalidate_slots(&self, invalidation: SlotInvalidation) {
        if let Some(sender) = self.courts.get(&invalidation.court_id) {
            let _ = sender.send(invalidation);
        }
    }
}
