mod catalog;
mod conflict;
mod error;
mod lifecycle;
mod matchmaking;
mod mutations;
mod queries;
mod sweep;

pub use catalog::{classify_day, daily_slots, find_slot, is_past, DailySlot, SLOTS_PER_DAY};
pub use error::EngineError;
pub use matchmaking::{JoinRequest, MatchPair};
pub use mutations::{NewBooking, NewCourt, StatusUpdate};
pub use sweep::SweepReport;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::clock::Clock;
use crate::config::Policy;
use crate::model::*;
use crate::notify::{Notification, Notifier, SlotInvalidation};
use crate::pricing::PriceLookup;
use crate::wal::Wal;

pub type SharedSlotState = Arc<RwLock<SlotState>>;

// ── Group-commit journal channel ─────────────────────────

pub(super) enum WalCommand {
    Append {
        commit: Commit,
        response: oneshot::Sender<io::Result<()>>,
    },
    Rewrite {
        snapshot: Vec<Commit>,
        response: oneshot::Sender<io::Result<()>>,
    },
    RecordsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type Waiter = oneshot::Sender<io::Result<()>>;

/// Owns the journal. Appends that queue up while a flush is in progress are
/// written together and made durable by a single fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    let mut pending: Vec<(Commit, Waiter)> = Vec::new();
    while let Some(cmd) = rx.recv().await {
        let mut next = Some(cmd);
        while let Some(cmd) = next.take() {
            match cmd {
                WalCommand::Append { commit, response } => {
                    pending.push((commit, response));
                    next = rx.try_recv().ok();
                }
                other => {
                    flush_group(&mut wal, &mut pending);
                    handle_control(&mut wal, other);
                    next = rx.try_recv().ok();
                }
            }
        }
        flush_group(&mut wal, &mut pending);
    }
}

fn flush_group(wal: &mut Wal, group: &mut Vec<(Commit, Waiter)>) {
    if group.is_empty() {
        return;
    }
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(group.len() as f64);
    let started = std::time::Instant::now();

    let appended = group
        .iter()
        .try_for_each(|(commit, _)| wal.append_buffered(commit));
    // Flush even after a failed append so half-written bytes do not leak into the next group.
    let flushed = wal.flush_sync();
    let outcome = appended.and(flushed);

    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());
    if let Err(e) = &outcome {
        tracing::error!("journal flush failed: {e}");
    }
    for (_, waiter) in group.drain(..) {
        let reply = match &outcome {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = waiter.send(reply);
    }
}

fn handle_control(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Rewrite { snapshot, response } => {
            let _ = response.send(wal.rewrite(&snapshot));
        }
        WalCommand::RecordsSinceCompact { response } => {
            let _ = response.send(wal.records_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are grouped by the caller"),
    }
}

// ── Engine ───────────────────────────────────────────────

/// External collaborators the engine depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    pub pricing: Arc<dyn PriceLookup>,
    pub clock: Arc<dyn Clock>,
}

/// Messages to deliver once a unit of work has committed.
#[derive(Debug, Default)]
pub(super) struct Outbox {
    users: Vec<(UserId, Notification)>,
    slots: Vec<SlotInvalidation>,
}

impl Outbox {
    pub(super) fn user(&mut self, user_id: UserId, notification: Notification) {
        self.users.push((user_id, notification));
    }

    pub(super) fn invalidate(&mut self, key: &SlotKey, at: Ms) {
        let already = self
            .slots
            .iter()
            .any(|s| s.court_id == key.court_id && s.date == key.date);
        if !already {
            self.slots.push(SlotInvalidation {
                court_id: key.court_id,
                date: key.date,
                updated_at: at,
            });
        }
    }

    pub(super) fn extend(&mut self, other: Outbox) {
        self.users.extend(other.users);
        for s in other.slots {
            if !self
                .slots
                .iter()
                .any(|x| x.court_id == s.court_id && x.date == s.date)
            {
                self.slots.push(s);
            }
        }
    }
}

/// Exclusive hold on one slot key for a read-check-write sequence.
///
/// Also holds the commit gate in shared mode so journal compaction never
/// observes a half-applied unit of work.
pub(super) struct SlotTxn {
    _gate: OwnedRwLockReadGuard<()>,
    pub(super) slot: OwnedRwLockWriteGuard<SlotState>,
}

pub struct Engine {
    slots: DashMap<SlotKey, SharedSlotState>,
    /// Reverse lookup: booking id → slot key.
    booking_index: DashMap<BookingId, SlotKey>,
    courts: DashMap<CourtId, Court>,
    gate: Arc<RwLock<()>>,
    wal_tx: mpsc::Sender<WalCommand>,
    notifier: Arc<dyn Notifier>,
    pricing: Arc<dyn PriceLookup>,
    clock: Arc<dyn Clock>,
    policy: Policy,
}

fn apply_to_slot(slot: &mut SlotState, event: &Event, index: &DashMap<BookingId, SlotKey>) {
    match event {
        Event::BookingCreated { booking } | Event::BookingUpdated { booking } => {
            index.insert(booking.id, booking.key);
            slot.upsert(booking.clone());
        }
        Event::BookingDeleted { id, .. } => {
            slot.remove(id);
            index.remove(id);
        }
        // Court rows live outside slot state.
        Event::CourtRegistered { .. } => {}
    }
}

impl Engine {
    /// Open the journal at `journal_path`, replay it, and start the writer task.
    /// Must be called inside a tokio runtime.
    pub fn new(journal_path: PathBuf, policy: Policy, deps: Collaborators) -> io::Result<Self> {
        let commits = Wal::recover(&journal_path)?;
        let wal = Wal::open(&journal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            slots: DashMap::new(),
            booking_index: DashMap::new(),
            courts: DashMap::new(),
            gate: Arc::new(RwLock::new(())),
            wal_tx,
            notifier: deps.notifier,
            pricing: deps.pricing,
            clock: deps.clock,
            policy,
        };

        // Sole owner during replay, so try_write never contends.
        for commit in &commits {
            for event in &commit.events {
                match event {
                    Event::CourtRegistered { court } => {
                        engine.courts.insert(court.id, court.clone());
                    }
                    other => {
                        if let Some(key) = other.slot_key() {
                            let slot = engine.slot_for(key);
                            let mut guard = slot.try_write().map_err(io::Error::other)?;
                            apply_to_slot(&mut guard, other, &engine.booking_index);
                        }
                    }
                }
            }
        }
        tracing::info!(
            courts = engine.courts.len(),
            bookings = engine.booking_index.len(),
            records = commits.len(),
            "journal replayed"
        );

        Ok(engine)
    }

    pub fn now(&self) -> Ms {
        self.clock.now_ms()
    }

    pub fn court(&self, id: &CourtId) -> Option<Court> {
        self.courts.get(id).map(|c| c.value().clone())
    }

    pub(super) fn slot_for(&self, key: SlotKey) -> SharedSlotState {
        self.slots
            .entry(key)
            .or_insert_with(|| Arc::new(RwLock::new(SlotState::new(key))))
            .value()
            .clone()
    }

    pub(super) fn existing_slot(&self, key: &SlotKey) -> Option<SharedSlotState> {
        self.slots.get(key).map(|e| e.value().clone())
    }

    /// Snapshot of every slot handle, so no map shard is held across an await.
    pub(super) fn all_slots(&self) -> Vec<SharedSlotState> {
        self.slots.iter().map(|e| e.value().clone()).collect()
    }

    async fn acquire(&self, key: SlotKey) -> SlotTxn {
        let gate = self.gate.clone().read_owned().await;
        let slot = self.slot_for(key).write_owned().await;
        SlotTxn { _gate: gate, slot }
    }

    /// Begin a client-facing unit of work on `key`, bounded by the transaction timeout.
    pub(super) async fn begin(&self, key: SlotKey) -> Result<SlotTxn, EngineError> {
        tokio::time::timeout(self.policy.txn_timeout, self.acquire(key))
            .await
            .map_err(|_| EngineError::Store(format!("timed out waiting for slot {key}")))
    }

    /// Begin a unit of work on the slot holding `id`. Fails if the booking is gone.
    pub(super) async fn begin_for_booking(&self, id: BookingId) -> Result<SlotTxn, EngineError> {
        let key = self
            .booking_index
            .get(&id)
            .map(|e| *e.value())
            .ok_or_else(|| EngineError::booking_not_found(id))?;
        let txn = self.begin(key).await?;
        // Deleted between the index lookup and the lock.
        if txn.slot.get(&id).is_none() {
            return Err(EngineError::booking_not_found(id));
        }
        Ok(txn)
    }

    /// Scheduler-side unit of work: waits as long as it takes.
    pub(super) async fn begin_background(&self, key: SlotKey) -> SlotTxn {
        self.acquire(key).await
    }

    async fn wal_append(&self, commit: Commit) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                commit,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Store("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Store("journal writer dropped response".into()))?
            .map_err(|e| EngineError::Store(e.to_string()))
    }

    /// Journal `events` as one record, then apply them to the locked slot.
    pub(super) async fn commit(&self, txn: &mut SlotTxn, events: Vec<Event>) -> Result<(), EngineError> {
        if events.is_empty() {
            return Ok(());
        }
        let commit = Commit {
            at: self.now(),
            events,
        };
        self.wal_append(commit.clone()).await?;
        for event in &commit.events {
            apply_to_slot(&mut txn.slot, event, &self.booking_index);
        }
        Ok(())
    }

    /// Journal and apply a court registration.
    pub(super) async fn commit_court(&self, court: Court) -> Result<(), EngineError> {
        let _gate = self.gate.clone().read_owned().await;
        let commit = Commit {
            at: self.now(),
            events: vec![Event::CourtRegistered {
                court: court.clone(),
            }],
        };
        self.wal_append(commit).await?;
        self.courts.insert(court.id, court);
        Ok(())
    }

    /// Deliver notifications. Call only after the unit of work has committed and its lock is released.
    pub(super) fn dispatch(&self, outbox: Outbox) {
        for (user_id, notification) in outbox.users {
            self.notifier.notify_user(user_id, notification);
        }
        for invalidation in outbox.slots {
            self.notifier.invalidate_slots(invalidation);
        }
    }

    /// Price for a catalog slot. Missing entries and lookup failures fall back to the default.
    pub(super) async fn resolve_price(&self, key: &SlotKey, label: &str) -> Decimal {
        match self.pricing.price(key.court_id, label, key.match_size).await {
            Ok(Some(price)) => price,
            Ok(None) => self.policy.default_price,
            Err(e) => {
                tracing::warn!(court_id = %key.court_id, "{e}; using default price");
                self.policy.default_price
            }
        }
    }

    // ── Journal compaction ───────────────────────────────

    /// Rewrite the journal as one record of courts plus one record per slot.
    /// Holds the commit gate exclusively, so no unit of work is in flight.
    pub async fn compact_journal(&self) -> Result<(), EngineError> {
        let _gate = self.gate.clone().write_owned().await;

        let mut snapshot = Vec::new();
        let courts: Vec<Event> = self
            .courts
            .iter()
            .map(|c| Event::CourtRegistered {
                court: c.value().clone(),
            })
            .collect();
        if !courts.is_empty() {
            snapshot.push(Commit {
                at: self.now(),
                events: courts,
            });
        }
        for slot in self.all_slots() {
            let guard = slot.read().await;
            if guard.bookings.is_empty() {
                continue;
            }
            snapshot.push(Commit {
                at: self.now(),
                events: guard
                    .bookings
                    .iter()
                    .map(|b| Event::BookingCreated { booking: b.clone() })
                    .collect(),
            });
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Rewrite {
                snapshot,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Store("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Store("journal writer dropped response".into()))?
            .map_err(|e| EngineError::Store(e.to_string()))
    }

    pub async fn journal_records_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::RecordsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
