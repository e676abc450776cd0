use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::engine::Engine;

/// How often the compactor checks the journal's record count.
const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(10);

const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub cleanup_interval: Duration,
    pub sweep_interval: Duration,
    pub compact_interval: Duration,
    /// Compact once this many records were appended since the last rewrite.
    pub compact_threshold: u64,
}

impl SchedulerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cleanup_interval: config.cleanup_interval,
            sweep_interval: config.sweep_interval,
            compact_interval: COMPACT_CHECK_INTERVAL,
            compact_threshold: config.compact_threshold,
        }
    }
}

/// Background tasks that advance bookings by wall-clock time and keep the journal short.
///
/// Holds no global state: several schedulers (each with its own engine) can
/// run in one process.
pub struct Scheduler {
    engine: Arc<Engine>,
    config: SchedulerConfig,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(engine: Arc<Engine>, config: SchedulerConfig) -> Self {
        Self {
            engine,
            config,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Spawn the cleanup, sweep and compaction tasks. No-op if already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.cancel = CancellationToken::new();

        let engine = self.engine.clone();
        self.tasks.push(tokio::spawn(run_periodic(
            "unpaid_cleanup",
            self.config.cleanup_interval,
            self.cancel.clone(),
            move || {
                let engine = engine.clone();
                async move {
                    engine.cleanup_unpaid().await;
                }
            },
        )));

        let engine = self.engine.clone();
        self.tasks.push(tokio::spawn(run_periodic(
            "sweep",
            self.config.sweep_interval,
            self.cancel.clone(),
            move || {
                let engine = engine.clone();
                async move {
                    engine.sweep().await;
                }
            },
        )));

        let engine = self.engine.clone();
        let threshold = self.config.compact_threshold;
        self.tasks.push(tokio::spawn(run_periodic(
            "compactor",
            self.config.compact_interval,
            self.cancel.clone(),
            move || {
                let engine = engine.clone();
                async move {
                    compact_if_needed(&engine, threshold).await;
                }
            },
        )));

        info!(
            cleanup_secs = self.config.cleanup_interval.as_secs(),
            sweep_secs = self.config.sweep_interval.as_secs(),
            "scheduler started"
        );
    }

    /// Signal every task and wait for in-progress work to finish.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!("scheduler task panicked: {e}");
            }
        }
        info!("scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_periodic<F, Fut>(name: &'static str, period: Duration, cancel: CancellationToken, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    // tokio rejects a zero period.
    let mut interval = tokio::time::interval(period.max(MIN_PERIOD));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => job().await,
        }
    }
    tracing::debug!(task = name, "scheduler task exited");
}

async fn compact_if_needed(engine: &Engine, threshold: u64) {
    let count = engine.journal_records_since_compact().await;
    if count < threshold {
        return;
    }
    match engine.compact_journal().await {
        Ok(()) => info!("compacted journal after {count} records"),
        Err(e) => tracing::error!("journal compaction failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{local_ms, ManualClock};
    use crate::config::Policy;
    use crate::engine::{Collaborators, NewBooking, NewCourt};
    use crate::model::*;
    use crate::notify::NotifyHub;
    use crate::pricing::PriceTable;
    use chrono::{NaiveDate, NaiveTime};
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("courtslot_test_scheduler");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn fast() -> SchedulerConfig {
        SchedulerConfig {
            cleanup_interval: Duration::from_millis(20),
            sweep_interval: Duration::from_millis(50),
            compact_interval: Duration::from_millis(20),
            compact_threshold: 2,
        }
    }

    async fn setup(name: &str) -> (Arc<Engine>, Arc<ManualClock>, Actor, CourtId) {
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        let morning = local_ms(date, NaiveTime::from_hms_opt(8, 0, 0).unwrap(), Policy::default().utc_offset);
        let clock = Arc::new(ManualClock::new(morning));
        let engine = Engine::new(
            test_wal_path(name),
            Policy::default(),
            Collaborators {
                notifier: Arc::new(NotifyHub::new()),
                pricing: Arc::new(PriceTable::new()),
                clock: clock.clone(),
            },
        )
        .unwrap();
        let admin = Actor::new(Ulid::new(), Role::Admin);
        let court = engine
            .register_court(
                &admin,
                NewCourt {
                    name: "Riverside".into(),
                    manager_id: Ulid::new(),
                },
            )
            .await
            .unwrap();
        (Arc::new(engine), clock, admin, court.id)
    }

    fn request(court_id: CourtId, hour: u32) -> NewBooking {
        NewBooking {
            court_id,
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            start: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(hour + 1, 0, 0).unwrap(),
            match_size: MatchSize::Five,
            team_name: "Rovers".into(),
            contact_phone: "+15550100".into(),
            player_count: 5,
            matchmaking: false,
        }
    }

    #[tokio::test]
    async fn cleanup_task_deletes_unpaid_booking() {
        let (engine, clock, admin, court) = setup("cleanup_task.wal").await;
        let booking = engine.create_booking(&admin, request(court, 18)).await.unwrap();

        let mut scheduler = Scheduler::new(engine.clone(), fast());
        scheduler.start();
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_millis(60)).await;
        // Still within grace: nothing happens.
        tokio_test::assert_ok!(engine.get_booking(&admin, booking.id).await);

        clock.advance(9 * 60_000);
        tokio::time::sleep(Duration::from_millis(100)).await;
        tokio_test::assert_err!(engine.get_booking(&admin, booking.id).await);

        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn stopped_scheduler_does_nothing() {
        let (engine, clock, admin, court) = setup("stopped.wal").await;
        let booking = engine.create_booking(&admin, request(court, 18)).await.unwrap();

        let mut scheduler = Scheduler::new(engine.clone(), fast());
        scheduler.start();
        scheduler.stop().await;

        clock.advance(9 * 60_000);
        tokio::time::sleep(Duration::from_millis(100)).await;
        tokio_test::assert_ok!(engine.get_booking(&admin, booking.id).await);
    }

    #[tokio::test]
    async fn zero_interval_still_runs_cleanup() {
        let (engine, clock, admin, court) = setup("zero_interval.wal").await;
        let booking = engine.create_booking(&admin, request(court, 18)).await.unwrap();
        clock.advance(9 * 60_000);

        let config = SchedulerConfig {
            cleanup_interval: Duration::ZERO,
            ..fast()
        };
        let mut scheduler = Scheduler::new(engine.clone(), config);
        scheduler.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.stop().await;

        tokio_test::assert_err!(engine.get_booking(&admin, booking.id).await);
    }

    #[tokio::test]
    async fn compactor_resets_record_count() {
        let (engine, _clock, admin, court) = setup("compactor_task.wal").await;
        engine.create_booking(&admin, request(court, 18)).await.unwrap();
        engine.create_booking(&admin, request(court, 19)).await.unwrap();
        assert!(engine.journal_records_since_compact().await >= 2);

        let mut scheduler = Scheduler::new(engine.clone(), fast());
        scheduler.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.stop().await;

        assert_eq!(engine.journal_records_since_compact().await, 0);
    }
}
