use serde::Serialize;

use crate::config::Policy;
use crate::model::*;
use crate::notify::NotificationKind;

use super::lifecycle::notice;
use super::{Engine, Outbox};

/// What one sweep pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub deleted_unpaid: usize,
    pub expired_matchmaking: usize,
    pub completed: usize,
    pub errors: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.deleted_unpaid + self.expired_matchmaking + self.completed
    }

    fn merge(&mut self, other: SweepReport) {
        self.deleted_unpaid += other.deleted_unpaid;
        self.expired_matchmaking += other.expired_matchmaking;
        self.completed += other.completed;
        self.errors += other.errors;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    UnpaidCleanup,
    MatchmakingExpiry,
    Completion,
}

impl Rule {
    fn as_str(self) -> &'static str {
        match self {
            Rule::UnpaidCleanup => "unpaid_cleanup",
            Rule::MatchmakingExpiry => "matchmaking_expiry",
            Rule::Completion => "completion",
        }
    }

    fn is_due(self, booking: &Booking, now: Ms, policy: &Policy) -> bool {
        match self {
            Rule::UnpaidCleanup => booking.is_unpaid_expired(now, policy.unpaid_grace_ms),
            Rule::MatchmakingExpiry => {
                booking.status == BookingStatus::FindingTeam
                    && booking.key.start_ms(policy.utc_offset) - now <= policy.matchmaking_cutoff_ms
            }
            Rule::Completion => {
                booking.status == BookingStatus::Confirmed && now > booking.key.end_ms(policy.utc_offset)
            }
        }
    }

    /// The event that advances `booking`, plus what to announce once it commits.
    fn advance(self, booking: &Booking, now: Ms) -> (Event, Outbox) {
        let mut outbox = Outbox::default();
        let event = match self {
            Rule::UnpaidCleanup => {
                if booking.status == BookingStatus::Confirmed {
                    outbox.invalidate(&booking.key, now);
                }
                Event::BookingDeleted {
                    id: booking.id,
                    key: booking.key,
                }
            }
            Rule::MatchmakingExpiry => {
                let mut next = booking.clone();
                next.status = BookingStatus::Cancelled;
                next.updated_at = now;
                outbox.user(next.requester, notice(NotificationKind::TeamNotFound, &next, None));
                outbox.invalidate(&next.key, now);
                Event::BookingUpdated { booking: next }
            }
            Rule::Completion => {
                let mut next = booking.clone();
                next.status = BookingStatus::Completed;
                next.payment_status = PaymentStatus::Paid;
                next.updated_at = now;
                outbox.user(next.requester, notice(NotificationKind::BookingCompleted, &next, None));
                Event::BookingUpdated { booking: next }
            }
        };
        (event, outbox)
    }

    fn record(self, report: &mut SweepReport) {
        match self {
            Rule::UnpaidCleanup => report.deleted_unpaid += 1,
            Rule::MatchmakingExpiry => report.expired_matchmaking += 1,
            Rule::Completion => report.completed += 1,
        }
    }
}

impl Engine {
    /// Full pass: unpaid cleanup, then matchmaking expiry, then completion.
    ///
    /// Each rule re-checks its guard under the slot lock, so running two sweeps
    /// back to back (or concurrently) advances every booking at most once.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        for rule in [Rule::UnpaidCleanup, Rule::MatchmakingExpiry, Rule::Completion] {
            report.merge(self.run_rule(rule).await);
        }
        if report.total() > 0 || report.errors > 0 {
            tracing::info!(
                deleted_unpaid = report.deleted_unpaid,
                expired_matchmaking = report.expired_matchmaking,
                completed = report.completed,
                errors = report.errors,
                "sweep finished"
            );
        }
        report
    }

    /// Hard-delete bookings still without a payment method after the grace period.
    pub async fn cleanup_unpaid(&self) -> SweepReport {
        self.run_rule(Rule::UnpaidCleanup).await
    }

    pub async fn expire_matchmaking(&self) -> SweepReport {
        self.run_rule(Rule::MatchmakingExpiry).await
    }

    pub async fn complete_finished(&self) -> SweepReport {
        self.run_rule(Rule::Completion).await
    }

    async fn run_rule(&self, rule: Rule) -> SweepReport {
        let mut report = SweepReport::default();

        for slot in self.all_slots() {
            // Cheap shared-lock scan first; most slots have nothing due.
            let key = {
                let guard = slot.read().await;
                let now = self.now();
                if !guard.bookings.iter().any(|b| rule.is_due(b, now, &self.policy)) {
                    continue;
                }
                guard.key
            };

            let mut outbox = Outbox::default();
            {
                let mut txn = self.begin_background(key).await;
                let now = self.now();
                let due: Vec<Booking> = txn
                    .slot
                    .bookings
                    .iter()
                    .filter(|b| rule.is_due(b, now, &self.policy))
                    .cloned()
                    .collect();

                for booking in due {
                    let (event, announce) = rule.advance(&booking, now);
                    match self.commit(&mut txn, vec![event]).await {
                        Ok(()) => {
                            rule.record(&mut report);
                            outbox.extend(announce);
                            tracing::debug!(booking_id = %booking.id, rule = rule.as_str(), "sweep advanced booking");
                        }
                        Err(e) => {
                            report.errors += 1;
                            tracing::error!(booking_id = %booking.id, rule = rule.as_str(), "sweep failed: {e}");
                        }
                    }
                }
            }
            self.dispatch(outbox);
        }

        let acted = report.total();
        if acted > 0 {
            metrics::counter!(crate::observability::SWEEP_ACTIONS_TOTAL, "rule" => rule.as_str())
                .increment(acted as u64);
        }
        report
    }
}
