//! Batch scheduler: decides, once per tick, whether to flush settled
//! changes.
//!
//! The scheduler performs no I/O. [`BatchScheduler::plan`] copies the
//! settled subset out of the pending set; the caller pushes it and reports
//! back through [`BatchScheduler::on_push_result`]. Only one plan may be
//! outstanding at a time.

use crate::pending::{PendingChangeSet, SettledEntry};
use crate::settings::SyncSettings;
use scenesync_types::Timestamp;

/// Which condition caused a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Minimum push interval elapsed since the last successful push.
    MinPushInterval,
    /// Settled count reached the maximum batch size.
    MaxBatchSize,
    /// Batch interval elapsed since the last batch boundary.
    BatchInterval,
}

/// Why a tick did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleReason {
    Disabled,
    RemoteNotReady,
    Empty,
    PushInFlight,
}

/// Settled entries chosen for one push.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushPlan {
    pub entries: Vec<SettledEntry>,
    pub trigger: FlushTrigger,
    /// Entries left behind because they are still changing.
    pub unsettled: usize,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickDecision {
    Idle(IdleReason),
    /// Pending work exists but no trigger fired.
    Wait { settled: usize, unsettled: usize },
    Flush(FlushPlan),
}

#[derive(Debug, Clone)]
pub struct BatchScheduler {
    last_push: Timestamp,
    last_batch: Timestamp,
    in_flight: bool,
}

impl BatchScheduler {
    /// Both clocks start at `now`, so the first flush waits a full minimum
    /// interval after startup.
    pub fn new(now: Timestamp) -> Self {
        Self {
            last_push: now,
            last_batch: now,
            in_flight: false,
        }
    }

    pub fn last_push(&self) -> Timestamp {
        self.last_push
    }

    pub fn last_batch(&self) -> Timestamp {
        self.last_batch
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Evaluates the flush triggers. A returned [`TickDecision::Flush`]
    /// marks a push as in flight until [`Self::on_push_result`] is called.
    pub fn plan(
        &mut self,
        settings: &SyncSettings,
        pending: &PendingChangeSet,
        now: Timestamp,
    ) -> TickDecision {
        if !settings.enabled {
            return TickDecision::Idle(IdleReason::Disabled);
        }
        if !settings.remote_ready() {
            return TickDecision::Idle(IdleReason::RemoteNotReady);
        }
        if pending.is_empty() {
            return TickDecision::Idle(IdleReason::Empty);
        }
        if self.in_flight {
            return TickDecision::Idle(IdleReason::PushInFlight);
        }

        let timing = &settings.timing;
        let settled = pending.settled(now, timing.settle());
        let unsettled = pending.len() - settled.len();
        if settled.is_empty() {
            return TickDecision::Wait {
                settled: 0,
                unsettled,
            };
        }

        let trigger = if settled.len() >= timing.max_batch_size {
            FlushTrigger::MaxBatchSize
        } else if now.since(self.last_push) >= timing.min_push_interval() {
            FlushTrigger::MinPushInterval
        } else if now.since(self.last_batch) >= timing.batch_interval() {
            FlushTrigger::BatchInterval
        } else {
            return TickDecision::Wait {
                settled: settled.len(),
                unsettled,
            };
        };

        self.in_flight = true;
        TickDecision::Flush(FlushPlan {
            entries: settled,
            trigger,
            unsettled,
        })
    }

    /// Settles an outstanding plan. On success the pushed entries that were
    /// not re-mutated meanwhile leave the pending set and both clocks
    /// advance; on failure nothing changes and the next tick retries.
    /// Returns how many entries were removed.
    pub fn on_push_result(
        &mut self,
        pending: &mut PendingChangeSet,
        flushed: &[SettledEntry],
        success: bool,
        now: Timestamp,
    ) -> usize {
        self.in_flight = false;
        if !success {
            return 0;
        }
        self.last_push = now;
        self.last_batch = now;
        pending.remove_flushed(flushed)
    }
}
