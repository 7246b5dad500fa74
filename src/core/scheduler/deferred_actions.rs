// Deferred action scheduler - timed reversals of moderation actions.
//
// Entries are keyed by (target, action kind), so at most one reversal per
// member per kind is pending. A second `schedule` for a live key is rejected;
// callers cancel first if they want to replace it.
//
// Firing and cancelling both go through `remove_if` on the entry with the
// entry's id. Whoever removes the entry wins: a cancel that gets there first
// guarantees the reversal never runs, a fire that gets there first runs the
// reversal to completion and the late cancel is a no-op.

use crate::core::commands::handler::CommandError;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::AbortHandle;
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeferredTarget {
    pub guild_id: u64,
    pub user_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Unmute,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Unmute => "unmute",
        }
    }
}

/// Identifies one scheduled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredHandle {
    pub target: DeferredTarget,
    pub kind: ActionKind,
    id: u64,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("A pending {} already exists for this member ({remaining_secs}s left)", .kind.label())]
    AlreadyScheduled {
        kind: ActionKind,
        remaining_secs: u64,
    },
}

/// The work done when an entry fires.
#[async_trait]
pub trait DeferredReversal: Send + Sync {
    async fn run(&self, target: DeferredTarget) -> Result<(), CommandError>;

    /// Called with the error when `run` fails, so the failure reaches the
    /// same place a failing command would report to.
    async fn report_failure(&self, target: DeferredTarget, error: CommandError);
}

type EntryKey = (DeferredTarget, ActionKind);

struct ScheduledEntry {
    id: u64,
    fire_at: Instant,
    timer: AbortHandle,
}

pub struct DeferredActionScheduler {
    entries: Arc<DashMap<EntryKey, ScheduledEntry>>,
    next_id: AtomicU64,
}

impl Default for DeferredActionScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredActionScheduler {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Install a one-shot timer that runs `reversal` after `delay`.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn schedule(
        &self,
        target: DeferredTarget,
        kind: ActionKind,
        delay: Duration,
        reversal: Arc<dyn DeferredReversal>,
    ) -> Result<DeferredHandle, SchedulerError> {
        let key = (target, kind);

        match self.entries.entry(key) {
            Entry::Occupied(existing) => Err(SchedulerError::AlreadyScheduled {
                kind,
                remaining_secs: existing
                    .get()
                    .fire_at
                    .saturating_duration_since(Instant::now())
                    .as_secs(),
            }),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let entries = Arc::clone(&self.entries);

                let timer = tokio::spawn(async move {
                    sleep(delay).await;

                    // Claim the entry; a cancel that already removed it wins
                    if entries.remove_if(&key, |_, entry| entry.id == id).is_none() {
                        return;
                    }

                    tracing::info!(
                        guild_id = target.guild_id,
                        user_id = target.user_id,
                        kind = kind.label(),
                        "Running deferred action"
                    );
                    if let Err(err) = reversal.run(target).await {
                        tracing::error!(
                            guild_id = target.guild_id,
                            user_id = target.user_id,
                            kind = kind.label(),
                            error = %err,
                            "Deferred action failed"
                        );
                        reversal.report_failure(target, err).await;
                    }
                })
                .abort_handle();

                slot.insert(ScheduledEntry {
                    id,
                    fire_at: Instant::now() + delay,
                    timer,
                });

                tracing::debug!(
                    guild_id = target.guild_id,
                    user_id = target.user_id,
                    kind = kind.label(),
                    delay_secs = delay.as_secs(),
                    "Scheduled deferred action"
                );
                Ok(DeferredHandle { target, kind, id })
            }
        }
    }

    /// Cancel one specific entry. Returns whether it was still pending.
    /// Cancelling twice, or after the entry fired, is a no-op.
    pub fn cancel(&self, handle: DeferredHandle) -> bool {
        match self
            .entries
            .remove_if(&(handle.target, handle.kind), |_, entry| entry.id == handle.id)
        {
            Some((_, entry)) => {
                entry.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel whatever is pending for the target, without needing its handle.
    pub fn cancel_for(&self, target: DeferredTarget, kind: ActionKind) -> bool {
        match self.entries.remove(&(target, kind)) {
            Some((_, entry)) => {
                entry.timer.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, target: DeferredTarget, kind: ActionKind) -> bool {
        self.entries.contains_key(&(target, kind))
    }

    /// Time left before the pending entry fires.
    pub fn remaining(&self, target: DeferredTarget, kind: ActionKind) -> Option<Duration> {
        self.entries
            .get(&(target, kind))
            .map(|entry| entry.fire_at.saturating_duration_since(Instant::now()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for DeferredActionScheduler {
    fn drop(&mut self) {
        for entry in self.entries.iter() {
            entry.timer.abort();
        }
    }
}
