// Cooldown tracker - per (command, user) usage windows.
//
// The first use of a cooldown-bearing command starts a window and lets the
// command through. Uses inside the window get the live entry back so the
// caller can tell the user how long is left. Re-invoking never refreshes the
// window; only its own timer removes it.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CooldownKey {
    command: String,
    user_id: u64,
}

struct CooldownEntry {
    started_at: Instant,
    duration: Duration,
    generation: u64,
    expiry: AbortHandle,
}

/// A window that is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveCooldown {
    pub started_at: Instant,
    pub duration: Duration,
}

impl ActiveCooldown {
    /// Whole seconds left, computed as `duration - floor(elapsed)`.
    pub fn remaining_secs(&self) -> u64 {
        self.duration
            .as_secs()
            .saturating_sub(self.started_at.elapsed().as_secs())
    }
}

pub struct CooldownTracker {
    entries: Arc<DashMap<CooldownKey, CooldownEntry>>,
    next_generation: AtomicU64,
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Returns `None` when the command may run (no cooldown applies, or a
    /// fresh window was just started) and the live window otherwise.
    ///
    /// Check and insert happen under the same map entry lock, so two
    /// concurrent calls for one key can't both start a window.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn get_or_start(
        &self,
        command: &str,
        user_id: u64,
        duration_secs: u64,
        is_owner: bool,
    ) -> Option<ActiveCooldown> {
        if duration_secs == 0 || is_owner {
            return None;
        }

        let key = CooldownKey {
            command: command.to_string(),
            user_id,
        };

        match self.entries.entry(key.clone()) {
            Entry::Occupied(existing) => {
                let entry = existing.get();
                Some(ActiveCooldown {
                    started_at: entry.started_at,
                    duration: entry.duration,
                })
            }
            Entry::Vacant(slot) => {
                let duration = Duration::from_secs(duration_secs);
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let entries = Arc::clone(&self.entries);

                let expiry = tokio::spawn(async move {
                    sleep(duration).await;
                    entries.remove_if(&key, |_, entry| entry.generation == generation);
                    tracing::trace!(command = %key.command, user_id = key.user_id, "Cooldown expired");
                })
                .abort_handle();

                slot.insert(CooldownEntry {
                    started_at: Instant::now(),
                    duration,
                    generation,
                    expiry,
                });
                None
            }
        }
    }

    /// The live window for a key, without starting one.
    pub fn active(&self, command: &str, user_id: u64) -> Option<ActiveCooldown> {
        let key = CooldownKey {
            command: command.to_string(),
            user_id,
        };
        self.entries.get(&key).map(|entry| ActiveCooldown {
            started_at: entry.started_at,
            duration: entry.duration,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for CooldownTracker {
    fn drop(&mut self) {
        for entry in self.entries.iter() {
            entry.expiry.abort();
        }
    }
}
