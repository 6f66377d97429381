//! Sliding-window failure log, one chronological queue per client key.
//!
//! Keys that stop coming back are reclaimed by a sweep that runs at most once
//! per window, piggybacked on [`FailureWindow::count`].

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use super::client_key::ClientKey;

#[derive(Debug, Default)]
struct Entries {
    queues: HashMap<ClientKey, VecDeque<DateTime<Utc>>>,
    last_sweep: Option<DateTime<Utc>>,
}

impl Entries {
    fn sweep_if_due(&mut self, now: DateTime<Utc>, window: TimeDelta) {
        let due = match self.last_sweep {
            Some(last) => now - last >= window,
            None => true,
        };
        if !due {
            return;
        }
        self.queues.retain(|_, queue| {
            prune(queue, now, window);
            !queue.is_empty()
        });
        self.last_sweep = Some(now);
    }
}

fn prune(queue: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>, window: TimeDelta) {
    while queue.front().is_some_and(|oldest| now - *oldest > window) {
        queue.pop_front();
    }
}

#[derive(Debug, Default)]
pub struct FailureWindow {
    entries: Mutex<Entries>,
}

impl FailureWindow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a failure at `now`. Callers pass a non-decreasing clock, so the
    /// queue stays ordered oldest first.
    pub fn record(&self, key: &ClientKey, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.queues.entry(key.clone()).or_default().push_back(now);
    }

    /// Drop failures older than `window` and return how many remain.
    pub fn count(&self, key: &ClientKey, now: DateTime<Utc>, window: TimeDelta) -> u32 {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.sweep_if_due(now, window);

        let Some(queue) = entries.queues.get_mut(key) else {
            return 0;
        };
        prune(queue, now, window);

        if queue.is_empty() {
            entries.queues.remove(key);
            return 0;
        }

        u32::try_from(queue.len()).unwrap_or(u32::MAX)
    }

    pub fn reset(&self, key: &ClientKey) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.queues.remove(key);
    }
}
