//! Lockout expiry per client key.
//!
//! Expired entries are treated as absent and overwritten on the next breach.
//! Entries whose key never returns are dropped by a sweep that runs at most
//! once per [`SWEEP_INTERVAL_SECONDS`] on the read path.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::client_key::ClientKey;

pub const SWEEP_INTERVAL_SECONDS: i64 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lockout {
    pub seconds_left: u64,
    /// True when this call created the entry, false when one was already active.
    pub started: bool,
}

#[derive(Debug, Default)]
struct Expiries {
    by_key: HashMap<ClientKey, DateTime<Utc>>,
    last_sweep: Option<DateTime<Utc>>,
}

impl Expiries {
    fn sweep_if_due(&mut self, now: DateTime<Utc>) {
        let due = match self.last_sweep {
            Some(last) => now - last >= TimeDelta::seconds(SWEEP_INTERVAL_SECONDS),
            None => true,
        };
        if due {
            self.by_key.retain(|_, expiry| *expiry > now);
            self.last_sweep = Some(now);
        }
    }
}

#[derive(Debug, Default)]
pub struct LockoutStore {
    expiries: Mutex<Expiries>,
}

impl LockoutStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds left on an active lockout, `None` if absent or expired.
    pub fn get(&self, key: &ClientKey, now: DateTime<Utc>) -> Option<u64> {
        let mut expiries = self.expiries.lock().unwrap_or_else(PoisonError::into_inner);
        expiries.sweep_if_due(now);
        expiries
            .by_key
            .get(key)
            .and_then(|expiry| seconds_left(*expiry, now))
    }

    pub fn set(&self, key: &ClientKey, expiry: DateTime<Utc>) {
        let mut expiries = self.expiries.lock().unwrap_or_else(PoisonError::into_inner);
        expiries.by_key.insert(key.clone(), expiry);
    }

    pub fn clear(&self, key: &ClientKey) {
        let mut expiries = self.expiries.lock().unwrap_or_else(PoisonError::into_inner);
        expiries.by_key.remove(key);
    }

    /// Start a lockout of `duration` unless one is already active.
    ///
    /// Check and insert happen under one lock, so concurrent breaches from the
    /// same key never stack or extend an active lockout.
    pub fn begin(&self, key: &ClientKey, now: DateTime<Utc>, duration: TimeDelta) -> Lockout {
        let mut expiries = self.expiries.lock().unwrap_or_else(PoisonError::into_inner);
        expiries.sweep_if_due(now);
        if let Some(left) = expiries
            .by_key
            .get(key)
            .and_then(|expiry| seconds_left(*expiry, now))
        {
            return Lockout {
                seconds_left: left,
                started: false,
            };
        }

        let expiry = now
            .checked_add_signed(duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        expiries.by_key.insert(key.clone(), expiry);
        Lockout {
            seconds_left: seconds_left(expiry, now).unwrap_or(0),
            started: true,
        }
    }
}

/// Whole seconds until `expiry`, rounded up so an active lockout never reports zero.
fn seconds_left(expiry: DateTime<Utc>, now: DateTime<Utc>) -> Option<u64> {
    let remaining = expiry - now;
    if remaining <= TimeDelta::zero() {
        return None;
    }
    let whole = remaining.num_seconds();
    let rounded = if remaining > TimeDelta::seconds(whole) {
        whole + 1
    } else {
        whole
    };
    u64::try_from(rounded).ok()
}
