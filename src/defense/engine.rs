//! The login-defense state machine.
//!
//! Reading state is not side-effect free: once the failure count reaches
//! `block_after_failure` and no lockout is active, the read itself starts one.
//! The lockout store does that check-and-set under its own lock, so repeated or
//! concurrent reads never extend or duplicate it.
//!
//! Count-then-lock in [`DefenseEngine::state`] and the two clears in
//! [`DefenseEngine::reset`] run under one engine gate. A read that counted a
//! breach before a reset can therefore never start a lockout after it.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use super::{
    client_key::ClientKey,
    clock::{Clock, SystemClock},
    lockout::LockoutStore,
    policy::DefensePolicy,
    state::DefenseState,
    window::FailureWindow,
};

pub struct DefenseEngine {
    policy: Arc<DefensePolicy>,
    failures: Arc<FailureWindow>,
    lockouts: Arc<LockoutStore>,
    clock: Arc<dyn Clock>,
    gate: Mutex<()>,
}

impl DefenseEngine {
    #[must_use]
    pub fn new(
        policy: Arc<DefensePolicy>,
        failures: Arc<FailureWindow>,
        lockouts: Arc<LockoutStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            policy,
            failures,
            lockouts,
            clock,
            gate: Mutex::new(()),
        }
    }

    /// Engine with fresh stores and the system clock.
    #[must_use]
    pub fn in_memory(policy: Arc<DefensePolicy>) -> Self {
        Self::new(
            policy,
            Arc::new(FailureWindow::new()),
            Arc::new(LockoutStore::new()),
            Arc::new(SystemClock),
        )
    }

    #[must_use]
    pub fn policy(&self) -> &DefensePolicy {
        &self.policy
    }

    pub fn state(&self, key: &ClientKey) -> DefenseState {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        let failures = self.failures.count(key, now, self.policy.window());

        let lockout_left = if failures >= self.policy.block_after_failure() {
            let lockout = self
                .lockouts
                .begin(key, now, self.policy.lockout_duration());
            if lockout.started {
                warn!(
                    client = %key,
                    failures,
                    seconds = lockout.seconds_left,
                    "lockout started"
                );
            }
            Some(lockout.seconds_left)
        } else {
            self.lockouts.get(key, now)
        };

        match lockout_left {
            Some(seconds_left) => DefenseState {
                failures,
                captcha_required: false,
                locked_out: true,
                lockout_seconds_left: seconds_left,
            },
            None => DefenseState {
                failures,
                captcha_required: failures >= self.policy.captcha_start_failure(),
                locked_out: false,
                lockout_seconds_left: 0,
            },
        }
    }

    /// Record a failed attempt and return the resulting state.
    ///
    /// Callers short-circuit locked clients before authenticating, so this is
    /// not expected to run while `key` is locked out.
    pub fn record_failure(&self, key: &ClientKey) -> DefenseState {
        self.failures.record(key, self.clock.now());
        let state = self.state(key);
        info!(client = %key, failures = state.failures, "login failure recorded");
        state
    }

    /// Forget every failure and lockout for `key` after a verified login.
    pub fn reset(&self, key: &ClientKey) {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.failures.reset(key);
        self.lockouts.clear(key);
        debug!(client = %key, "defense state reset");
    }
}
