//! Escalation thresholds and the user-facing copy derived from them.
//!
//! Thresholds count failed attempts inside the rolling window:
//!
//! | failures                                   | feedback                         |
//! |--------------------------------------------|----------------------------------|
//! | `1 ..warn_until_failures`                  | "N more attempt(s)" (warning)    |
//! | `== captcha_warn_failure`                  | challenge announced (warning)    |
//! | `>= captcha_start_failure`                 | challenge required               |
//! | `block_warn_from_failure ..block_after`    | block countdown (danger)         |
//! | `>= block_after_failure`                   | lockout (blocking)               |
//!
//! With the defaults, three failures match no row. That count is kept silent on
//! purpose and reported as [`DefenseStage::Quiet`].

use chrono::TimeDelta;

use super::state::{DefenseMessage, DefenseStage, DefenseState, Severity};

const DEFAULT_WARN_UNTIL_FAILURES: u32 = 3;
const DEFAULT_CAPTCHA_WARN_FAILURE: u32 = 4;
const DEFAULT_BLOCK_WARN_FROM_FAILURE: u32 = 5;
const DEFAULT_BLOCK_AFTER_FAILURE: u32 = 7;
const DEFAULT_WINDOW_SECONDS: u64 = 15 * 60;
const DEFAULT_LOCKOUT_SECONDS: u64 = 5 * 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("warn_until_failures must be at least 1")]
    WarnUntilZero,
    #[error("warn_until_failures ({warn_until}) must not exceed captcha_warn_failure ({captcha_warn})")]
    WarnAfterChallenge { warn_until: u32, captcha_warn: u32 },
    #[error("captcha_start_failure ({captcha_start}) must not exceed block_after_failure ({block_after})")]
    ChallengeAfterBlock { captcha_start: u32, block_after: u32 },
    #[error("block_warn_from_failure ({block_warn_from}) must not exceed block_after_failure ({block_after})")]
    BlockWarnAfterBlock { block_warn_from: u32, block_after: u32 },
    #[error("window_sec must be greater than zero")]
    EmptyWindow,
    #[error("lockout_duration_sec must be greater than zero")]
    EmptyLockout,
}

/// User-facing copy. `{n}` and `{seconds}` are substituted at render time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyMessages {
    pub invalid_generic: String,
    pub missing_fields: String,
    pub attempts_left: String,
    pub challenge_next: String,
    pub challenge_required: String,
    pub block_countdown: String,
    pub locked: String,
}

impl Default for PolicyMessages {
    fn default() -> Self {
        Self {
            invalid_generic: "Invalid credentials.".to_string(),
            missing_fields: "Missing username/password.".to_string(),
            attempts_left: "You have {n} more attempt(s).".to_string(),
            challenge_next: "The next attempt requires a challenge.".to_string(),
            challenge_required: "A challenge is now required.".to_string(),
            block_countdown: "{n} more incorrect attempt(s) and you will be temporarily blocked."
                .to_string(),
            locked: "Too many attempts. Retry in {seconds}s.".to_string(),
        }
    }
}

/// Immutable once built; constructed at startup and shared by reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefensePolicy {
    warn_until_failures: u32,
    captcha_warn_failure: u32,
    captcha_start_failure: u32,
    block_warn_from_failure: u32,
    block_after_failure: u32,
    window_sec: u64,
    lockout_duration_sec: u64,
    messages: PolicyMessages,
}

impl Default for DefensePolicy {
    fn default() -> Self {
        Self {
            warn_until_failures: DEFAULT_WARN_UNTIL_FAILURES,
            captcha_warn_failure: DEFAULT_CAPTCHA_WARN_FAILURE,
            captcha_start_failure: DEFAULT_CAPTCHA_WARN_FAILURE + 1,
            block_warn_from_failure: DEFAULT_BLOCK_WARN_FROM_FAILURE,
            block_after_failure: DEFAULT_BLOCK_AFTER_FAILURE,
            window_sec: DEFAULT_WINDOW_SECONDS,
            lockout_duration_sec: DEFAULT_LOCKOUT_SECONDS,
            messages: PolicyMessages::default(),
        }
    }
}

impl DefensePolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_warn_until_failures(mut self, failures: u32) -> Self {
        self.warn_until_failures = failures;
        self
    }

    /// Also moves the challenge start to the following failure.
    #[must_use]
    pub fn with_captcha_warn_failure(mut self, failures: u32) -> Self {
        self.captcha_warn_failure = failures;
        self.captcha_start_failure = failures.saturating_add(1);
        self
    }

    #[must_use]
    pub fn with_block_warn_from_failure(mut self, failures: u32) -> Self {
        self.block_warn_from_failure = failures;
        self
    }

    #[must_use]
    pub fn with_block_after_failure(mut self, failures: u32) -> Self {
        self.block_after_failure = failures;
        self
    }

    #[must_use]
    pub fn with_window_sec(mut self, seconds: u64) -> Self {
        self.window_sec = seconds;
        self
    }

    #[must_use]
    pub fn with_lockout_duration_sec(mut self, seconds: u64) -> Self {
        self.lockout_duration_sec = seconds;
        self
    }

    #[must_use]
    pub fn with_messages(mut self, messages: PolicyMessages) -> Self {
        self.messages = messages;
        self
    }

    /// Check threshold ordering.
    ///
    /// # Errors
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.warn_until_failures == 0 {
            return Err(PolicyError::WarnUntilZero);
        }
        if self.warn_until_failures > self.captcha_warn_failure {
            return Err(PolicyError::WarnAfterChallenge {
                warn_until: self.warn_until_failures,
                captcha_warn: self.captcha_warn_failure,
            });
        }
        if self.captcha_start_failure > self.block_after_failure {
            return Err(PolicyError::ChallengeAfterBlock {
                captcha_start: self.captcha_start_failure,
                block_after: self.block_after_failure,
            });
        }
        if self.block_warn_from_failure > self.block_after_failure {
            return Err(PolicyError::BlockWarnAfterBlock {
                block_warn_from: self.block_warn_from_failure,
                block_after: self.block_after_failure,
            });
        }
        if self.window_sec == 0 {
            return Err(PolicyError::EmptyWindow);
        }
        if self.lockout_duration_sec == 0 {
            return Err(PolicyError::EmptyLockout);
        }
        Ok(())
    }

    #[must_use]
    pub fn warn_until_failures(&self) -> u32 {
        self.warn_until_failures
    }

    #[must_use]
    pub fn captcha_warn_failure(&self) -> u32 {
        self.captcha_warn_failure
    }

    #[must_use]
    pub fn captcha_start_failure(&self) -> u32 {
        self.captcha_start_failure
    }

    #[must_use]
    pub fn block_warn_from_failure(&self) -> u32 {
        self.block_warn_from_failure
    }

    #[must_use]
    pub fn block_after_failure(&self) -> u32 {
        self.block_after_failure
    }

    #[must_use]
    pub fn window_sec(&self) -> u64 {
        self.window_sec
    }

    #[must_use]
    pub fn lockout_duration_sec(&self) -> u64 {
        self.lockout_duration_sec
    }

    #[must_use]
    pub fn messages(&self) -> &PolicyMessages {
        &self.messages
    }

    pub(crate) fn window(&self) -> TimeDelta {
        seconds_delta(self.window_sec)
    }

    pub(crate) fn lockout_duration(&self) -> TimeDelta {
        seconds_delta(self.lockout_duration_sec)
    }

    #[must_use]
    pub fn stage(&self, state: &DefenseState) -> DefenseStage {
        let failures = state.failures;
        if state.locked_out {
            DefenseStage::Locked
        } else if failures >= self.captcha_start_failure {
            DefenseStage::ChallengeActive
        } else if failures == self.captcha_warn_failure {
            DefenseStage::ChallengeAnnounced
        } else if failures == 0 {
            DefenseStage::Clean
        } else if failures < self.warn_until_failures {
            DefenseStage::SoftWarning
        } else {
            DefenseStage::Quiet
        }
    }

    /// Feedback for `state`, or `None` when the failure count has no copy.
    #[must_use]
    pub fn message(&self, state: &DefenseState) -> Option<DefenseMessage> {
        let failures = state.failures;
        let messages = &self.messages;

        if state.locked_out {
            return Some(DefenseMessage {
                severity: Severity::Blocking,
                text: messages
                    .locked
                    .replace("{seconds}", &state.lockout_seconds_left.to_string()),
            });
        }
        if (1..self.warn_until_failures).contains(&failures) {
            return Some(DefenseMessage {
                severity: Severity::Warning,
                text: messages
                    .attempts_left
                    .replace("{n}", &(self.warn_until_failures - failures).to_string()),
            });
        }
        if failures == self.captcha_warn_failure {
            return Some(DefenseMessage {
                severity: Severity::Warning,
                text: messages.challenge_next.clone(),
            });
        }
        if (self.block_warn_from_failure..self.block_after_failure).contains(&failures) {
            return Some(DefenseMessage {
                severity: Severity::Danger,
                text: messages
                    .block_countdown
                    .replace("{n}", &(self.block_after_failure - failures).to_string()),
            });
        }
        None
    }
}

fn seconds_delta(seconds: u64) -> TimeDelta {
    let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
    TimeDelta::try_seconds(seconds).unwrap_or_else(TimeDelta::max_value)
}
