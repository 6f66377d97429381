//! Point-in-time view of a client's defense accounting.

/// Derived on every query from the failure window and lockout store; never stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DefenseState {
    pub failures: u32,
    pub captcha_required: bool,
    pub locked_out: bool,
    pub lockout_seconds_left: u64,
}

impl DefenseState {
    #[must_use]
    pub fn clean() -> Self {
        Self::default()
    }
}

/// Named position in the escalation ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefenseStage {
    Clean,
    SoftWarning,
    /// A failure count no message rule covers, e.g. `failures == warn_until_failures`
    /// with the default thresholds. Distinct from `Clean`.
    Quiet,
    ChallengeAnnounced,
    ChallengeActive,
    Locked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Danger,
    Blocking,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Danger => "danger",
            Self::Blocking => "blocking",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefenseMessage {
    pub severity: Severity,
    pub text: String,
}
