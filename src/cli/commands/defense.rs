use clap::{Arg, ArgMatches, Command};

use crate::defense::DefensePolicy;

pub const ARG_WARN_UNTIL_FAILURES: &str = "warn-until-failures";
pub const ARG_CAPTCHA_WARN_FAILURE: &str = "captcha-warn-failure";
pub const ARG_BLOCK_WARN_FROM_FAILURE: &str = "block-warn-from-failure";
pub const ARG_BLOCK_AFTER_FAILURE: &str = "block-after-failure";
pub const ARG_DEFENSE_WINDOW_SECONDS: &str = "defense-window-seconds";
pub const ARG_LOCKOUT_SECONDS: &str = "lockout-seconds";

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub warn_until_failures: u32,
    pub captcha_warn_failure: u32,
    pub block_warn_from_failure: u32,
    pub block_after_failure: u32,
    pub window_seconds: u64,
    pub lockout_seconds: u64,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let defaults = DefensePolicy::default();
        let threshold = |name: &str, default: u32| {
            matches.get_one::<u32>(name).copied().unwrap_or(default)
        };
        let seconds = |name: &str, default: u64| {
            matches.get_one::<u64>(name).copied().unwrap_or(default)
        };

        Self {
            warn_until_failures: threshold(ARG_WARN_UNTIL_FAILURES, defaults.warn_until_failures()),
            captcha_warn_failure: threshold(
                ARG_CAPTCHA_WARN_FAILURE,
                defaults.captcha_warn_failure(),
            ),
            block_warn_from_failure: threshold(
                ARG_BLOCK_WARN_FROM_FAILURE,
                defaults.block_warn_from_failure(),
            ),
            block_after_failure: threshold(ARG_BLOCK_AFTER_FAILURE, defaults.block_after_failure()),
            window_seconds: seconds(ARG_DEFENSE_WINDOW_SECONDS, defaults.window_sec()),
            lockout_seconds: seconds(ARG_LOCKOUT_SECONDS, defaults.lockout_duration_sec()),
        }
    }

    /// Unvalidated policy built from these options.
    #[must_use]
    pub fn policy(&self) -> DefensePolicy {
        DefensePolicy::new()
            .with_warn_until_failures(self.warn_until_failures)
            .with_captcha_warn_failure(self.captcha_warn_failure)
            .with_block_warn_from_failure(self.block_warn_from_failure)
            .with_block_after_failure(self.block_after_failure)
            .with_window_sec(self.window_seconds)
            .with_lockout_duration_sec(self.lockout_seconds)
    }
}

fn threshold_arg(
    name: &'static str,
    env: &'static str,
    help: &'static str,
    default: &'static str,
) -> Arg {
    Arg::new(name)
        .long(name)
        .help(help)
        .env(env)
        .default_value(default)
        .value_parser(clap::value_parser!(u32))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(threshold_arg(
            ARG_WARN_UNTIL_FAILURES,
            "FRONTDOOR_WARN_UNTIL_FAILURES",
            "Show the remaining-attempts warning below this many failures",
            "3",
        ))
        .arg(threshold_arg(
            ARG_CAPTCHA_WARN_FAILURE,
            "FRONTDOOR_CAPTCHA_WARN_FAILURE",
            "Announce the challenge at exactly this many failures; it is required from the next one",
            "4",
        ))
        .arg(threshold_arg(
            ARG_BLOCK_WARN_FROM_FAILURE,
            "FRONTDOOR_BLOCK_WARN_FROM_FAILURE",
            "Start the lockout countdown at this many failures",
            "5",
        ))
        .arg(threshold_arg(
            ARG_BLOCK_AFTER_FAILURE,
            "FRONTDOOR_BLOCK_AFTER_FAILURE",
            "Lock the client out at this many failures",
            "7",
        ))
        .arg(
            Arg::new(ARG_DEFENSE_WINDOW_SECONDS)
                .long(ARG_DEFENSE_WINDOW_SECONDS)
                .help("Sliding window in which failures are counted")
                .env("FRONTDOOR_DEFENSE_WINDOW_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_SECONDS)
                .long(ARG_LOCKOUT_SECONDS)
                .help("How long a lockout lasts")
                .env("FRONTDOOR_LOCKOUT_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
}
