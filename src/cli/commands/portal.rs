use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_PORT: &str = "port";
pub const ARG_HORIZON_URL: &str = "horizon-url";
pub const ARG_SESSION_COOKIE_SECURE: &str = "session-cookie-secure";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub port: u16,
    pub horizon_url: String,
    pub session_cookie_secure: bool,
    pub session_ttl_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if the dashboard URL is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            port: matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080),
            horizon_url: matches
                .get_one::<String>(ARG_HORIZON_URL)
                .cloned()
                .context("missing required argument: --horizon-url")?,
            session_cookie_secure: matches
                .get_one::<bool>(ARG_SESSION_COOKIE_SECURE)
                .copied()
                .unwrap_or(true),
            session_ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(43_200),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("FRONTDOOR_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_HORIZON_URL)
                .long(ARG_HORIZON_URL)
                .help("Dashboard URL linked from the landing page")
                .env("FRONTDOOR_HORIZON_URL")
                .default_value("https://opole.minizon.net/"),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_SECURE)
                .long(ARG_SESSION_COOKIE_SECURE)
                .help("Mark the session cookie Secure (disable only for plain-HTTP development)")
                .env("FRONTDOOR_SESSION_COOKIE_SECURE")
                .default_value("true")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("FRONTDOOR_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(u64)),
        )
}
