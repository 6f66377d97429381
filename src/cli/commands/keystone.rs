use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_KEYSTONE_URL: &str = "keystone-url";
pub const ARG_USER_DOMAIN: &str = "user-domain";
pub const ARG_AUTH_TIMEOUT_SECONDS: &str = "auth-timeout-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub url: String,
    pub user_domain: String,
    pub auth_timeout_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if an argument is missing or the timeout is zero.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let url = matches
            .get_one::<String>(ARG_KEYSTONE_URL)
            .map(|url| url.trim_end_matches('/').to_string())
            .context("missing required argument: --keystone-url")?;
        let user_domain = matches
            .get_one::<String>(ARG_USER_DOMAIN)
            .cloned()
            .context("missing required argument: --user-domain")?;
        let auth_timeout_seconds = matches
            .get_one::<u64>(ARG_AUTH_TIMEOUT_SECONDS)
            .copied()
            .unwrap_or(10);
        if auth_timeout_seconds == 0 {
            return Err(anyhow!("--{ARG_AUTH_TIMEOUT_SECONDS} must be greater than 0"));
        }

        Ok(Self {
            url,
            user_domain,
            auth_timeout_seconds,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_KEYSTONE_URL)
                .long(ARG_KEYSTONE_URL)
                .help("Keystone v3 base URL, e.g. https://keystone.tld/v3")
                .env("FRONTDOOR_KEYSTONE_URL")
                .default_value("https://keystone.example.com/v3"),
        )
        .arg(
            Arg::new(ARG_USER_DOMAIN)
                .long(ARG_USER_DOMAIN)
                .help("Keystone domain users authenticate in")
                .env("FRONTDOOR_USER_DOMAIN")
                .default_value("Default"),
        )
        .arg(
            Arg::new(ARG_AUTH_TIMEOUT_SECONDS)
                .long(ARG_AUTH_TIMEOUT_SECONDS)
                .help("Give up on Keystone after this many seconds")
                .env("FRONTDOOR_AUTH_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64)),
        )
}
