//! Map validated CLI arguments to the action to run.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{defense, keystone, portal};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let portal_opts = portal::Options::parse(matches)?;
    let keystone_opts = keystone::Options::parse(matches)?;
    let defense_opts = defense::Options::parse(matches);

    Ok(Action::Server(Args {
        port: portal_opts.port,
        horizon_url: portal_opts.horizon_url,
        session_cookie_secure: portal_opts.session_cookie_secure,
        session_ttl_seconds: portal_opts.session_ttl_seconds,
        keystone_url: keystone_opts.url,
        user_domain: keystone_opts.user_domain,
        auth_timeout_seconds: keystone_opts.auth_timeout_seconds,
        defense: defense_opts,
    }))
}
