use crate::{
    cli::commands::defense,
    defense::DefenseEngine,
    keystone::KeystoneClient,
    portal::{self, PortalConfig, PortalState},
};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub horizon_url: String,
    pub session_cookie_secure: bool,
    pub session_ttl_seconds: u64,
    pub keystone_url: String,
    pub user_domain: String,
    pub auth_timeout_seconds: u64,
    pub defense: defense::Options,
}

/// Build the portal state from `args`.
///
/// # Errors
/// Returns an error if the defense thresholds are inconsistent or the Keystone
/// client cannot be built.
pub fn build_state(args: &Args) -> Result<PortalState> {
    let policy = args.defense.policy();
    policy.validate().context("Invalid defense policy")?;
    debug!("Defense policy: {:?}", policy);

    let auth_timeout = Duration::from_secs(args.auth_timeout_seconds);
    let keystone = KeystoneClient::new(&args.keystone_url, auth_timeout)
        .context("Could not configure Keystone client")?;
    info!("Validating passwords against {}", keystone.tokens_url());

    let config = PortalConfig::new()
        .with_horizon_url(args.horizon_url.clone())
        .with_user_domain(args.user_domain.clone())
        .with_session_cookie_secure(args.session_cookie_secure)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_auth_timeout(auth_timeout);

    Ok(PortalState::new(
        config,
        DefenseEngine::in_memory(Arc::new(policy)),
        Arc::new(keystone),
    ))
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let state = build_state(&args)?;
    portal::new(args.port, Arc::new(state)).await
}
