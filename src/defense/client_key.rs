//! Stable per-browser identifier used to key all defense accounting.
//!
//! The key is minted once, stored in the browser's session, and reused for the
//! lifetime of that session. Logout does not touch it, so failure counts stay
//! continuous across a logout/login cycle. Network addresses are never used as
//! a key; behind NAT or a load balancer they are shared by unrelated clients.

use anyhow::{Context, Result};
use axum::http::HeaderMap;
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use std::fmt;

const CLIENT_KEY_BYTES: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    /// Mint a fresh key from OS randomness.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; CLIENT_KEY_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate client key")?;
        Ok(Self(
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes),
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a [`ClientKey`] is persisted between requests.
pub trait ClientKeySlot {
    fn client_key(&self) -> Option<&ClientKey>;
    fn set_client_key(&mut self, key: ClientKey);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ClientKeyResolver;

impl ClientKeyResolver {
    /// Return the key stored in `slot`, minting and storing one on first use.
    ///
    /// # Errors
    /// Returns an error if a new key cannot be generated.
    pub fn resolve<S: ClientKeySlot>(&self, slot: &mut S) -> Result<ClientKey> {
        if let Some(key) = slot.client_key() {
            return Ok(key.clone());
        }
        let key = ClientKey::generate()?;
        slot.set_client_key(key.clone());
        Ok(key)
    }
}

/// Best-effort client address for log lines. Never used for accounting.
#[must_use]
pub fn diagnostic_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
