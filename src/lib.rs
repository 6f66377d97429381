//! # Frontdoor (login gate for an OpenStack dashboard)
//!
//! `frontdoor` sits in front of a dashboard and only lets a browser through once
//! the identity provider (Keystone v3) has confirmed a username and password.
//! The token Keystone issues is never kept; the portal is a gate, not an SSO
//! bridge.
//!
//! ## Brute-force defense
//!
//! Every browser gets a random, server-side client key on its first visit.
//! Failed attempts for that key are counted in a sliding window and drive an
//! escalating response:
//!
//! - **Soft warnings** while only a few attempts have failed.
//! - **Challenge** (a small arithmetic question) once the count reaches the
//!   challenge threshold. A wrong answer counts as a failure.
//! - **Lockout** for a fixed duration once the block threshold is reached.
//!   Attempts during a lockout are refused without asking Keystone.
//!
//! A successful login clears the key's history. Logging out keeps the key, so
//! the count is not reset by cycling the session.

pub mod cli;
pub mod defense;
pub mod keystone;
pub mod portal;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
