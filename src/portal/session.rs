//! Server-side browser sessions.
//!
//! The cookie carries a random 256-bit token; the store keeps only its SHA-256
//! hash, so a leaked store never yields a usable cookie. Unknown or expired
//! tokens silently start a fresh session.
//!
//! Expired entries are evicted by [`SessionStore::sweep`], which the server runs
//! on a timer, never on the request path.

use anyhow::{Context, Result};
use axum::http::{header::InvalidHeaderValue, HeaderMap, HeaderValue};
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::defense::{ChallengeRecord, ChallengeSlot, ClientKey, ClientKeySlot};

pub const SESSION_COOKIE_NAME: &str = "frontdoor_session";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionData {
    pub client_id: Option<ClientKey>,
    pub authenticated: bool,
    pub username: Option<String>,
    pub challenge: Option<ChallengeRecord>,
}

impl ClientKeySlot for SessionData {
    fn client_key(&self) -> Option<&ClientKey> {
        self.client_id.as_ref()
    }

    fn set_client_key(&mut self, key: ClientKey) {
        self.client_id = Some(key);
    }
}

impl ChallengeSlot for SessionData {
    fn challenge(&self) -> Option<&ChallengeRecord> {
        self.challenge.as_ref()
    }

    fn set_challenge(&mut self, challenge: ChallengeRecord) {
        self.challenge = Some(challenge);
    }

    fn take_challenge(&mut self) -> Option<ChallengeRecord> {
        self.challenge.take()
    }
}

/// A session loaded for one request. Changes are kept only after [`SessionStore::commit`].
#[derive(Debug)]
pub struct Session {
    token: String,
    replaced_token: Option<String>,
    stored: bool,
    pub data: SessionData,
}

impl Session {
    /// Move the session to a fresh token, keeping its data.
    ///
    /// # Errors
    /// Returns an error if a new token cannot be generated.
    pub fn rotate(&mut self) -> Result<()> {
        let fresh = generate_session_token()?;
        let previous = std::mem::replace(&mut self.token, fresh);
        self.replaced_token.get_or_insert(previous);
        Ok(())
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// True when this session was loaded from the store rather than just opened.
    #[must_use]
    pub fn is_stored(&self) -> bool {
        self.stored
    }
}

struct SessionEntry {
    data: SessionData,
    touched_at: Instant,
}

pub struct SessionStore {
    ttl: Duration,
    cookie_secure: bool,
    sessions: Mutex<HashMap<Vec<u8>, SessionEntry>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration, cookie_secure: bool) -> Self {
        Self {
            ttl,
            cookie_secure,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Load the session named by the request cookie without creating one.
    pub async fn peek(&self, headers: &HeaderMap) -> Option<SessionData> {
        let token = extract_session_token(headers)?;
        let sessions = self.sessions.lock().await;
        sessions
            .get(&hash_session_token(&token))
            .filter(|entry| entry.touched_at.elapsed() < self.ttl)
            .map(|entry| entry.data.clone())
    }

    /// Load the session named by the request cookie, or start a new one.
    ///
    /// # Errors
    /// Returns an error if a new session token cannot be generated.
    pub async fn open(&self, headers: &HeaderMap) -> Result<Session> {
        if let Some(token) = extract_session_token(headers) {
            if let Some(data) = self.peek(headers).await {
                return Ok(Session {
                    token,
                    replaced_token: None,
                    stored: true,
                    data,
                });
            }
        }
        Ok(Session {
            token: generate_session_token()?,
            replaced_token: None,
            stored: false,
            data: SessionData::default(),
        })
    }

    /// Persist `session` and return the cookie to send back.
    pub async fn commit(&self, session: Session) -> Result<HeaderValue, InvalidHeaderValue> {
        let cookie = self.session_cookie(&session.token);
        let mut sessions = self.sessions.lock().await;
        if let Some(previous) = &session.replaced_token {
            sessions.remove(&hash_session_token(previous));
        }
        sessions.insert(
            hash_session_token(&session.token),
            SessionEntry {
                data: session.data,
                touched_at: Instant::now(),
            },
        );
        cookie
    }

    /// Evict sessions idle past the TTL and return how many remain.
    pub async fn sweep(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, entry| entry.touched_at.elapsed() < self.ttl);
        sessions.len()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Build a secure `HttpOnly` cookie for the session token.
    fn session_cookie(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        let ttl_seconds = self.ttl.as_secs();
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(axum::http::header::COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}
