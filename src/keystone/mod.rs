//! Password validation against the identity provider.
//!
//! The portal is a gate, not an SSO bridge: a Keystone token is requested only
//! to prove the password is valid. Its value is never read, stored or logged;
//! only its presence is checked.

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::{future::Future, pin::Pin, time::Duration};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::APP_USER_AGENT;

const SUBJECT_TOKEN_HEADER: &str = "x-subject-token";

#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
    pub domain: String,
}

/// Why the identity provider did not confirm a password. Kept internal: callers
/// collapse every variant into one "invalid credentials" outcome.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    #[error("identity provider answered with status {0}")]
    Rejected(StatusCode),
    #[error("identity provider response carried no subject token")]
    MissingToken,
    #[error("identity provider did not answer in time")]
    Timeout,
    #[error("identity provider unreachable: {0}")]
    Transport(reqwest::Error),
}

pub trait PasswordAuthenticator: Send + Sync {
    fn validate_password<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuthenticationError>> + Send + 'a>>;
}

#[derive(Debug, Clone)]
pub struct KeystoneClient {
    client: Client,
    tokens_url: String,
}

impl KeystoneClient {
    /// Build a client for `keystone_url` (the `/v3` base).
    ///
    /// # Errors
    /// Returns an error if the URL is not http(s) or the HTTP client cannot be built.
    pub fn new(keystone_url: &str, timeout: Duration) -> Result<Self> {
        let base = keystone_url.trim_end_matches('/');
        let parsed =
            Url::parse(base).with_context(|| format!("Invalid Keystone URL: {keystone_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!(
                "Unsupported Keystone URL scheme: {}",
                parsed.scheme()
            ));
        }

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build Keystone HTTP client")?;

        Ok(Self {
            client,
            tokens_url: format!("{base}/auth/tokens"),
        })
    }

    #[must_use]
    pub fn tokens_url(&self) -> &str {
        &self.tokens_url
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn request_token(&self, credentials: &Credentials) -> Result<(), AuthenticationError> {
        let payload = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": credentials.username,
                            "domain": {"name": credentials.domain},
                            "password": credentials.password.expose_secret(),
                        }
                    }
                }
            }
        });

        let response = self
            .client
            .post(&self.tokens_url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    warn!("Keystone request timed out");
                    AuthenticationError::Timeout
                } else {
                    warn!("Keystone request failed: {err}");
                    AuthenticationError::Transport(err)
                }
            })?;

        let status = response.status();
        if status != StatusCode::CREATED {
            debug!("Keystone rejected credentials: {status}");
            return Err(AuthenticationError::Rejected(status));
        }

        let has_token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .is_some_and(|value| !value.is_empty());
        drop(response);

        if has_token {
            Ok(())
        } else {
            warn!("Keystone returned 201 without a subject token");
            Err(AuthenticationError::MissingToken)
        }
    }
}

impl PasswordAuthenticator for KeystoneClient {
    fn validate_password<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuthenticationError>> + Send + 'a>> {
        Box::pin(self.request_token(credentials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "alice".to_string(),
            password: SecretString::from("s3cret".to_string()),
            domain: "Default".to_string(),
        }
    }

    #[test]
    fn new_builds_tokens_url() -> Result<()> {
        let client = KeystoneClient::new("https://keystone.tld/v3/", Duration::from_secs(1))?;
        assert_eq!(client.tokens_url(), "https://keystone.tld/v3/auth/tokens");
        Ok(())
    }

    #[test]
    fn new_rejects_non_http_urls() {
        assert!(KeystoneClient::new("ftp://keystone.tld/v3", Duration::from_secs(1)).is_err());
        assert!(KeystoneClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn created_with_subject_token_is_success() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/auth/tokens"))
            .and(body_partial_json(json!({
                "auth": {
                    "identity": {
                        "methods": ["password"],
                        "password": {
                            "user": {
                                "name": "alice",
                                "domain": {"name": "Default"},
                                "password": "s3cret"
                            }
                        }
                    }
                }
            })))
            .respond_with(ResponseTemplate::new(201).insert_header("X-Subject-Token", "gAAAA"))
            .expect(1)
            .mount(&server)
            .await;

        let client = KeystoneClient::new(&format!("{}/v3", server.uri()), Duration::from_secs(5))?;
        let result = client.validate_password(&credentials()).await;
        assert!(result.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn created_without_token_is_rejected() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/auth/tokens"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let client = KeystoneClient::new(&format!("{}/v3", server.uri()), Duration::from_secs(5))?;
        let result = client.validate_password(&credentials()).await;
        assert!(matches!(result, Err(AuthenticationError::MissingToken)));
        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_is_rejected() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/auth/tokens"))
            .respond_with(ResponseTemplate::new(401).insert_header("X-Subject-Token", "ignored"))
            .mount(&server)
            .await;

        let client = KeystoneClient::new(&format!("{}/v3", server.uri()), Duration::from_secs(5))?;
        let result = client.validate_password(&credentials()).await;
        assert!(matches!(
            result,
            Err(AuthenticationError::Rejected(StatusCode::UNAUTHORIZED))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn ok_status_is_not_enough() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/auth/tokens"))
            .respond_with(ResponseTemplate::new(200).insert_header("X-Subject-Token", "gAAAA"))
            .mount(&server)
            .await;

        let client = KeystoneClient::new(&format!("{}/v3", server.uri()), Duration::from_secs(5))?;
        let result = client.validate_password(&credentials()).await;
        assert!(matches!(
            result,
            Err(AuthenticationError::Rejected(StatusCode::OK))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn slow_provider_times_out() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/auth/tokens"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("X-Subject-Token", "gAAAA")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client =
            KeystoneClient::new(&format!("{}/v3", server.uri()), Duration::from_millis(200))?;
        let result = client.validate_password(&credentials()).await;
        assert!(matches!(result, Err(AuthenticationError::Timeout)));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_provider_fails() -> Result<()> {
        let client = KeystoneClient::new("http://127.0.0.1:9/v3", Duration::from_secs(2))?;
        let result = client.validate_password(&credentials()).await;
        assert!(result.is_err());
        Ok(())
    }
}
