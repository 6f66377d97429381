use axum::{
    http::{HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Json},
};
use serde::Serialize;

use crate::GIT_COMMIT_HASH;

const X_APP: HeaderName = HeaderName::from_static("x-app");

#[derive(Debug, Serialize)]
pub struct Health {
    name: &'static str,
    version: &'static str,
    build: &'static str,
}

/// `name:version:shortsha`, shortsha empty outside a git checkout.
fn app_tag() -> String {
    let short_hash = GIT_COMMIT_HASH.get(..7).filter(|_| GIT_COMMIT_HASH != "unknown");
    format!(
        "{}:{}:{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_hash.unwrap_or_default()
    )
}

/// Liveness check. Touches no portal state, so it stays cheap behind a load balancer.
pub async fn health() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    if let Ok(tag) = HeaderValue::from_str(&app_tag()) {
        headers.insert(X_APP, tag);
    }

    (
        headers,
        Json(Health {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            build: GIT_COMMIT_HASH,
        }),
    )
}
