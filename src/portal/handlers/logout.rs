use axum::{extract::Extension, http::HeaderMap, response::Response};
use std::sync::Arc;
use tracing::{error, info};

use super::{commit_session, found};
use crate::portal::PortalState;

/// Drop the signed-in flag but keep the session and its client key, so failure
/// accounting carries on across a logout/login cycle.
pub async fn logout(Extension(state): Extension<Arc<PortalState>>, headers: HeaderMap) -> Response {
    let mut response_headers = HeaderMap::new();

    if state.sessions().peek(&headers).await.is_some() {
        match state.sessions().open(&headers).await {
            Ok(mut session) => {
                if let Some(username) = session.data.username.take() {
                    info!(username, "logout");
                }
                session.data.authenticated = false;
                commit_session(&state, session, &mut response_headers).await;
            }
            Err(err) => error!("Failed to open session: {err}"),
        }
    }

    found("/login", response_headers)
}
