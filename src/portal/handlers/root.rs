use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;

use super::found;
use crate::portal::{render, PortalState};

/// Landing page for signed-in browsers, login redirect for everyone else.
pub async fn root(Extension(state): Extension<Arc<PortalState>>, headers: HeaderMap) -> Response {
    let session = state.sessions().peek(&headers).await;
    match session {
        Some(data) if data.authenticated => {
            let username = data.username.unwrap_or_default();
            Html(render::home_page(&username, state.config().horizon_url())).into_response()
        }
        _ => found("/login", HeaderMap::new()),
    }
}
