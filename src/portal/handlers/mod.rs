pub mod health;
pub mod login;
pub mod logout;
pub mod root;

use axum::{
    http::{
        header::{CACHE_CONTROL, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use tracing::error;

use super::{session::Session, PortalState};

/// Persist the session and attach its cookie to `headers`.
///
/// A failed save is logged and the response still goes out; the client simply
/// starts over with a new session on its next request.
pub(super) async fn commit_session(state: &PortalState, session: Session, headers: &mut HeaderMap) {
    match state.sessions().commit(session).await {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build session cookie: {err}"),
    }
}

pub(super) fn no_store(headers: &mut HeaderMap) {
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
}

/// `302 Found` to a fixed local path.
pub(super) fn found(location: &'static str, mut headers: HeaderMap) -> Response {
    headers.insert(LOCATION, HeaderValue::from_static(location));
    (StatusCode::FOUND, headers).into_response()
}
