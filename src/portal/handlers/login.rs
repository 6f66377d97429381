use axum::{
    extract::{Extension, Form},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{commit_session, found, no_store};
use crate::{
    defense::{diagnostic_client_ip, ClientKey, DefenseStage, DefenseState},
    keystone::Credentials,
    portal::{
        error::LoginError,
        render::{self, LoginView},
        session::Session,
        PortalState,
    },
};

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    challenge_answer: Option<String>,
}

/// GET /login
pub async fn form(Extension(state): Extension<Arc<PortalState>>, headers: HeaderMap) -> Response {
    let (session, key) = match open_with_key(&state, &headers).await {
        Ok(opened) => opened,
        Err(response) => return response,
    };
    let defense = state.engine.state(&key);
    render_form(&state, session, StatusCode::OK, None, &defense, None).await
}

/// POST /login
pub async fn submit(
    Extension(state): Extension<Arc<PortalState>>,
    headers: HeaderMap,
    form: Option<Form<LoginForm>>,
) -> Response {
    let (mut session, key) = match open_with_key(&state, &headers).await {
        Ok(opened) => opened,
        Err(response) => return response,
    };
    let client_ip = diagnostic_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());

    let current = state.engine.state(&key);
    if current.locked_out {
        info!(client_ip = %client_ip, seconds_left = current.lockout_seconds_left, "login refused while locked out");
        let error = LoginError::LockedOut {
            seconds_left: current.lockout_seconds_left,
        };
        return reject(&state, session, error, &current, None).await;
    }

    let Some(Form(form)) = form else {
        return reject(&state, session, LoginError::MalformedRequest, &current, None).await;
    };
    let username = form.username.trim().to_string();
    if username.is_empty() || form.password.is_empty() {
        return reject(
            &state,
            session,
            LoginError::MalformedRequest,
            &current,
            Some(username.as_str()),
        )
        .await;
    }

    if current.captcha_required {
        state.challenges.ensure(&mut session.data);
        let answer = form.challenge_answer.as_deref().map_or("", str::trim);
        if !state.challenges.validate(&session.data, answer) {
            let after = state.engine.record_failure(&key);
            info!(client_ip = %client_ip, username = %username, failures = after.failures, "wrong challenge answer");
            return reject(
                &state,
                session,
                LoginError::InvalidChallengeAnswer,
                &after,
                Some(username.as_str()),
            )
            .await;
        }
        state.challenges.clear(&mut session.data);
    }

    let credentials = Credentials {
        username,
        password: SecretString::from(form.password),
        domain: state.config.user_domain().to_string(),
    };
    let outcome = tokio::time::timeout(
        state.config.auth_timeout(),
        state.authenticator.validate_password(&credentials),
    )
    .await;

    match outcome {
        Ok(Ok(())) => {
            login_success(&state, session, &key, credentials.username, &client_ip).await
        }
        Ok(Err(err)) => {
            debug!("Password validation failed: {err}");
            login_failure(&state, session, &key, &credentials.username, &client_ip).await
        }
        Err(_) => {
            warn!(client_ip = %client_ip, "Password validation timed out");
            login_failure(&state, session, &key, &credentials.username, &client_ip).await
        }
    }
}

async fn login_success(
    state: &PortalState,
    mut session: Session,
    key: &ClientKey,
    username: String,
    client_ip: &str,
) -> Response {
    state.engine.reset(key);
    state.challenges.clear(&mut session.data);
    if let Err(err) = session.rotate() {
        error!("Failed to rotate session token: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    info!(client_ip = %client_ip, username = %username, "login succeeded");
    session.data.authenticated = true;
    session.data.username = Some(username);

    let mut headers = HeaderMap::new();
    commit_session(state, session, &mut headers).await;
    found("/", headers)
}

async fn login_failure(
    state: &PortalState,
    session: Session,
    key: &ClientKey,
    username: &str,
    client_ip: &str,
) -> Response {
    let after = state.engine.record_failure(key);
    info!(client_ip = %client_ip, username = %username, failures = after.failures, "login failed");
    reject(
        state,
        session,
        LoginError::InvalidCredentials,
        &after,
        Some(username),
    )
    .await
}

async fn reject(
    state: &PortalState,
    session: Session,
    error: LoginError,
    defense: &DefenseState,
    username: Option<&str>,
) -> Response {
    let message = error.user_message(state.engine.policy().messages());
    render_form(state, session, error.status(), message, defense, username).await
}

/// Render the form for `defense`, keeping the session challenge in step with it.
async fn render_form(
    state: &PortalState,
    mut session: Session,
    status: StatusCode,
    error: Option<String>,
    defense: &DefenseState,
    username: Option<&str>,
) -> Response {
    let policy = state.engine.policy();

    let challenge = if defense.captcha_required {
        Some(state.challenges.ensure(&mut session.data))
    } else {
        state.challenges.clear(&mut session.data);
        None
    };
    let challenge_notice = (policy.stage(defense) == DefenseStage::ChallengeActive)
        .then(|| policy.messages().challenge_required.as_str());

    let page = render::login_page(&LoginView {
        error,
        notice: policy.message(defense),
        challenge_question: challenge
            .as_ref()
            .filter(|_| !defense.locked_out)
            .map(|record| record.question.as_str()),
        challenge_notice,
        username,
    });

    let mut headers = HeaderMap::new();
    no_store(&mut headers);
    // an anonymous visitor with a clean record has nothing worth storing yet
    if session.is_stored() || *defense != DefenseState::clean() {
        commit_session(state, session, &mut headers).await;
    }
    (status, headers, Html(page)).into_response()
}

async fn open_with_key(
    state: &PortalState,
    headers: &HeaderMap,
) -> Result<(Session, ClientKey), Response> {
    let mut session = state.sessions.open(headers).await.map_err(|err| {
        error!("Failed to open session: {err}");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })?;
    let key = state.resolver.resolve(&mut session.data).map_err(|err| {
        error!("Failed to resolve client key: {err}");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })?;
    Ok((session, key))
}
