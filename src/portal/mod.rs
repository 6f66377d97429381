//! HTTP surface: login form, session handling, and server wiring.

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{
        header::{REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
        HeaderName, HeaderValue, Request,
    },
    routing::{get, post},
    Router,
};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, info_span, Span};
use ulid::Ulid;

use crate::{
    defense::{ChallengeManager, ClientKeyResolver, DefenseEngine},
    keystone::PasswordAuthenticator,
};

pub mod error;
pub mod handlers;
pub mod render;
pub mod session;

pub use error::LoginError;
pub use session::{SessionData, SessionStore, SESSION_COOKIE_NAME};

const DEFAULT_HORIZON_URL: &str = "https://opole.minizon.net/";
const DEFAULT_USER_DOMAIN: &str = "Default";
const DEFAULT_SESSION_TTL_SECONDS: u64 = 12 * 60 * 60;
const DEFAULT_AUTH_TIMEOUT_SECONDS: u64 = 10;
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct PortalConfig {
    horizon_url: String,
    user_domain: String,
    session_cookie_secure: bool,
    session_ttl_seconds: u64,
    auth_timeout: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            horizon_url: DEFAULT_HORIZON_URL.to_string(),
            user_domain: DEFAULT_USER_DOMAIN.to_string(),
            session_cookie_secure: true,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            auth_timeout: Duration::from_secs(DEFAULT_AUTH_TIMEOUT_SECONDS),
        }
    }
}

impl PortalConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_horizon_url(mut self, url: String) -> Self {
        self.horizon_url = url;
        self
    }

    #[must_use]
    pub fn with_user_domain(mut self, domain: String) -> Self {
        self.user_domain = domain;
        self
    }

    #[must_use]
    pub fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    #[must_use]
    pub fn horizon_url(&self) -> &str {
        &self.horizon_url
    }

    #[must_use]
    pub fn user_domain(&self) -> &str {
        &self.user_domain
    }

    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn auth_timeout(&self) -> Duration {
        self.auth_timeout
    }
}

/// Everything a request handler needs, built once at startup.
pub struct PortalState {
    config: PortalConfig,
    engine: DefenseEngine,
    challenges: ChallengeManager,
    resolver: ClientKeyResolver,
    authenticator: Arc<dyn PasswordAuthenticator>,
    sessions: SessionStore,
}

impl PortalState {
    #[must_use]
    pub fn new(
        config: PortalConfig,
        engine: DefenseEngine,
        authenticator: Arc<dyn PasswordAuthenticator>,
    ) -> Self {
        let sessions = SessionStore::new(config.session_ttl(), config.session_cookie_secure());
        Self {
            config,
            engine,
            challenges: ChallengeManager::new(),
            resolver: ClientKeyResolver,
            authenticator,
            sessions,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    #[must_use]
    pub fn engine(&self) -> &DefenseEngine {
        &self.engine
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

/// Build the router with every route and layer, ready to serve.
pub fn router(state: Arc<PortalState>) -> Router {
    Router::new()
        .route("/", get(handlers::root::root))
        .route(
            "/login",
            get(handlers::login::form).post(handlers::login::submit),
        )
        .route("/logout", post(handlers::logout::logout))
        .route("/health", get(handlers::health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(SetResponseHeaderLayer::overriding(
                    X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    REFERRER_POLICY,
                    HeaderValue::from_static("no-referrer"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("permissions-policy"),
                    HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
                ))
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn new(port: u16, state: Arc<PortalState>) -> Result<()> {
    let sweeper = tokio::spawn(sweep_sessions(Arc::clone(&state)));
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();

    Ok(())
}

async fn sweep_sessions(state: Arc<PortalState>) {
    let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let remaining = state.sessions().sweep().await;
        debug!(remaining, "session sweep");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
