use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::TimeDelta;
use frontdoor::{
    defense::{DefenseEngine, DefensePolicy, FailureWindow, LockoutStore, ManualClock},
    keystone::{AuthenticationError, Credentials, PasswordAuthenticator},
    portal::{router, PortalConfig, PortalState, SESSION_COOKIE_NAME},
};
use secrecy::ExposeSecret;
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tower::ServiceExt;

const PASSWORD: &str = "correct-horse";

struct StubAuthenticator {
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl StubAuthenticator {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Some(delay),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PasswordAuthenticator for StubAuthenticator {
    fn validate_password<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuthenticationError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if credentials.username == "alice" && credentials.password.expose_secret() == PASSWORD
            {
                Ok(())
            } else {
                Err(AuthenticationError::Rejected(reqwest::StatusCode::UNAUTHORIZED))
            }
        })
    }
}

struct Portal {
    app: Router,
    clock: Arc<ManualClock>,
    authenticator: Arc<StubAuthenticator>,
    cookie: Option<String>,
}

struct Page {
    status: StatusCode,
    location: Option<String>,
    body: String,
}

impl Portal {
    fn new() -> Self {
        Self::with(StubAuthenticator::new(), PortalConfig::new())
    }

    fn with(authenticator: StubAuthenticator, config: PortalConfig) -> Self {
        let clock = Arc::new(ManualClock::default());
        let engine = DefenseEngine::new(
            Arc::new(DefensePolicy::default()),
            Arc::new(FailureWindow::new()),
            Arc::new(LockoutStore::new()),
            clock.clone(),
        );
        let authenticator = Arc::new(authenticator);
        let state = PortalState::new(
            config.with_session_cookie_secure(false),
            engine,
            authenticator.clone(),
        );
        Self {
            app: router(Arc::new(state)),
            clock,
            authenticator,
            cookie: None,
        }
    }

    async fn send(&mut self, mut request: Request<Body>) -> Page {
        if let Some(cookie) = &self.cookie {
            if let Ok(value) = cookie.parse() {
                request.headers_mut().insert(header::COOKIE, value);
            }
        }

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
        {
            self.cookie = set_cookie.split(';').next().map(ToString::to_string);
        }
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        Page {
            status,
            location,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    async fn get(&mut self, uri: &str) -> Page {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post(&mut self, uri: &str, form: &str) -> Page {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn login(&mut self, password: &str, answer: Option<u32>) -> Page {
        let mut form = format!("username=alice&password={password}");
        if let Some(answer) = answer {
            form.push_str(&format!("&challenge_answer={answer}"));
        }
        self.post("/login", &form).await
    }
}

/// Solve the "What is a + b?" question rendered in `body`.
fn solve(body: &str) -> Option<u32> {
    let start = body.find("What is ")? + "What is ".len();
    let rest = &body[start..];
    let end = rest.find('?')?;
    let (a, b) = rest[..end].split_once(" + ")?;
    Some(a.trim().parse::<u32>().ok()? + b.trim().parse::<u32>().ok()?)
}

fn question(body: &str) -> Option<&str> {
    let start = body.find("What is ")?;
    let end = start + body[start..].find('?')?;
    Some(&body[start..=end])
}

#[tokio::test]
async fn escalation_follows_default_policy() {
    let mut portal = Portal::new();

    let page = portal.get("/login").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(!page.body.contains("alert"));

    let page = portal.login("wrong", None).await;
    assert!(portal
        .cookie
        .as_deref()
        .is_some_and(|cookie| cookie.starts_with(SESSION_COOKIE_NAME)));
    assert_eq!(page.status, StatusCode::UNAUTHORIZED);
    assert!(page.body.contains("Invalid credentials."));
    assert!(page.body.contains("You have 2 more attempt(s)."));

    let page = portal.login("wrong", None).await;
    assert!(page.body.contains("You have 1 more attempt(s)."));

    let page = portal.login("wrong", None).await;
    assert!(page.body.contains("Invalid credentials."));
    assert!(!page.body.contains("more attempt"));
    assert!(!page.body.contains("challenge_answer"));

    let page = portal.login("wrong", None).await;
    assert!(page.body.contains("The next attempt requires a challenge."));
    assert!(!page.body.contains("challenge_answer"));

    let page = portal.login("wrong", None).await;
    assert!(page
        .body
        .contains("2 more incorrect attempt(s) and you will be temporarily blocked."));
    assert!(page.body.contains("A challenge is now required."));
    let answer = solve(&page.body);
    assert!(answer.is_some());

    let page = portal.login("wrong", answer).await;
    assert_eq!(page.status, StatusCode::UNAUTHORIZED);
    assert!(page
        .body
        .contains("1 more incorrect attempt(s) and you will be temporarily blocked."));
    let answer = solve(&page.body);

    let page = portal.login("wrong", answer).await;
    assert_eq!(page.status, StatusCode::UNAUTHORIZED);
    assert!(page.body.contains("Too many attempts. Retry in 300s."));
    assert!(!page.body.contains("challenge_answer"));
    assert_eq!(portal.authenticator.calls(), 7);

    let page = portal.login(PASSWORD, None).await;
    assert_eq!(page.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(page.body.contains("Too many attempts."));
    assert_eq!(portal.authenticator.calls(), 7);

    portal.clock.advance(TimeDelta::seconds(120));
    let page = portal.get("/login").await;
    assert!(page.body.contains("Retry in 180s."));
}

#[tokio::test]
async fn missing_fields_are_malformed() {
    let mut portal = Portal::new();

    let page = portal.post("/login", "username=alice").await;
    assert_eq!(page.status, StatusCode::BAD_REQUEST);
    assert!(page.body.contains("Missing username/password."));

    let page = portal.post("/login", "username=%20%20&password=x").await;
    assert_eq!(page.status, StatusCode::BAD_REQUEST);

    let page = portal.get("/login").await;
    assert!(!page.body.contains("more attempt"));
    assert_eq!(portal.authenticator.calls(), 0);
}

#[tokio::test]
async fn wrong_challenge_answer_counts_and_keeps_question() {
    let mut portal = Portal::new();
    for _ in 0..5 {
        portal.login("wrong", None).await;
    }

    let page = portal.get("/login").await;
    let first = question(&page.body).map(ToString::to_string);
    assert!(first.is_some());
    let page = portal.get("/login").await;
    assert_eq!(question(&page.body).map(ToString::to_string), first);

    let calls = portal.authenticator.calls();
    let wrong = solve(&page.body).map(|answer| answer + 100);
    let page = portal.login(PASSWORD, wrong).await;
    assert_eq!(page.status, StatusCode::UNAUTHORIZED);
    assert!(page.body.contains("Invalid credentials."));
    assert!(page
        .body
        .contains("1 more incorrect attempt(s) and you will be temporarily blocked."));
    assert_eq!(question(&page.body).map(ToString::to_string), first);
    assert_eq!(portal.authenticator.calls(), calls);

    let page = portal.login(PASSWORD, None).await;
    assert_eq!(page.status, StatusCode::UNAUTHORIZED);
    assert!(page.body.contains("Too many attempts."));
}

#[tokio::test]
async fn success_resets_and_opens_landing_page() {
    let mut portal = Portal::new();
    for _ in 0..4 {
        portal.login("wrong", None).await;
    }
    let before = portal.cookie.clone();

    let page = portal.login(PASSWORD, None).await;
    assert_eq!(page.status, StatusCode::FOUND);
    assert_eq!(page.location.as_deref(), Some("/"));
    assert_ne!(portal.cookie, before);

    let page = portal.get("/").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Welcome, alice"));
    assert!(page.body.contains("https://opole.minizon.net/"));

    let page = portal.post("/logout", "").await;
    assert_eq!(page.status, StatusCode::FOUND);
    assert_eq!(page.location.as_deref(), Some("/login"));

    let page = portal.get("/").await;
    assert_eq!(page.status, StatusCode::FOUND);
    assert_eq!(page.location.as_deref(), Some("/login"));

    let page = portal.login("wrong", None).await;
    assert!(page.body.contains("You have 2 more attempt(s)."));
}

#[tokio::test]
async fn logout_does_not_reset_failures() {
    let mut portal = Portal::new();
    for _ in 0..3 {
        portal.login("wrong", None).await;
    }

    let page = portal.post("/logout", "").await;
    assert_eq!(page.status, StatusCode::FOUND);

    let page = portal.login("wrong", None).await;
    assert!(page.body.contains("The next attempt requires a challenge."));
}

#[tokio::test]
async fn fresh_browser_starts_clean() {
    let mut portal = Portal::new();
    for _ in 0..4 {
        portal.login("wrong", None).await;
    }

    portal.cookie = None;
    let page = portal.login("wrong", None).await;
    assert!(page.body.contains("You have 2 more attempt(s)."));
}

#[tokio::test]
async fn slow_identity_provider_counts_as_failure() {
    let config = PortalConfig::new().with_auth_timeout(Duration::from_millis(50));
    let mut portal = Portal::with(StubAuthenticator::slow(Duration::from_secs(2)), config);

    let page = portal.login(PASSWORD, None).await;
    assert_eq!(page.status, StatusCode::UNAUTHORIZED);
    assert!(page.body.contains("Invalid credentials."));
    assert!(page.body.contains("You have 2 more attempt(s)."));
}

#[tokio::test]
async fn login_page_is_not_cached_and_carries_security_headers() {
    let portal = Portal::new();
    let response = portal
        .app
        .clone()
        .oneshot(Request::builder().uri("/login").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(
        headers.get(header::CACHE_CONTROL).and_then(|v| v.to_str().ok()),
        Some("no-store")
    );
    assert_eq!(
        headers
            .get(header::X_CONTENT_TYPE_OPTIONS)
            .and_then(|v| v.to_str().ok()),
        Some("nosniff")
    );
    assert_eq!(
        headers.get(header::X_FRAME_OPTIONS).and_then(|v| v.to_str().ok()),
        Some("DENY")
    );
    assert!(headers.get("x-request-id").is_some());
}

#[tokio::test]
async fn anonymous_login_page_sets_no_cookie() {
    let mut portal = Portal::new();
    for _ in 0..20 {
        let page = portal.get("/login").await;
        assert_eq!(page.status, StatusCode::OK);
        assert!(portal.cookie.is_none());
    }

    let response = portal
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("username=alice&password=wrong"))
                .unwrap(),
        )
        .await
        .unwrap();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(cookie.starts_with(SESSION_COOKIE_NAME));
    assert!(cookie.contains("HttpOnly"));
    assert!(!cookie.contains("Secure"));
}

#[tokio::test]
async fn correct_answer_and_password_pass_the_challenge() {
    let mut portal = Portal::new();
    for _ in 0..4 {
        portal.login("wrong", None).await;
    }
    let page = portal.login("wrong", None).await;
    assert!(page.body.contains("challenge_answer"));
    let answer = solve(&page.body);
    assert!(answer.is_some());

    let page = portal.login(PASSWORD, answer).await;
    assert_eq!(page.status, StatusCode::FOUND);
    assert_eq!(page.location.as_deref(), Some("/"));

    let page = portal.get("/login").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(!page.body.contains("challenge_answer"));
    assert!(!page.body.contains("alert"));

    let page = portal.login("wrong", None).await;
    assert_eq!(page.status, StatusCode::UNAUTHORIZED);
    assert!(page.body.contains("You have 2 more attempt(s)."));
    assert!(!page.body.contains("challenge_answer"));
}

#[tokio::test]
async fn health_reports_build() {
    let mut portal = Portal::new();
    let page = portal.get("/health").await;
    assert_eq!(page.status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&page.body).unwrap();
    assert_eq!(json["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
