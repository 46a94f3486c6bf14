//! In-process fake backend for the gateway integration tests.
//!
//! An axum router plays the CMS backend; [`RouterTransport`] feeds it the
//! gateway's wire requests directly, recording each one as a [`Hit`].
//! Cookies live in a [`MemoryCookies`] that the backend rotates on login
//! and refresh, the way `Set-Cookie` would.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use http::{Method, StatusCode, Uri};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;

use polaris_gateway::{
    Body, CookieSource, ExecutionContext, GatewayConfig, MemoryCookies, SessionClient, Transport,
    TransportError, WireRequest, WireResponse,
};

pub const BASE_URL: &str = "http://api.test/api/v1";
pub const ROTATED_COOKIES: &str = "csrf_access_token=rotated-access; csrf_refresh_token=rotated-refresh";

/// One request as the backend received it.
#[derive(Debug, Clone)]
pub struct Hit {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub csrf: Option<String>,
    pub content_type: Option<String>,
}

impl Hit {
    fn record(request: &WireRequest) -> Self {
        let header = |name: &str| {
            request
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        Self {
            method: request.method.clone(),
            path: request.url.path().to_string(),
            query: request.url.query().map(str::to_string),
            csrf: header("x-csrf-token"),
            content_type: header("content-type"),
        }
    }
}

/// Backend session state and knobs.
pub struct Backend {
    pub cookies: Arc<MemoryCookies>,
    session_valid: AtomicBool,
    refresh_accepts: AtomicBool,
    expiry_sticks: AtomicBool,
    refresh_delay: Duration,
    refreshes_served: AtomicUsize,
}

impl Backend {
    fn new(cookies: &str) -> Self {
        Self {
            cookies: Arc::new(MemoryCookies::new(cookies)),
            session_valid: AtomicBool::new(true),
            refresh_accepts: AtomicBool::new(true),
            expiry_sticks: AtomicBool::new(false),
            refresh_delay: Duration::from_millis(100),
            refreshes_served: AtomicUsize::new(0),
        }
    }

    /// The access session is gone; protected routes answer 401.
    pub fn expire_session(&self) {
        self.session_valid.store(false, Ordering::SeqCst);
    }

    /// Whether `/auth/refresh` succeeds.
    pub fn accept_refresh(&self, accept: bool) {
        self.refresh_accepts.store(accept, Ordering::SeqCst);
    }

    /// A successful refresh does not revive the session.
    pub fn keep_expired_after_refresh(&self) {
        self.expiry_sticks.store(true, Ordering::SeqCst);
    }

    pub fn refreshes_served(&self) -> usize {
        self.refreshes_served.load(Ordering::SeqCst)
    }

    fn start_session(&self) {
        self.session_valid.store(true, Ordering::SeqCst);
        self.cookies.set(ROTATED_COOKIES);
    }
}

pub fn user_json() -> Value {
    json!({
        "id": 1,
        "username": "admin",
        "email": "admin@polaris.test",
        "role": "admin",
        "is_active": true,
        "created_at": "2026-01-01T00:00:00",
        "last_login": null,
        "content_count": 12
    })
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": message }))).into_response()
}

async fn refresh(State(backend): State<Arc<Backend>>) -> Response {
    tokio::time::sleep(backend.refresh_delay).await;
    backend.refreshes_served.fetch_add(1, Ordering::SeqCst);
    if !backend.refresh_accepts.load(Ordering::SeqCst) {
        return unauthorized("Token has expired");
    }
    backend.cookies.set(ROTATED_COOKIES);
    if !backend.expiry_sticks.load(Ordering::SeqCst) {
        backend.session_valid.store(true, Ordering::SeqCst);
    }
    Json(json!({ "user": user_json() })).into_response()
}

async fn login(State(backend): State<Arc<Backend>>, Json(form): Json<Value>) -> Response {
    if form["username"] == "admin" && form["password"] == "secret" {
        backend.start_session();
        Json(json!({ "user": user_json() })).into_response()
    } else {
        unauthorized("Invalid credentials")
    }
}

async fn protected(State(backend): State<Arc<Backend>>, method: Method, uri: Uri) -> Response {
    if !backend.session_valid.load(Ordering::SeqCst) {
        return unauthorized("Token has expired");
    }
    let path = uri.path().trim_start_matches("/api/v1");
    match path {
        "/contents" => Json(json!({
            "contents": [{ "id": 7, "title": "Hello" }],
            "pagination": { "page": 2, "pages": 3, "total": 25 }
        }))
        .into_response(),
        "/auth/profile" => Json(user_json()).into_response(),
        "/empty" => StatusCode::NO_CONTENT.into_response(),
        "/broken" => (StatusCode::OK, "not json").into_response(),
        "/validation" => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "Validation failed",
                "errors": { "title": ["Title is required"], "slug": "Slug already taken" }
            })),
        )
            .into_response(),
        "/upstream" => (StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").into_response(),
        "/crash" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "Internal server error" })),
        )
            .into_response(),
        _ => Json(json!({ "ok": true, "method": method.as_str(), "path": path })).into_response(),
    }
}

fn router(backend: Arc<Backend>) -> Router {
    Router::new()
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/auth/login", post(login))
        .fallback(protected)
        .with_state(backend)
}

/// [`Transport`] that hands requests straight to an axum router.
pub struct RouterTransport {
    router: Router,
    hits: Mutex<Vec<Hit>>,
    offline: AtomicBool,
    offline_after_refresh: AtomicBool,
}

impl RouterTransport {
    fn new(router: Router) -> Self {
        Self {
            router,
            hits: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
            offline_after_refresh: AtomicBool::new(false),
        }
    }

    /// Every later request fails without a response.
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    /// The connection drops right after the next refresh response.
    pub fn go_offline_after_refresh(&self) {
        self.offline_after_refresh.store(true, Ordering::SeqCst);
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().clone()
    }
}

#[async_trait]
impl Transport for RouterTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        self.hits.lock().push(Hit::record(&request));
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::new("connection refused"));
        }

        let body = match request.body {
            Body::Empty => axum::body::Body::empty(),
            Body::Json(value) => axum::body::Body::from(serde_json::to_vec(&value).unwrap()),
            Body::Raw { bytes, .. } => axum::body::Body::from(bytes),
            Body::Multipart(_) => {
                return Err(TransportError::new("multipart is not supported in-process"))
            }
        };

        let is_refresh = request.url.path().ends_with("/auth/refresh");
        let mut http_request = http::Request::builder()
            .method(request.method)
            .uri(request.url.as_str())
            .body(body)
            .unwrap();
        *http_request.headers_mut() = request.headers;

        let response = self
            .router
            .clone()
            .oneshot(http_request)
            .await
            .unwrap_or_else(|never| match never {});
        let (parts, body) = response.into_parts();
        let body = body.collect().await.unwrap().to_bytes();

        if is_refresh && self.offline_after_refresh.load(Ordering::SeqCst) {
            self.offline.store(true, Ordering::SeqCst);
        }

        Ok(WireResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

/// A client wired to a fresh fake backend.
pub struct Harness {
    pub client: SessionClient,
    pub backend: Arc<Backend>,
    pub transport: Arc<RouterTransport>,
}

impl Harness {
    pub fn browser(cookies: &str) -> Self {
        Self::new(ExecutionContext::Browser, cookies)
    }

    pub fn server(cookies: &str) -> Self {
        Self::new(ExecutionContext::Server, cookies)
    }

    fn new(context: ExecutionContext, cookies: &str) -> Self {
        let backend = Arc::new(Backend::new(cookies));
        let transport = Arc::new(RouterTransport::new(router(Arc::clone(&backend))));
        let config = GatewayConfig::default()
            .with_base_url(BASE_URL)
            .unwrap()
            .with_context(context);
        let client = SessionClient::with_transport(
            config,
            Arc::clone(&transport) as Arc<dyn Transport>,
            Some(Arc::clone(&backend.cookies) as Arc<dyn CookieSource>),
        );
        Self {
            client,
            backend,
            transport,
        }
    }

    /// Requests that reached `endpoint` (relative to the base URL).
    pub fn hits_to(&self, endpoint: &str) -> Vec<Hit> {
        let path = format!("/api/v1{endpoint}");
        self.transport
            .hits()
            .into_iter()
            .filter(|hit| hit.path == path)
            .collect()
    }

    pub fn refresh_hits(&self) -> usize {
        self.hits_to("/auth/refresh").len()
    }
}
