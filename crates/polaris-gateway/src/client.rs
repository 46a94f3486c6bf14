//! The generic entry point every feature area calls.

use std::future::Future;
use std::sync::Arc;

use http::StatusCode;
use polaris_gateway_core::SessionCookies;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use url::Url;

use crate::call::OutgoingCall;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::refresh::{Recovery, RefreshCoordinator};
use crate::request::{prepare, prepare_refresh};
use crate::transport::{CookieSource, ReqwestTransport, Transport, TransportError, WireResponse};

/// Decoded success body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// 204 No Content.
    Empty,
    /// A JSON document.
    Json(Value),
}

/// A successful response as seen by the application.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    /// The 2xx status of the final attempt.
    pub status: StatusCode,
    /// Decoded body.
    pub payload: Payload,
}

/// Session-aware API client.
///
/// Cheap to clone; all clones share the transport, the cookie source and
/// the refresh state, so concurrent failures across clones still collapse
/// into a single refresh exchange.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: GatewayConfig,
    base_url: Option<Url>,
    transport: Arc<dyn Transport>,
    cookies: Option<Arc<dyn CookieSource>>,
    refresh: RefreshCoordinator,
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("config", &self.inner.config)
            .field("refresh", &self.inner.refresh)
            .finish_non_exhaustive()
    }
}

impl SessionClient {
    /// Client backed by `reqwest`; in browser context its cookie jar is
    /// also where the CSRF companions are read from.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(&config)?;
        let cookies = transport
            .jar()
            .map(|jar| jar as Arc<dyn CookieSource>);
        Ok(Self::with_transport(config, Arc::new(transport), cookies))
    }

    /// Client with injected collaborators.
    ///
    /// `cookies` is ignored in server context, which has no cookie store.
    #[must_use]
    pub fn with_transport(
        config: GatewayConfig,
        transport: Arc<dyn Transport>,
        cookies: Option<Arc<dyn CookieSource>>,
    ) -> Self {
        let base_url = Url::parse(&config.base_url).ok();
        Self {
            inner: Arc::new(Inner {
                config,
                base_url,
                transport,
                cookies,
                refresh: RefreshCoordinator::new(),
            }),
        }
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// Shared refresh state, for observation.
    #[must_use]
    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    /// Issue `call` and decode the JSON result into `T`.
    ///
    /// A 204 decodes `T` from `{}`, then from `null`, so `()`, `Value` and
    /// structs whose fields all have defaults work for empty responses.
    /// `{}` is tried first, so `Option<T>` with an all-default `T` yields
    /// `Some(T::default())`, not `None`.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] for network failures, non-2xx responses
    /// that could not be recovered, and bodies that do not decode into `T`.
    pub async fn request<T: DeserializeOwned>(&self, call: OutgoingCall) -> Result<T, GatewayError> {
        let response = self.send(call).await?;
        let status = response.status;
        match response.payload {
            Payload::Json(value) => {
                serde_json::from_value(value).map_err(|_| GatewayError::decode(status))
            }
            Payload::Empty => serde_json::from_value(Value::Object(Map::new()))
                .or_else(|_| serde_json::from_value(Value::Null))
                .map_err(|_| GatewayError::decode(status)),
        }
    }

    /// Issue `call`, recovering an expired session at most once.
    ///
    /// Server context has no session cookies to refresh, so its failures,
    /// 401 included, are surfaced as received.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] for network failures, non-2xx responses
    /// that could not be recovered, and 2xx bodies that are not JSON.
    pub async fn send(&self, call: OutgoingCall) -> Result<GatewayResponse, GatewayError> {
        let response = self.dispatch(&call).await?;
        if response.status.is_success() {
            return decode(response);
        }

        let recovery = if self.inner.config.context.has_cookie_store() {
            self.inner
                .refresh
                .recover(&call, response.status, || self.refresh_exchange())
                .await
        } else {
            tracing::debug!(
                target: "polaris::gateway",
                endpoint = call.endpoint(),
                status = response.status.as_u16(),
                "no cookie store in server context; failure surfaced without refresh"
            );
            Recovery::Surface
        };

        match recovery {
            Recovery::Retry(retry) => {
                let retried = self.dispatch(&retry).await?;
                if retried.status.is_success() {
                    decode(retried)
                } else {
                    Err(GatewayError::from_failure(retried.status, &retried.body))
                }
            }
            Recovery::Surface => Err(GatewayError::from_failure(response.status, &response.body)),
        }
    }

    async fn dispatch(&self, call: &OutgoingCall) -> Result<WireResponse, GatewayError> {
        let request = prepare(&self.inner.config, &self.session_cookies(), call)?;

        tracing::debug!(
            target: "polaris::gateway",
            method = %call.method(),
            endpoint = call.endpoint(),
            retry = call.is_retry(),
            "dispatching call"
        );

        let response = self.inner.transport.send(request).await.map_err(|err| {
            tracing::debug!(target: "polaris::gateway", endpoint = call.endpoint(), error = %err, "no response");
            GatewayError::network(err.to_string())
        })?;

        tracing::debug!(
            target: "polaris::gateway",
            endpoint = call.endpoint(),
            status = response.status.as_u16(),
            "response received"
        );
        Ok(response)
    }

    /// The refresh exchange as an owned future, so it can outlive the caller.
    fn refresh_exchange(&self) -> impl Future<Output = bool> + Send + 'static {
        let client = self.clone();
        async move { client.exchange_refresh().await }
    }

    async fn exchange_refresh(&self) -> bool {
        let request = match prepare_refresh(&self.inner.config, &self.session_cookies()) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(target: "polaris::gateway", error = %err, "cannot build refresh request");
                return false;
            }
        };
        match self.inner.transport.send(request).await {
            Ok(response) => response.status.is_success(),
            Err(err) => {
                tracing::warn!(target: "polaris::gateway", error = %err, "refresh exchange got no response");
                false
            }
        }
    }

    /// Read the CSRF companions fresh; they rotate on every refresh.
    fn session_cookies(&self) -> SessionCookies {
        if !self.inner.config.context.has_cookie_store() {
            tracing::debug!(target: "polaris::gateway", "no cookie store in server context; csrf companions skipped");
            return SessionCookies::default();
        }
        let (Some(source), Some(base_url)) = (&self.inner.cookies, &self.inner.base_url) else {
            return SessionCookies::default();
        };
        SessionCookies::from_header(source.cookie_header(base_url).as_deref())
    }
}

fn decode(response: WireResponse) -> Result<GatewayResponse, GatewayError> {
    let status = response.status;
    if status == StatusCode::NO_CONTENT {
        return Ok(GatewayResponse {
            status,
            payload: Payload::Empty,
        });
    }
    let value = serde_json::from_slice(&response.body).map_err(|_| GatewayError::decode(status))?;
    Ok(GatewayResponse {
        status,
        payload: Payload::Json(value),
    })
}
