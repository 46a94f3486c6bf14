//! Transport seam: the only place that touches the network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use parking_lot::RwLock;
use reqwest::cookie::{CookieStore, Jar};
use url::Url;

use crate::call::{Body, MultipartBody, Part};
use crate::config::GatewayConfig;
use crate::request::WireRequest;

/// No response was obtained: connection, DNS, TLS or timeout failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(String);

impl TransportError {
    /// Wrap a transport failure description.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A received response, fully buffered.
#[derive(Debug, Clone, PartialEq)]
pub struct WireResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

/// Sends one wire request and returns whatever response came back.
///
/// Any received status, including 4xx/5xx, is `Ok`. `Err` is reserved for
/// "no response at all", which never triggers session recovery.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request.
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError>;
}

/// The readable cookie string for a URL, as client code would see it.
///
/// Implementations return `name=value; name2=value2`, or `None` when no
/// cookie is stored. Values are authentication companions and must never be
/// logged.
pub trait CookieSource: Send + Sync {
    /// Cookie string applicable to `url`.
    fn cookie_header(&self, url: &Url) -> Option<String>;
}

impl CookieSource for Jar {
    fn cookie_header(&self, url: &Url) -> Option<String> {
        self.cookies(url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }
}

/// A cookie string held in memory and replaced wholesale.
///
/// Useful when the cookie store lives outside the gateway's own jar, e.g. an
/// embedding that owns the browser cookies and hands the string over.
#[derive(Debug, Default)]
pub struct MemoryCookies(RwLock<Option<String>>);

impl MemoryCookies {
    /// Start with the given cookie string.
    pub fn new(cookie_header: impl Into<String>) -> Self {
        Self(RwLock::new(Some(cookie_header.into())))
    }

    /// Replace the stored cookie string.
    pub fn set(&self, cookie_header: impl Into<String>) {
        *self.0.write() = Some(cookie_header.into());
    }

    /// Forget all cookies.
    pub fn clear(&self) {
        *self.0.write() = None;
    }
}

impl CookieSource for MemoryCookies {
    fn cookie_header(&self, _url: &Url) -> Option<String> {
        self.0.read().clone()
    }
}

/// [`Transport`] backed by `reqwest`.
///
/// In browser context the client owns a cookie jar: cookies set by the
/// backend are stored and sent back on every later request, which is the
/// credentials-included behavior the session API relies on.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    jar: Option<Arc<Jar>>,
}

impl ReqwestTransport {
    /// Build a transport for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &GatewayConfig) -> Result<Self, TransportError> {
        let jar = config
            .context
            .has_cookie_store()
            .then(|| Arc::new(Jar::default()));

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .connect_timeout(Duration::from_secs(10));

        if let Some(jar) = &jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }
        if let Some(timeout_ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder
            .build()
            .map_err(|err| TransportError::new(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, jar })
    }

    /// The cookie jar, when the context has one.
    #[must_use]
    pub fn jar(&self) -> Option<Arc<Jar>> {
        self.jar.clone()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        builder = match request.body {
            Body::Empty => builder,
            Body::Json(value) => {
                let bytes = serde_json::to_vec(&value)
                    .map_err(|err| TransportError::new(format!("failed to encode body: {err}")))?;
                builder.body(bytes)
            }
            Body::Raw { bytes, .. } => builder.body(bytes),
            Body::Multipart(form) => builder.multipart(multipart_form(form)?),
        };

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::new(err.to_string()))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::new(format!("response body error: {err}")))?;

        Ok(WireResponse {
            status,
            headers,
            body,
        })
    }
}

fn multipart_form(body: MultipartBody) -> Result<reqwest::multipart::Form, TransportError> {
    let mut form = reqwest::multipart::Form::new();
    for part in body.parts() {
        form = match part {
            Part::Text { name, value } => form.text(name.clone(), value.clone()),
            Part::File {
                name,
                file_name,
                mime,
                bytes,
            } => {
                let mut file = reqwest::multipart::Part::bytes(bytes.to_vec())
                    .file_name(file_name.clone());
                if let Some(mime) = mime {
                    file = file
                        .mime_str(mime)
                        .map_err(|err| TransportError::new(format!("invalid MIME type '{mime}': {err}")))?;
                }
                form.part(name.clone(), file)
            }
        };
    }
    Ok(form)
}
