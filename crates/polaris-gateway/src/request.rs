//! Request Builder: turns an [`OutgoingCall`] into a wire request.
//!
//! This part is pure. It never reads cookies itself; the caller passes in
//! the [`SessionCookies`] it just read, so every call sees the current
//! companions.

use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method};
use polaris_gateway_core::wire::{CSRF_HEADER, REFRESH_PATH};
use polaris_gateway_core::SessionCookies;
use url::Url;

use crate::call::{Body, OutgoingCall, QueryParams};
use crate::config::GatewayConfig;
use crate::error::GatewayError;

const JSON_CONTENT_TYPE: &str = "application/json";

/// A fully-built request, ready for a [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL including the query string.
    pub url: Url,
    /// Headers, including content type and CSRF token where applicable.
    pub headers: HeaderMap,
    /// Payload.
    pub body: Body,
}

/// Join `base` and `endpoint` and append the serialized query.
///
/// Parameters without a value are skipped. The query is joined with `&`
/// when the endpoint already carries one.
///
/// ```
/// use polaris_gateway::{build_url, QueryParams};
///
/// let mut query = QueryParams::new();
/// query.insert("page", Some("1".into()));
/// query.insert("search", None);
/// assert_eq!(
///     build_url("http://127.0.0.1:5000/api/v1", "/contents", &query),
///     "http://127.0.0.1:5000/api/v1/contents?page=1",
/// );
/// ```
#[must_use]
pub fn build_url(base: &str, endpoint: &str, query: &QueryParams) -> String {
    let mut url = format!("{base}{endpoint}");

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in query.present() {
        serializer.append_pair(key, value);
    }
    let query_string = serializer.finish();

    if !query_string.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&query_string);
    }
    url
}

/// Build the wire request for one call.
///
/// Non-GET calls carry the access companion as `X-CSRF-TOKEN`; calls aimed
/// at the refresh endpoint carry the refresh companion instead. JSON is the
/// default content type; multipart and untyped raw bodies get none.
///
/// # Errors
///
/// Returns a [`GatewayError`] of kind `Request` when the URL does not parse
/// or a caller-supplied header is not a valid HTTP header.
pub fn prepare(
    config: &GatewayConfig,
    cookies: &SessionCookies,
    call: &OutgoingCall,
) -> Result<WireRequest, GatewayError> {
    let url = parse_url(&build_url(&config.base_url, call.endpoint(), call.query()))?;

    let mut headers = HeaderMap::new();
    for (name, value) in call.headers() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| GatewayError::request(format!("invalid header name '{name}': {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| GatewayError::request(format!("invalid value for header '{name}': {err}")))?;
        headers.insert(name, value);
    }

    if !headers.contains_key(CONTENT_TYPE) {
        match call.payload() {
            Body::Multipart(_)
            | Body::Raw {
                content_type: None, ..
            } => {}
            Body::Raw {
                content_type: Some(content_type),
                ..
            } => {
                let value = HeaderValue::from_str(content_type).map_err(|err| {
                    GatewayError::request(format!("invalid content type '{content_type}': {err}"))
                })?;
                headers.insert(CONTENT_TYPE, value);
            }
            Body::Empty | Body::Json(_) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
            }
        }
    }

    if *call.method() != Method::GET {
        // The refresh route validates the refresh companion, not the access one.
        let token = if call.targets_refresh_endpoint() {
            cookies.refresh_csrf.as_deref()
        } else {
            cookies.access_csrf.as_deref()
        };
        attach_csrf(&mut headers, token);
    }

    Ok(WireRequest {
        method: call.method().clone(),
        url,
        headers,
        body: call.payload().clone(),
    })
}

/// Build the session refresh exchange.
///
/// `POST <base>/auth/refresh` with a JSON content type, an empty body and
/// the *refresh* companion as its CSRF header.
///
/// # Errors
///
/// Returns a [`GatewayError`] of kind `Request` if the base URL does not parse.
pub fn prepare_refresh(
    config: &GatewayConfig,
    cookies: &SessionCookies,
) -> Result<WireRequest, GatewayError> {
    let url = parse_url(&format!("{}{REFRESH_PATH}", config.base_url))?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    attach_csrf(&mut headers, cookies.refresh_csrf.as_deref());

    Ok(WireRequest {
        method: Method::POST,
        url,
        headers,
        body: Body::Empty,
    })
}

fn parse_url(raw: &str) -> Result<Url, GatewayError> {
    Url::parse(raw).map_err(|err| GatewayError::request(format!("invalid request URL '{raw}': {err}")))
}

/// Absent or unusable tokens are skipped; the backend rejects the call.
fn attach_csrf(headers: &mut HeaderMap, token: Option<&str>) {
    let Some(token) = token else {
        return;
    };
    match HeaderValue::from_str(token) {
        Ok(value) => {
            headers.insert(HeaderName::from_static("x-csrf-token"), value);
        }
        Err(_) => {
            tracing::debug!(
                target: "polaris::gateway",
                header = CSRF_HEADER,
                "csrf cookie is not a valid header value; sending without it"
            );
        }
    }
}
