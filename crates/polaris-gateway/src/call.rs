//! The logical call a feature area hands to the gateway.

use bytes::Bytes;
use http::Method;
use polaris_gateway_core::wire::REFRESH_PATH;
use serde::Serialize;
use serde_json::Value;

use crate::error::GatewayError;

/// Insertion-ordered query parameters with unique keys.
///
/// A `None` value is kept on the call but never serialized, so
/// `{page: 1, search: None}` produces `page=1` only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, Option<String>)>);

impl QueryParams {
    /// Empty parameter list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Set `key`, replacing an existing value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Value for `key`; `Some(None)` for an explicitly omitted parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.0
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_deref())
    }

    /// Parameters that will be serialized, in insertion order.
    pub fn present(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter_map(|(key, value)| value.as_deref().map(|value| (key.as_str(), value)))
    }

    /// Number of parameters, including omitted ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no parameter was set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One part of a [`MultipartBody`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// A plain text field.
    Text {
        /// Field name.
        name: String,
        /// Field value.
        value: String,
    },
    /// A file field.
    File {
        /// Field name.
        name: String,
        /// File name reported to the backend.
        file_name: String,
        /// MIME type of the file, if known.
        mime: Option<String>,
        /// File contents.
        bytes: Bytes,
    },
}

/// A clonable multipart form.
///
/// The gateway may send a call twice (original plus one retry), so the form
/// is kept as plain data and turned into a transport form per attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartBody {
    parts: Vec<Part>,
}

impl MultipartBody {
    /// Empty form.
    #[must_use]
    pub const fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Append a text field.
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Append a file field.
    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<&str>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(Part::File {
            name: name.into(),
            file_name: file_name.into(),
            mime: mime.map(str::to_string),
            bytes: bytes.into(),
        });
        self
    }

    /// Parts in order.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }
}

/// Request payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// A JSON document.
    Json(Value),
    /// Raw bytes with an optional caller-chosen content type.
    Raw {
        /// Payload.
        bytes: Bytes,
        /// Content type; `None` leaves it to the transport.
        content_type: Option<String>,
    },
    /// A multipart form; the transport sets the content type and boundary.
    Multipart(MultipartBody),
}

impl Body {
    /// Whether the transport must choose the content type itself.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }
}

/// A single logical call: endpoint, method, query, body and extra headers.
///
/// Built fresh per invocation. The only state that ever changes is the
/// retry flag, and that is done by producing a copy with
/// [`as_retry`](Self::as_retry).
///
/// ```
/// use polaris_gateway::OutgoingCall;
///
/// let call = OutgoingCall::get("/contents")
///     .param("page", 2)
///     .opt_param("search", None::<&str>);
/// assert_eq!(call.query().present().collect::<Vec<_>>(), vec![("page", "2")]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingCall {
    endpoint: String,
    method: Method,
    query: QueryParams,
    body: Body,
    headers: Vec<(String, String)>,
    retried: bool,
}

impl OutgoingCall {
    /// A call with an explicit method.
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            query: QueryParams::new(),
            body: Body::Empty,
            headers: Vec::new(),
            retried: false,
        }
    }

    /// `GET endpoint`.
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    /// `POST endpoint`.
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    /// `PUT endpoint`.
    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    /// `PATCH endpoint`.
    pub fn patch(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PATCH, endpoint)
    }

    /// `DELETE endpoint`.
    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    /// Set a query parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.insert(key, Some(value.to_string()));
        self
    }

    /// Set a query parameter that is omitted when `None`.
    #[must_use]
    pub fn opt_param<V: ToString>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.query.insert(key, value.map(|v| v.to_string()));
        self
    }

    /// Set query parameters from the fields of a serializable struct or map.
    ///
    /// `null` fields are omitted, strings are used verbatim, other scalars
    /// use their JSON text and nested values are sent as compact JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] of kind `Request` if `params` does not
    /// serialize to a JSON object.
    pub fn params<P: Serialize + ?Sized>(mut self, params: &P) -> Result<Self, GatewayError> {
        let value = serde_json::to_value(params)
            .map_err(|err| GatewayError::request(format!("invalid query parameters: {err}")))?;
        let Value::Object(fields) = value else {
            return Err(GatewayError::request(
                "query parameters must serialize to an object",
            ));
        };
        for (key, value) in fields {
            let rendered = match value {
                Value::Null => None,
                Value::String(text) => Some(text),
                other => Some(other.to_string()),
            };
            self.query.insert(key, rendered);
        }
        Ok(self)
    }

    /// Set a JSON body.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] of kind `Request` if `body` fails to serialize.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, GatewayError> {
        let value = serde_json::to_value(body)
            .map_err(|err| GatewayError::request(format!("invalid JSON body: {err}")))?;
        self.body = Body::Json(value);
        Ok(self)
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Add a caller-supplied header. A later value for the same name wins.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Endpoint path relative to the base URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Query parameters.
    #[must_use]
    pub const fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Request payload.
    #[must_use]
    pub const fn payload(&self) -> &Body {
        &self.body
    }

    /// Caller-supplied headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// True for the single re-issue after a successful refresh.
    #[must_use]
    pub const fn is_retry(&self) -> bool {
        self.retried
    }

    /// A copy of this call marked as the retry.
    #[must_use]
    pub fn as_retry(&self) -> Self {
        Self {
            retried: true,
            ..self.clone()
        }
    }

    /// True when this call is aimed at the session refresh endpoint.
    ///
    /// Such calls never enter session recovery.
    #[must_use]
    pub fn targets_refresh_endpoint(&self) -> bool {
        self.endpoint.contains(REFRESH_PATH)
    }
}
