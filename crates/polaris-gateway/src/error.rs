//! Gateway error taxonomy.
//!
//! Every failure a caller can observe is a single [`GatewayError`]: network
//! failures, non-2xx responses and undecodable bodies alike. An expired
//! session never reaches the caller as such; it is either recovered or
//! surfaced as [`ErrorKind::AuthInvalid`].

use std::collections::BTreeMap;
use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Message used when a failure body is JSON but carries no message.
const FALLBACK_MESSAGE: &str = "An error occurred";

/// Message used when the transport error has no text of its own.
const NETWORK_MESSAGE: &str = "Network error";

/// Broad classification of a [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// No response was obtained (DNS, connection, timeout). Never triggers a refresh.
    Network,
    /// HTTP 401 that survived session recovery: the session is genuinely invalid.
    AuthInvalid,
    /// Any other 4xx (and unexpected non-2xx below 500).
    Client,
    /// Any 5xx.
    Server,
    /// A 2xx response whose body could not be decoded.
    Decode,
    /// The call itself was malformed and never left the process.
    Request,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::AuthInvalid => "auth_invalid",
            Self::Client => "client",
            Self::Server => "server",
            Self::Decode => "decode",
            Self::Request => "request",
        };
        f.write_str(name)
    }
}

/// Field-level validation messages: the backend sends one string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldErrors {
    /// A single message.
    One(String),
    /// Several messages for the same field.
    Many(Vec<String>),
}

impl FieldErrors {
    /// All messages for the field, in order.
    #[must_use]
    pub fn messages(&self) -> Vec<&str> {
        match self {
            Self::One(message) => vec![message.as_str()],
            Self::Many(messages) => messages.iter().map(String::as_str).collect(),
        }
    }
}

/// The single, structured error returned by the gateway.
///
/// `Display` is the human-readable message. The status code is present for
/// every failure that produced a response, which is what lets callers tell
/// [`ErrorKind::AuthInvalid`] (401) apart from everything else.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct GatewayError {
    kind: ErrorKind,
    message: String,
    status: Option<StatusCode>,
    errors: Option<BTreeMap<String, FieldErrors>>,
}

impl GatewayError {
    /// A transport-level failure: no response at all.
    pub fn network(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: ErrorKind::Network,
            message: if message.is_empty() {
                NETWORK_MESSAGE.to_string()
            } else {
                message
            },
            status: None,
            errors: None,
        }
    }

    /// A call rejected locally before dispatch (e.g. an invalid header).
    pub fn request(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Request,
            message: message.into(),
            status: None,
            errors: None,
        }
    }

    /// A 2xx response whose body could not be decoded.
    #[must_use]
    pub fn decode(status: StatusCode) -> Self {
        Self {
            kind: ErrorKind::Decode,
            message: status_text(status),
            status: Some(status),
            errors: None,
        }
    }

    /// Convert a non-2xx response into an error.
    ///
    /// The body is parsed best-effort as JSON `{message, errors}`. A JSON body
    /// without a usable message yields a generic message; a body that is not
    /// JSON at all yields the HTTP status text.
    #[must_use]
    pub fn from_failure(status: StatusCode, body: &[u8]) -> Self {
        let (message, errors) = match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(value) => {
                let message = value
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .filter(|message| !message.is_empty())
                    .unwrap_or(FALLBACK_MESSAGE)
                    .to_string();
                let errors = value
                    .get("errors")
                    .cloned()
                    .and_then(|errors| serde_json::from_value(errors).ok());
                (message, errors)
            }
            Err(_) => (status_text(status), None),
        };

        Self {
            kind: kind_for_status(status),
            message,
            status: Some(status),
            errors,
        }
    }

    /// Error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, when a response was received.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Field-level validation messages, when the backend sent any.
    #[must_use]
    pub const fn errors(&self) -> Option<&BTreeMap<String, FieldErrors>> {
        self.errors.as_ref()
    }

    /// True for a terminal authentication failure: route to re-authentication.
    #[must_use]
    pub fn is_auth_invalid(&self) -> bool {
        self.status == Some(StatusCode::UNAUTHORIZED)
    }
}

fn kind_for_status(status: StatusCode) -> ErrorKind {
    if status == StatusCode::UNAUTHORIZED {
        ErrorKind::AuthInvalid
    } else if status.is_server_error() {
        ErrorKind::Server
    } else {
        ErrorKind::Client
    }
}

/// Reason phrase for a status, or the bare code when it has none.
fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map_or_else(|| status.as_str().to_string(), str::to_string)
}
