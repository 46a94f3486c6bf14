//! Authenticated request gateway for the Polaris CMS backend.
//!
//! Every admin and public call to the backend goes through one
//! [`SessionClient::request`]. The gateway builds the wire request
//! (base URL, query string, content type, anti-forgery header), and when a
//! call fails because the access session expired it performs one shared
//! refresh exchange and re-issues the call once.
//!
//! # Types
//!
//! - [`SessionClient`]: the entry point; owns transport, cookie source and refresh state
//! - [`OutgoingCall`]: endpoint, method, query, body and headers of one call
//! - [`GatewayError`]: the single structured error callers receive
//! - [`RefreshCoordinator`]: single-flight refresh state
//! - [`Transport`] / [`CookieSource`]: seams for the network and the cookie store
//! - [`GatewayConfig`]: base URL resolution and transport knobs
//!
//! # Usage
//!
//! ```no_run
//! use polaris_gateway::{GatewayConfig, ExecutionContext, OutgoingCall, SessionClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::from_env(ExecutionContext::Browser)?;
//! let client = SessionClient::new(config)?;
//!
//! let page: serde_json::Value = client
//!     .request(OutgoingCall::get("/contents").param("page", 2))
//!     .await?;
//! # let _ = page;
//! # Ok(())
//! # }
//! ```
//!
//! # Wire contract
//!
//! | Concern            | Behavior                                                      |
//! |--------------------|---------------------------------------------------------------|
//! | Non-GET calls      | `X-CSRF-TOKEN` = cookie `csrf_access_token`, when present     |
//! | Refresh exchange   | `POST <base>/auth/refresh`, `X-CSRF-TOKEN` = `csrf_refresh_token` |
//! | Server context     | no CSRF header, 401 surfaced without a refresh exchange       |
//! | 204                | empty success                                                 |
//! | non-2xx            | JSON `{message, errors}` best effort, else status text        |

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod api;
mod call;
mod client;
mod config;
mod error;
mod refresh;
mod request;
mod transport;

pub use call::{Body, MultipartBody, OutgoingCall, Part, QueryParams};
pub use client::{GatewayResponse, Payload, SessionClient};
pub use config::{ConfigError, ExecutionContext, GatewayConfig};
pub use error::{ErrorKind, FieldErrors, GatewayError};
pub use refresh::{wants_refresh, Recovery, RefreshCoordinator};
pub use request::{build_url, prepare, prepare_refresh, WireRequest};
pub use transport::{
    CookieSource, MemoryCookies, ReqwestTransport, Transport, TransportError, WireResponse,
};

pub use polaris_gateway_core::wire;
pub use polaris_gateway_core::{cookie_value, SessionCookies};
