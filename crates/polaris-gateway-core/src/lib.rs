//! Shared wire contract for the polaris-gateway ecosystem.
//!
//! This crate holds the pieces of the backend contract that have to match
//! bit-for-bit: the anti-forgery header and cookie names, the session
//! refresh path, the fallback base URL, and the parser for the readable
//! cookie string the CSRF companions are taken from.
//!
//! `polaris-gateway` re-exports everything here. You should not need to
//! depend on this crate directly.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cookie;
pub mod wire;

pub use cookie::{cookie_value, SessionCookies};
