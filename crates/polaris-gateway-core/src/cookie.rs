//! Readable cookie string parsing.
//!
//! The gateway never sees the session cookies themselves. It only reads the
//! two non-sensitive CSRF companions out of the cookie string a client can
//! read (`name=value; name2=value2`), and it re-reads them on every call
//! because the backend rotates them on each refresh.

use percent_encoding::percent_decode_str;

use crate::wire::{ACCESS_CSRF_COOKIE, REFRESH_CSRF_COOKIE};

/// Look up a single cookie value in a readable cookie string.
///
/// A cookie matches when its name starts the string or follows a `;` and
/// optional whitespace. The value runs to the next `;` and is
/// percent-decoded; if decoding does not yield valid UTF-8 the raw value is
/// returned. The first matching cookie wins.
///
/// # Examples
///
/// ```
/// use polaris_gateway_core::cookie_value;
///
/// let jar = "theme=dark; csrf_access_token=abc%3D%3D; other=1";
/// assert_eq!(cookie_value(jar, "csrf_access_token").as_deref(), Some("abc=="));
/// assert_eq!(cookie_value(jar, "access_token"), None);
/// ```
#[must_use]
pub fn cookie_value(cookie_header: &str, name: &str) -> Option<String> {
    cookie_header
        .split(';')
        .enumerate()
        .find_map(|(index, segment)| {
            let segment = if index == 0 {
                segment
            } else {
                segment.trim_start()
            };
            segment.strip_prefix(name)?.strip_prefix('=')
        })
        .map(|raw| match percent_decode_str(raw).decode_utf8() {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => raw.to_string(),
        })
}

/// The client's view of the two CSRF companion tokens.
///
/// `SessionCookies::default()` is the view of an execution context without
/// a cookie store: both companions absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCookies {
    /// Value of the `csrf_access_token` cookie, attached to mutating calls.
    pub access_csrf: Option<String>,
    /// Value of the `csrf_refresh_token` cookie, attached to the refresh call.
    pub refresh_csrf: Option<String>,
}

impl SessionCookies {
    /// Extract both companions from a readable cookie string.
    #[must_use]
    pub fn parse(cookie_header: &str) -> Self {
        Self {
            access_csrf: cookie_value(cookie_header, ACCESS_CSRF_COOKIE),
            refresh_csrf: cookie_value(cookie_header, REFRESH_CSRF_COOKIE),
        }
    }

    /// Parse an optional cookie string; `None` means no cookie store.
    #[must_use]
    pub fn from_header(cookie_header: Option<&str>) -> Self {
        cookie_header.map(Self::parse).unwrap_or_default()
    }
}
