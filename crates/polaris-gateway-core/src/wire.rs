//! Constants of the cookie-session backend contract.

/// Header carrying the anti-forgery token on mutating calls and on the refresh call.
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// Readable companion of the access session cookie. Sent on every non-GET call.
pub const ACCESS_CSRF_COOKIE: &str = "csrf_access_token";

/// Readable companion of the refresh session cookie. Sent only on the refresh call.
pub const REFRESH_CSRF_COOKIE: &str = "csrf_refresh_token";

/// Path of the session refresh exchange, relative to the base URL.
///
/// Any call whose endpoint contains this path is exempt from session
/// recovery, including the refresh exchange itself.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Base URL used when no configuration is present.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000/api/v1";

/// Environment variable with the base URL for server-side execution.
pub const SERVER_API_URL_ENV: &str = "POLARIS_SERVER_API_URL";

/// Environment variable with the public (browser-facing) base URL.
///
/// Server-side execution falls back to it when [`SERVER_API_URL_ENV`] is unset.
pub const PUBLIC_API_URL_ENV: &str = "POLARIS_PUBLIC_API_URL";
