//! Authentication endpoints.

use serde::{Deserialize, Serialize};

use crate::call::OutgoingCall;
use crate::client::SessionClient;
use crate::error::GatewayError;

/// Login form.
#[derive(Debug, Clone, Serialize)]
pub struct LoginCredentials {
    /// Account name.
    pub username: String,
    /// Plain-text password, sent once over the session API.
    pub password: String,
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access.
    Admin,
    /// Content editing.
    Editor,
    /// Regular account.
    User,
}

/// A backend user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Numeric id.
    pub id: u64,
    /// Login name.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// Role.
    pub role: Role,
    /// Disabled accounts cannot log in or refresh.
    pub is_active: bool,
    /// Creation timestamp as sent by the backend.
    pub created_at: String,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Last successful login.
    #[serde(default)]
    pub last_login: Option<String>,
    /// Number of authored content items.
    #[serde(default)]
    pub content_count: Option<u64>,
}

/// Body returned by login and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    /// The authenticated account.
    pub user: User,
}

/// Typed access to `/auth/*`. Obtain with [`SessionClient::auth`].
#[derive(Debug, Clone, Copy)]
pub struct AuthApi<'a> {
    client: &'a SessionClient,
}

impl SessionClient {
    /// Authentication endpoints.
    #[must_use]
    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi { client: self }
    }
}

impl AuthApi<'_> {
    /// `POST /auth/login`. On success the backend sets the session cookies.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`]; bad credentials surface as status 401.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<LoginResponse, GatewayError> {
        let call = OutgoingCall::post("/auth/login").json(credentials)?;
        self.client.request(call).await
    }

    /// `GET /auth/profile`.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] if the session cannot be recovered.
    pub async fn profile(&self) -> Result<User, GatewayError> {
        self.client.request(OutgoingCall::get("/auth/profile")).await
    }

    /// `POST /auth/logout`. The backend clears the session cookies.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] if the call fails.
    pub async fn logout(&self) -> Result<(), GatewayError> {
        self.client
            .request::<serde_json::Value>(OutgoingCall::post("/auth/logout"))
            .await
            .map(|_| ())
    }

    /// `POST /auth/refresh`, issued explicitly.
    ///
    /// A 401 here is returned as-is; it never starts session recovery.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] if the refresh credential is missing or expired.
    pub async fn refresh(&self) -> Result<LoginResponse, GatewayError> {
        self.client.request(OutgoingCall::post("/auth/refresh")).await
    }
}
