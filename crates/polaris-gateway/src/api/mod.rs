//! Typed facades over [`SessionClient::request`](crate::SessionClient::request).

pub mod auth;

pub use auth::{AuthApi, LoginCredentials, LoginResponse, Role, User};
