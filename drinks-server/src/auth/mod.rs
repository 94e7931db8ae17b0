//! Bearer token verification and per-route permission checks.
//!
//! - `header` - extracts the token from the `Authorization` header
//! - `jwks` - fetches and caches the issuer's signing-key set
//! - `jwt` - verifies token signature and claims
//! - `gate` - route middleware requiring a permission

pub mod gate;
pub mod header;
pub mod jwks;
pub mod jwt;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use gate::requires_auth;
pub use jwks::{JwksClient, JwksError};
pub use jwt::TokenVerifier;

/// Reasons a caller is refused access to a protected route
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization header is expected.")]
    HeaderMissing,
    #[error("Authorization header must start with \"Bearer\".")]
    NotBearer,
    #[error("Token not found.")]
    TokenNotFound,
    #[error("Authorization header must be bearer token.")]
    NotSingleToken,
    #[error("Authorization malformed.")]
    Malformed,
    #[error("Unable to find the appropriate key.")]
    KeyNotFound,
    #[error("Unable to parse authentication token.")]
    Unparsable,
    #[error("Token expired.")]
    Expired,
    #[error("Incorrect claims. Please, check the audience and issuer.")]
    IncorrectClaims,
    #[error("Permissions not included in JWT.")]
    PermissionsMissing,
    #[error("Permission not found.")]
    PermissionNotFound,
}

impl AuthError {
    /// Error code reported in the response envelope
    pub fn code(&self) -> &'static str {
        match self {
            Self::HeaderMissing => "authorization_header_missing",
            Self::NotBearer
            | Self::TokenNotFound
            | Self::NotSingleToken
            | Self::Malformed
            | Self::KeyNotFound
            | Self::Unparsable => "invalid_header",
            Self::Expired => "token_expired",
            Self::IncorrectClaims | Self::PermissionsMissing => "invalid_claims",
            Self::PermissionNotFound => "unauthorized",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::KeyNotFound | Self::Unparsable | Self::PermissionsMissing => {
                StatusCode::BAD_REQUEST
            }
            Self::PermissionNotFound => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// `aud` may be a single string or a list
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::One(value) => value == audience,
            Self::Many(values) => values.iter().any(|value| value == audience),
        }
    }
}

/// Claims of a verified access token. Lives for a single request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<Audience>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

impl Claims {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .as_ref()
            .is_some_and(|granted| granted.iter().any(|p| p == permission))
    }

    /// Caller identity for log lines
    pub fn subject(&self) -> &str {
        self.sub.as_deref().unwrap_or("<unknown>")
    }
}
