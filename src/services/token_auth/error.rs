use thiserror::Error;

use crate::repos::error::StoreError;

/// Registration-time failures. These surface at bootstrap and are never retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid entity type name: {name:?}")]
    InvalidEntityType { name: String },

    #[error("invalid entity alias: {alias:?} (expected snake_case)")]
    InvalidAlias { alias: String },

    #[error("entity type {entity} cannot be provisioned with token storage")]
    Unprovisionable {
        entity: String,
        #[source]
        source: StoreError,
    },

    #[error("guard name `{name}` is already taken by {existing} (while registering {incoming})")]
    NameCollision {
        name: String,
        existing: String,
        incoming: String,
    },

    #[error("malformed registration options: {0}")]
    MalformedOptions(String),
}

/// How a denied request should be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    Unauthorized,
    /// Navigational requests are sent to the sign-in page instead.
    Redirect { location: String },
}

/// Raised by a strict guard when neither the token nor the fallback authenticated the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("authentication required for `{scope}`")]
pub struct AuthenticationFailure {
    pub scope: String,
    pub denial: Denial,
}

impl AuthenticationFailure {
    pub fn unauthorized(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            denial: Denial::Unauthorized,
        }
    }

    pub fn redirect(scope: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            denial: Denial::Redirect {
                location: location.into(),
            },
        }
    }
}
