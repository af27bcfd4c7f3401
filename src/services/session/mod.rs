/*!
 * Session authentication
 *
 * Responsibility:
 * - The pre-existing (cookie) session mechanism that token authentication falls back to
 * - Request-scoped sign-in state (`CurrentEntities`) shared by guards, fallbacks and handlers
 *
 * Public API:
 * - SessionAuthenticator (collaborator interface)
 * - CookieSessionAuthenticator (cache-backed implementation)
 */

mod cookie;

use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::services::cache::CacheError;
use crate::services::token_auth::error::AuthenticationFailure;
use crate::services::token_auth::store::EntityRecord;

pub use cookie::{CookieSessionAuthenticator, SESSION_COOKIE};

/// A record signed in for one scope (`user`, `super_admin`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedIn {
    pub scope: String,
    pub record_id: Uuid,
    pub identifier: String,
    pub via_token: bool,
    pub signed_in_at: DateTime<Utc>,
}

/// Everyone signed in on the current request, by scope. Lives in request extensions.
#[derive(Debug, Clone, Default)]
pub struct CurrentEntities(BTreeMap<String, SignedIn>);

impl CurrentEntities {
    pub fn get(&self, scope: &str) -> Option<&SignedIn> {
        self.0.get(scope)
    }

    pub fn insert(&mut self, signed_in: SignedIn) {
        self.0.insert(signed_in.scope.clone(), signed_in);
    }
}

/// Records `signed_in` on the request so later guards and handlers see it.
pub fn remember(parts: &mut Parts, signed_in: SignedIn) {
    match parts.extensions.get_mut::<CurrentEntities>() {
        Some(current) => current.insert(signed_in),
        None => {
            let mut current = CurrentEntities::default();
            current.insert(signed_in);
            parts.extensions.insert(current);
        }
    }
}

pub fn signed_in_on_request(parts: &Parts, scope: &str) -> Option<SignedIn> {
    parts
        .extensions
        .get::<CurrentEntities>()
        .and_then(|current| current.get(scope))
        .cloned()
}

/// A session created while handling the request; the response must carry its cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    pub id: String,
    pub max_age_seconds: u64,
}

impl IssuedSession {
    pub fn set_cookie_value(&self) -> String {
        format!(
            "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.id, self.max_age_seconds
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignInOptions {
    /// Persist a session (cookie) beyond this request.
    pub store: bool,
    pub skip_trackable: bool,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("session payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Session-based authentication the token guards fall back to.
#[async_trait]
pub trait SessionAuthenticator: Send + Sync {
    /// Returns who is signed in for `scope`: first on this request, then in the session.
    async fn current(&self, scope: &str, parts: &Parts) -> Option<SignedIn>;

    async fn sign_in(
        &self,
        scope: &str,
        record: &EntityRecord,
        options: SignInOptions,
        parts: &mut Parts,
    ) -> Result<SignedIn, SessionError>;

    /// Drops the stored session for `scope`. Returns whether one existed.
    async fn sign_out(&self, scope: &str, parts: &Parts) -> Result<bool, SessionError>;

    /// The denial sent when `scope` must authenticate again.
    fn force_authentication(&self, scope: &str, parts: &Parts) -> AuthenticationFailure;

    /// Verifies the current session for `scope`, or forces re-authentication.
    async fn authenticate(
        &self,
        scope: &str,
        parts: &mut Parts,
    ) -> Result<SignedIn, AuthenticationFailure> {
        match self.current(scope, parts).await {
            Some(signed_in) => {
                remember(parts, signed_in.clone());
                Ok(signed_in)
            }
            None => Err(self.force_authentication(scope, parts)),
        }
    }
}
