use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, request::Parts};
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::cache::CacheClient;
use crate::services::session::{
    IssuedSession, SessionAuthenticator, SessionError, SignInOptions, SignedIn, remember,
    signed_in_on_request,
};
use crate::services::token_auth::error::AuthenticationFailure;
use crate::services::token_auth::store::EntityRecord;

pub const SESSION_COOKIE: &str = "_session_id";

/// Cookie session stored in a cache backend.
///
/// Keys:
/// - `session:<id>:<scope>` -> JSON `SignedIn`
/// - `trackable:<scope>:<record id>` -> RFC 3339 timestamp of the last tracked sign-in
#[derive(Clone, Debug)]
pub struct CookieSessionAuthenticator<C: CacheClient> {
    cache: C,
    ttl: Duration,
}

impl<C: CacheClient> CookieSessionAuthenticator<C> {
    pub fn new(cache: C, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    pub fn session_key(session_id: &str, scope: &str) -> String {
        format!("session:{session_id}:{scope}")
    }

    fn trackable_key(scope: &str, record_id: Uuid) -> String {
        format!("trackable:{scope}:{record_id}")
    }

    pub async fn last_tracked_sign_in(&self, scope: &str, record_id: Uuid) -> Option<String> {
        self.cache
            .get_string(&Self::trackable_key(scope, record_id))
            .await
            .ok()
            .flatten()
    }

    async fn load(&self, session_id: &str, scope: &str) -> Result<Option<SignedIn>, SessionError> {
        let Some(raw) = self
            .cache
            .get_string(&Self::session_key(session_id, scope))
            .await?
        else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }
}

#[async_trait]
impl<C: CacheClient> SessionAuthenticator for CookieSessionAuthenticator<C> {
    async fn current(&self, scope: &str, parts: &Parts) -> Option<SignedIn> {
        if let Some(signed_in) = signed_in_on_request(parts, scope) {
            return Some(signed_in);
        }

        let session_id = session_id_from_cookies(parts)?;
        match self.load(&session_id, scope).await {
            Ok(found) => found,
            Err(err) => {
                // Unreadable sessions count as signed out.
                warn!(
                    error = %err,
                    backend = self.cache.backend_name(),
                    scope,
                    "session lookup failed"
                );
                None
            }
        }
    }

    async fn sign_in(
        &self,
        scope: &str,
        record: &EntityRecord,
        options: SignInOptions,
        parts: &mut Parts,
    ) -> Result<SignedIn, SessionError> {
        let signed_in = SignedIn {
            scope: scope.to_string(),
            record_id: record.id,
            identifier: record.identifier.clone(),
            via_token: true,
            signed_in_at: Utc::now(),
        };

        if options.store {
            let existing = session_id_from_cookies(parts);
            let session_id = existing
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
            let payload = serde_json::to_string(&signed_in)?;

            self.cache
                .put_with_ttl(&Self::session_key(&session_id, scope), &payload, self.ttl)
                .await?;

            if existing.is_none() {
                parts.extensions.insert(IssuedSession {
                    id: session_id,
                    max_age_seconds: self.ttl.as_secs(),
                });
            }
            debug!(scope, record_id = %record.id, "session stored for token sign-in");
        }

        if !options.skip_trackable {
            self.cache
                .put_with_ttl(
                    &Self::trackable_key(scope, record.id),
                    &signed_in.signed_in_at.to_rfc3339(),
                    self.ttl,
                )
                .await?;
            info!(scope, record_id = %record.id, "tracked sign-in");
        }

        remember(parts, signed_in.clone());
        Ok(signed_in)
    }

    async fn sign_out(&self, scope: &str, parts: &Parts) -> Result<bool, SessionError> {
        let Some(session_id) = session_id_from_cookies(parts) else {
            return Ok(false);
        };

        let removed = self
            .cache
            .del(&Self::session_key(&session_id, scope))
            .await?;
        if removed > 0 {
            info!(scope, "signed out");
        }
        Ok(removed > 0)
    }

    fn force_authentication(&self, scope: &str, parts: &Parts) -> AuthenticationFailure {
        let navigational = parts
            .headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("text/html"));

        if navigational {
            AuthenticationFailure::redirect(scope, format!("/{scope}s/sign_in"))
        } else {
            AuthenticationFailure::unauthorized(scope)
        }
    }
}

fn session_id_from_cookies(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::MemoryCache;
    use crate::services::session::CurrentEntities;
    use crate::services::token_auth::error::Denial;
    use crate::services::token_auth::test_support::request;

    fn record() -> EntityRecord {
        EntityRecord {
            id: Uuid::new_v4(),
            identifier: "alice@example.com".into(),
            authentication_token: Some("tok".into()),
        }
    }

    fn sessions() -> (CookieSessionAuthenticator<MemoryCache>, MemoryCache) {
        let cache = MemoryCache::new();
        (
            CookieSessionAuthenticator::new(cache.clone(), Duration::from_secs(60)),
            cache,
        )
    }

    const NO_STORE: SignInOptions = SignInOptions {
        store: false,
        skip_trackable: true,
    };

    #[tokio::test]
    async fn sign_in_without_store_only_lasts_for_the_request() {
        let (sessions, cache) = sessions();
        let mut parts = request("/posts", &[]);

        let signed_in = sessions
            .sign_in("user", &record(), NO_STORE, &mut parts)
            .await
            .unwrap();

        assert_eq!(sessions.current("user", &parts).await, Some(signed_in));
        assert!(parts.extensions.get::<CurrentEntities>().is_some());
        assert!(parts.extensions.get::<IssuedSession>().is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn stored_session_is_found_from_cookie_on_later_requests() {
        let (sessions, _) = sessions();
        let mut first = request("/posts", &[]);
        let options = SignInOptions {
            store: true,
            ..NO_STORE
        };

        let signed_in = sessions
            .sign_in("user", &record(), options, &mut first)
            .await
            .unwrap();
        let issued = first.extensions.get::<IssuedSession>().cloned().unwrap();
        assert!(issued.set_cookie_value().starts_with("_session_id="));

        let cookie = format!("theme=dark; {SESSION_COOKIE}={}", issued.id);
        let later = request("/posts", &[("cookie", cookie.as_str())]);
        assert_eq!(sessions.current("user", &later).await, Some(signed_in));
        assert_eq!(sessions.current("super_admin", &later).await, None);
    }

    #[tokio::test]
    async fn sign_out_drops_only_the_named_scope() {
        let (sessions, _) = sessions();
        let options = SignInOptions {
            store: true,
            ..NO_STORE
        };
        let mut first = request("/posts", &[]);
        sessions
            .sign_in("user", &record(), options, &mut first)
            .await
            .unwrap();
        let issued = first.extensions.get::<IssuedSession>().cloned().unwrap();
        let cookie = format!("{SESSION_COOKIE}={}", issued.id);
        let later = request("/posts", &[("cookie", cookie.as_str())]);

        assert!(!sessions.sign_out("super_admin", &later).await.unwrap());
        assert!(sessions.sign_out("user", &later).await.unwrap());
        assert_eq!(sessions.current("user", &later).await, None);
        assert!(!sessions.sign_out("user", &request("/", &[])).await.unwrap());
    }

    #[tokio::test]
    async fn trackable_sign_ins_are_recorded_unless_skipped() {
        let (sessions, _) = sessions();
        let record = record();

        let mut parts = request("/posts", &[]);
        sessions
            .sign_in("user", &record, NO_STORE, &mut parts)
            .await
            .unwrap();
        assert!(sessions.last_tracked_sign_in("user", record.id).await.is_none());

        let tracked = SignInOptions {
            skip_trackable: false,
            ..NO_STORE
        };
        let mut parts = request("/posts", &[]);
        sessions
            .sign_in("user", &record, tracked, &mut parts)
            .await
            .unwrap();
        assert!(sessions.last_tracked_sign_in("user", record.id).await.is_some());
    }

    #[tokio::test]
    async fn force_authentication_redirects_navigational_requests() {
        let (sessions, _) = sessions();

        let html = request("/admin", &[("accept", "text/html,application/xhtml+xml")]);
        assert_eq!(
            sessions.force_authentication("super_admin", &html).denial,
            Denial::Redirect {
                location: "/super_admins/sign_in".into()
            }
        );

        let api = request("/admin", &[("accept", "application/json")]);
        assert_eq!(
            sessions.force_authentication("super_admin", &api).denial,
            Denial::Unauthorized
        );
    }

    #[tokio::test]
    async fn authenticate_remembers_the_session_on_the_request() {
        let (sessions, _) = sessions();
        let mut parts = request("/posts", &[]);
        assert!(sessions.authenticate("user", &mut parts).await.is_err());

        sessions
            .sign_in("user", &record(), NO_STORE, &mut parts)
            .await
            .unwrap();
        assert!(sessions.authenticate("user", &mut parts).await.is_ok());
    }
}
