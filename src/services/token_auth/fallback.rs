//! Fallback strategies applied by strict guards, and their per-handler cache.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::request::Parts;
use tokio::sync::Mutex;
use tracing::debug;

use crate::services::session::SessionAuthenticator;
use crate::services::token_auth::entity::Entity;
use crate::services::token_auth::error::AuthenticationFailure;
use crate::services::token_auth::options::{Fallback, ResolvedOptions};

pub struct FallbackAuthenticationHandler {
    fallback: Fallback,
    session: Arc<dyn SessionAuthenticator>,
}

impl std::fmt::Debug for FallbackAuthenticationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackAuthenticationHandler")
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl FallbackAuthenticationHandler {
    pub fn new(fallback: Fallback, session: Arc<dyn SessionAuthenticator>) -> Self {
        Self { fallback, session }
    }

    pub fn fallback(&self) -> Fallback {
        self.fallback
    }

    /// Runs after token authentication, whether or not it signed anyone in.
    ///
    /// - `Devise`: the session must authenticate `entity`, or the request is denied.
    /// - `Exception`: denied with 401 unless `entity` is already signed in.
    /// - `None`: never denies.
    pub async fn fallback_for(
        &self,
        entity: &Entity,
        parts: &mut Parts,
    ) -> Result<(), AuthenticationFailure> {
        let scope = entity.name_underscore();

        match self.fallback {
            Fallback::Devise => self.session.authenticate(scope, parts).await.map(|_| ()),
            Fallback::Exception => match self.session.current(scope, parts).await {
                Some(_) => Ok(()),
                None => Err(AuthenticationFailure::unauthorized(scope)),
            },
            Fallback::None => Ok(()),
        }
    }
}

/// One `FallbackAuthenticationHandler` per distinct fallback value, created on first use.
pub struct FallbackManager {
    session: Arc<dyn SessionAuthenticator>,
    handlers: Mutex<HashMap<Fallback, Arc<FallbackAuthenticationHandler>>>,
}

impl std::fmt::Debug for FallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackManager").finish_non_exhaustive()
    }
}

impl FallbackManager {
    pub fn new(session: Arc<dyn SessionAuthenticator>) -> Self {
        Self {
            session,
            handlers: Mutex::new(HashMap::new()),
        }
    }

    // Only the fallback-relevant part of the options keys the cache, so
    // registrations differing in only/except share a strategy.
    pub async fn fallback_authentication_handler(
        &self,
        options: &ResolvedOptions,
    ) -> Arc<FallbackAuthenticationHandler> {
        let mut handlers = self.handlers.lock().await;

        if let Some(handler) = handlers.get(&options.fallback) {
            debug!(fallback = %options.fallback, "reusing fallback handler");
            return handler.clone();
        }

        let handler = Arc::new(FallbackAuthenticationHandler::new(
            options.fallback,
            self.session.clone(),
        ));
        handlers.insert(options.fallback, handler.clone());
        handler
    }

    pub async fn len(&self) -> usize {
        self.handlers.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::token_auth::entity::EntityType;
    use crate::services::token_auth::error::Denial;
    use crate::services::token_auth::options::RegistrationOptions;
    use crate::services::token_auth::settings::Settings;
    use crate::services::token_auth::test_support::{memory_sessions, request};

    fn resolved(fallback: Fallback) -> ResolvedOptions {
        RegistrationOptions::new()
            .fallback(fallback)
            .resolve(Fallback::Devise)
            .unwrap()
    }

    fn user() -> Entity {
        Entity::new(EntityType::new("User"), None, &Settings::default())
    }

    #[tokio::test]
    async fn first_call_creates_and_later_calls_reuse() {
        let manager = FallbackManager::new(memory_sessions());

        let first = manager
            .fallback_authentication_handler(&resolved(Fallback::Devise))
            .await;
        let second = manager
            .fallback_authentication_handler(&resolved(Fallback::Devise))
            .await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.len().await, 1);
    }

    #[tokio::test]
    async fn scope_options_do_not_split_the_cache() {
        let manager = FallbackManager::new(memory_sessions());
        let scoped = RegistrationOptions::new()
            .only(["index"])
            .resolve(Fallback::Devise)
            .unwrap();

        let a = manager.fallback_authentication_handler(&scoped).await;
        let b = manager
            .fallback_authentication_handler(&resolved(Fallback::Devise))
            .await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn distinct_fallbacks_get_distinct_handlers() {
        let manager = FallbackManager::new(memory_sessions());

        let devise = manager
            .fallback_authentication_handler(&resolved(Fallback::Devise))
            .await;
        let none = manager
            .fallback_authentication_handler(&resolved(Fallback::None))
            .await;

        assert!(!Arc::ptr_eq(&devise, &none));
        assert_eq!(none.fallback(), Fallback::None);
        assert_eq!(manager.len().await, 2);
    }

    #[tokio::test]
    async fn devise_fallback_forces_authentication_without_session() {
        let handler = FallbackAuthenticationHandler::new(Fallback::Devise, memory_sessions());

        let mut api = request("/posts", &[]);
        let err = handler.fallback_for(&user(), &mut api).await.unwrap_err();
        assert_eq!(err.denial, Denial::Unauthorized);

        let mut html = request("/posts", &[("accept", "text/html")]);
        let err = handler.fallback_for(&user(), &mut html).await.unwrap_err();
        assert_eq!(
            err.denial,
            Denial::Redirect {
                location: "/users/sign_in".into()
            }
        );
    }

    #[tokio::test]
    async fn exception_fallback_denies_with_401() {
        let handler = FallbackAuthenticationHandler::new(Fallback::Exception, memory_sessions());
        let mut html = request("/posts", &[("accept", "text/html")]);

        let err = handler.fallback_for(&user(), &mut html).await.unwrap_err();
        assert_eq!(err, AuthenticationFailure::unauthorized("user"));
    }

    #[tokio::test]
    async fn none_fallback_never_denies() {
        let handler = FallbackAuthenticationHandler::new(Fallback::None, memory_sessions());
        let mut parts = request("/posts", &[]);
        assert!(handler.fallback_for(&user(), &mut parts).await.is_ok());
    }
}
