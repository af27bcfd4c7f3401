//! Token authentication of a single request and the guard pair built on it.

use std::sync::Arc;

use axum::http::request::Parts;
use tracing::{debug, warn};

use crate::services::session::{SessionAuthenticator, SignInOptions};
use crate::services::token_auth::comparator::secure_compare;
use crate::services::token_auth::entity::Entity;
use crate::services::token_auth::error::AuthenticationFailure;
use crate::services::token_auth::fallback::FallbackAuthenticationHandler;
use crate::services::token_auth::naming::{GuardKind, GuardName};
use crate::services::token_auth::options::Fallback;
use crate::services::token_auth::settings::Settings;
use crate::services::token_auth::store::{EntityRecord, EntityStore};

/// Looks up the record named by the request's identifier, compares tokens,
/// and signs the record in on success.
pub struct TokenAuthenticator {
    store: Arc<dyn EntityStore>,
    session: Arc<dyn SessionAuthenticator>,
    settings: Arc<Settings>,
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("store", &self.store.backend_name())
            .field("sign_in_token", &self.settings.sign_in_token)
            .finish_non_exhaustive()
    }
}

impl TokenAuthenticator {
    pub fn new(
        store: Arc<dyn EntityStore>,
        session: Arc<dyn SessionAuthenticator>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            store,
            session,
            settings,
        }
    }

    /// Returns whether the request signed `entity` in from its token.
    pub async fn authenticate_entity_from_token(&self, entity: &Entity, parts: &mut Parts) -> bool {
        let scope = entity.name_underscore();

        let Some(record) = self.find_record_from_identifier(entity, parts).await else {
            return false;
        };

        let Some(token) = entity.token_from_request(parts) else {
            debug!(scope, "no token presented");
            return false;
        };

        if !secure_compare(record.authentication_token.as_deref(), &token) {
            warn!(scope, record_id = %record.id, "authentication token mismatch");
            return false;
        }

        let options = SignInOptions {
            store: self.settings.sign_in_token,
            skip_trackable: self.settings.skip_trackable,
        };
        match self.session.sign_in(scope, &record, options, parts).await {
            Ok(_) => {
                debug!(scope, record_id = %record.id, "signed in from token");
                true
            }
            Err(err) => {
                warn!(error = %err, scope, "token sign-in failed");
                false
            }
        }
    }

    async fn find_record_from_identifier(
        &self,
        entity: &Entity,
        parts: &Parts,
    ) -> Option<EntityRecord> {
        let identifier = entity.identifier_from_request(parts)?;

        match self
            .store
            .find_for_authentication(entity.entity_type(), entity.identifier(), &identifier)
            .await
        {
            Ok(found) => found,
            Err(err) => {
                // Fail closed: a store outage never authenticates anyone.
                warn!(
                    error = %err,
                    entity = %entity.entity_type(),
                    backend = self.store.backend_name(),
                    "record lookup failed"
                );
                None
            }
        }
    }
}

/// The soft/strict guard pair registered for one entity on one handler.
#[derive(Debug, Clone)]
pub struct GuardPair {
    entity: Arc<Entity>,
    fallback: Arc<FallbackAuthenticationHandler>,
    authenticator: Arc<TokenAuthenticator>,
}

impl GuardPair {
    pub fn new(
        entity: Arc<Entity>,
        fallback: Arc<FallbackAuthenticationHandler>,
        authenticator: Arc<TokenAuthenticator>,
    ) -> Self {
        Self {
            entity,
            fallback,
            authenticator,
        }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn fallback(&self) -> Fallback {
        self.fallback.fallback()
    }

    pub fn soft_name(&self) -> GuardName {
        GuardName::soft(self.entity.name_underscore())
    }

    pub fn strict_name(&self) -> GuardName {
        GuardName::strict(self.entity.name_underscore())
    }

    /// `authenticate_<entity>_from_token`
    pub async fn authenticate_from_token(&self, parts: &mut Parts) -> bool {
        self.authenticator
            .authenticate_entity_from_token(&self.entity, parts)
            .await
    }

    /// `authenticate_<entity>_from_token!`
    pub async fn authenticate_from_token_strict(
        &self,
        parts: &mut Parts,
    ) -> Result<(), AuthenticationFailure> {
        self.authenticate_from_token(parts).await;
        self.fallback.fallback_for(&self.entity, parts).await
    }

    pub async fn call(&self, kind: GuardKind, parts: &mut Parts) -> Result<(), AuthenticationFailure> {
        match kind {
            GuardKind::Soft => {
                self.authenticate_from_token(parts).await;
                Ok(())
            }
            GuardKind::Strict => self.authenticate_from_token_strict(parts).await,
        }
    }
}
