//! Registration of token authentication on an owning type (a controller).
//!
//! ```ignore
//! let posts = TokenAuthenticationHandler::new("PostsController", &ctx)
//!     .with_before_action(Arc::new(FilterChain::new()));
//! posts
//!     .handle_token_authentication_for(&EntityType::new("User"), RegistrationOptions::new())
//!     .await?;
//! // posts now responds to `authenticate_user_from_token` and
//! // `authenticate_user_from_token!`, and runs the latter before every action.
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use axum::http::request::Parts;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::services::session::SessionAuthenticator;
use crate::services::token_auth::entities::{EntitiesManager, TokenProvisioner};
use crate::services::token_auth::entity::{Entity, EntityType};
use crate::services::token_auth::error::{AuthenticationFailure, ConfigurationError};
use crate::services::token_auth::fallback::{FallbackAuthenticationHandler, FallbackManager};
use crate::services::token_auth::guard::{GuardPair, TokenAuthenticator};
use crate::services::token_auth::hooks::BeforeAction;
use crate::services::token_auth::naming::GuardName;
use crate::services::token_auth::options::{Fallback, RegistrationOptions, ResolvedOptions};
use crate::services::token_auth::settings::Settings;
use crate::services::token_auth::store::EntityStore;

/// Collaborators shared by every handler, built once at bootstrap.
#[derive(Clone)]
pub struct AuthContext {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn EntityStore>,
    pub session: Arc<dyn SessionAuthenticator>,
    pub provisioner: Arc<TokenProvisioner>,
}

impl AuthContext {
    pub fn new(
        settings: Arc<Settings>,
        store: Arc<dyn EntityStore>,
        session: Arc<dyn SessionAuthenticator>,
    ) -> Self {
        Self {
            provisioner: Arc::new(TokenProvisioner::new(store.clone())),
            settings,
            store,
            session,
        }
    }
}

/// Token authentication state of one owning type.
///
/// Guards registered here are visible only through this handler.
pub struct TokenAuthenticationHandler {
    owner: String,
    ctx: AuthContext,
    hooks: Option<Arc<dyn BeforeAction>>,
    authenticator: Arc<TokenAuthenticator>,
    entities_manager: OnceLock<Arc<EntitiesManager>>,
    fallback_manager: OnceLock<Arc<FallbackManager>>,
    guards: RwLock<BTreeMap<String, GuardPair>>,
    // Serializes registrations so check-then-create stays atomic.
    registration: Mutex<()>,
}

impl std::fmt::Debug for TokenAuthenticationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticationHandler")
            .field("owner", &self.owner)
            .field("hooks", &self.hooks.is_some())
            .finish_non_exhaustive()
    }
}

impl TokenAuthenticationHandler {
    pub fn new(owner: impl Into<String>, ctx: &AuthContext) -> Self {
        let authenticator = Arc::new(TokenAuthenticator::new(
            ctx.store.clone(),
            ctx.session.clone(),
            ctx.settings.clone(),
        ));

        Self {
            owner: owner.into(),
            ctx: ctx.clone(),
            hooks: None,
            authenticator,
            entities_manager: OnceLock::new(),
            fallback_manager: OnceLock::new(),
            guards: RwLock::new(BTreeMap::new()),
            registration: Mutex::new(()),
        }
    }

    pub fn with_before_action(mut self, hooks: Arc<dyn BeforeAction>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Created on first use, then shared by every registration on this handler.
    pub fn entities_manager(&self) -> Arc<EntitiesManager> {
        self.entities_manager
            .get_or_init(|| {
                debug!(owner = %self.owner, "creating entities manager");
                Arc::new(EntitiesManager::new(
                    self.ctx.provisioner.clone(),
                    self.ctx.settings.clone(),
                ))
            })
            .clone()
    }

    pub fn fallback_manager(&self) -> Arc<FallbackManager> {
        self.fallback_manager
            .get_or_init(|| {
                debug!(owner = %self.owner, "creating fallback manager");
                Arc::new(FallbackManager::new(self.ctx.session.clone()))
            })
            .clone()
    }

    pub async fn fallback_authentication_handler(
        &self,
        options: &ResolvedOptions,
    ) -> Arc<FallbackAuthenticationHandler> {
        self.fallback_manager()
            .fallback_authentication_handler(options)
            .await
    }

    /// Merges the process-wide fallback default into `options`.
    pub fn resolve_options(
        &self,
        options: &RegistrationOptions,
    ) -> Result<ResolvedOptions, ConfigurationError> {
        options.resolve(self.ctx.settings.fallback)
    }

    /// Registers token authentication for `entity_type` on this handler.
    ///
    /// Defines the guard pair `authenticate_<entity>_from_token[!]` and
    /// installs a before-action callback (the strict guard, or the soft one
    /// when the fallback is `none`). Nothing is installed if any step fails.
    pub async fn handle_token_authentication_for(
        &self,
        entity_type: &EntityType,
        options: RegistrationOptions,
    ) -> Result<(), ConfigurationError> {
        let _registration = self.registration.lock().await;

        let options = self.resolve_options(&options)?;
        let entity = self
            .entities_manager()
            .find_or_create_entity(entity_type, options.alias.as_deref())
            .await?;
        self.ensure_unclaimed(&entity).await?;

        let fallback = self.fallback_authentication_handler(&options).await;
        let pair = self.define_token_authentication_helpers_for(entity, fallback).await;
        self.set_token_authentication_hooks(&pair, &options).await;

        info!(
            owner = %self.owner,
            entity = %entity_type,
            guard = %pair.strict_name(),
            fallback = %options.fallback,
            "token authentication registered"
        );
        Ok(())
    }

    async fn ensure_unclaimed(&self, entity: &Entity) -> Result<(), ConfigurationError> {
        let guards = self.guards.read().await;
        if let Some(existing) = guards.get(entity.name_underscore())
            && existing.entity().entity_type() != entity.entity_type()
        {
            return Err(ConfigurationError::NameCollision {
                name: GuardName::soft(entity.name_underscore()).to_string(),
                existing: existing.entity().entity_type().to_string(),
                incoming: entity.entity_type().to_string(),
            });
        }
        Ok(())
    }

    async fn define_token_authentication_helpers_for(
        &self,
        entity: Arc<Entity>,
        fallback: Arc<FallbackAuthenticationHandler>,
    ) -> GuardPair {
        let pair = GuardPair::new(entity, fallback, self.authenticator.clone());
        self.guards
            .write()
            .await
            .insert(pair.entity().name_underscore().to_string(), pair.clone());
        pair
    }

    async fn set_token_authentication_hooks(&self, pair: &GuardPair, options: &ResolvedOptions) {
        let Some(hooks) = &self.hooks else {
            debug!(owner = %self.owner, "no before-action support; skipping hook");
            return;
        };

        // A re-registration may switch between the soft and strict guard.
        hooks.skip_before_action(&pair.soft_name()).await;
        hooks.skip_before_action(&pair.strict_name()).await;

        let callback = if options.fallback == Fallback::None {
            pair.soft_name()
        } else {
            pair.strict_name()
        };
        hooks.before_action(callback, options.scope.clone()).await;
    }

    /// Whether this handler defines `method`, e.g. `authenticate_user_from_token!`.
    pub async fn responds_to(&self, method: &str) -> bool {
        match GuardName::parse(method) {
            Some(name) => self.guards.read().await.contains_key(name.entity()),
            None => false,
        }
    }

    pub async fn guard_pair(&self, entity: &str) -> Option<GuardPair> {
        self.guards.read().await.get(entity).cloned()
    }

    pub async fn guard_names(&self) -> Vec<GuardName> {
        self.guards
            .read()
            .await
            .values()
            .flat_map(|pair| [pair.soft_name(), pair.strict_name()])
            .collect()
    }

    /// Invokes one guard by name.
    ///
    /// A name with no registered guard denies the request.
    pub async fn call_guard(
        &self,
        name: &GuardName,
        parts: &mut Parts,
    ) -> Result<(), AuthenticationFailure> {
        let Some(pair) = self.guard_pair(name.entity()).await else {
            error!(owner = %self.owner, guard = %name, "callback names an undefined guard");
            return Err(AuthenticationFailure::unauthorized(name.entity()));
        };
        pair.call(name.kind(), parts).await
    }

    /// Runs the before-action callbacks installed for `action`, stopping at the first denial.
    pub async fn run_before_actions(
        &self,
        action: &str,
        parts: &mut Parts,
    ) -> Result<(), AuthenticationFailure> {
        let Some(hooks) = &self.hooks else {
            return Ok(());
        };

        for callback in hooks.callbacks_for(action).await {
            self.call_guard(&callback, parts).await?;
        }
        Ok(())
    }
}
