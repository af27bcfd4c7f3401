/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 *   - entity store, session authenticator, token auth settings
 *   - one TokenAuthenticationHandler per controller
 * - Cheap to Clone (everything behind Arc)
 */
use std::sync::Arc;

use crate::services::session::SessionAuthenticator;
use crate::services::token_auth::handler::TokenAuthenticationHandler;
use crate::services::token_auth::settings::Settings;
use crate::services::token_auth::store::EntityStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub settings: Arc<Settings>,
    pub session: Arc<dyn SessionAuthenticator>,
    /// `PostsController`: User, Devise fallback, everything but `public`.
    pub posts: Arc<TokenAuthenticationHandler>,
    /// `Admin::DashboardController`: SuperAdmin, soft guard only.
    pub dashboard: Arc<TokenAuthenticationHandler>,
    /// `Admin::TokensController`: SuperAdmin, exception fallback.
    pub tokens: Arc<TokenAuthenticationHandler>,
}
