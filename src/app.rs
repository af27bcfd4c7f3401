/*
 * Responsibility
 * - Config → collaborators (entity store, session cache) → controller registration → Router
 * - Middleware application (request id / trace / limits / timeout)
 * - axum::serve() startup
 */
use std::{panic, process, sync::Arc};

use anyhow::Result;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware;
use crate::repos::entity_repo::PgEntityStore;
use crate::services::cache::{MemoryCache, ValkeyClient};
use crate::services::session::{CookieSessionAuthenticator, SessionAuthenticator};
use crate::services::token_auth::{
    AuthContext, ConfigurationError, EntityRecord, EntityStore, EntityType, Fallback, FilterChain,
    MemoryEntityStore, RegistrationOptions, TokenAuthenticationHandler,
    ensure_authentication_token,
};
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG wins when set, e.g.
    // RUST_LOG=info,token_auth_handler=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Development fails fast; production keeps serving.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting token auth demo in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let ctx = build_auth_context(&config).await?;
    let state = register_controllers(&ctx).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_auth_context(config: &Config) -> Result<AuthContext> {
    let mut seeded_admin = None;
    let store: Arc<dyn EntityStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            Arc::new(PgEntityStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory entity store");
            let (store, admin) = seeded_memory_store().await?;
            seeded_admin = Some(admin);
            Arc::new(store)
        }
    };

    let session: Arc<dyn SessionAuthenticator> = match &config.valkey_url {
        Some(url) => Arc::new(CookieSessionAuthenticator::new(
            ValkeyClient::new(url).await?,
            config.session_ttl,
        )),
        None => {
            tracing::warn!("VALKEY_URL not set; sessions live in process memory");
            Arc::new(CookieSessionAuthenticator::new(
                MemoryCache::new(),
                config.session_ttl,
            ))
        }
    };

    let ctx = AuthContext::new(Arc::new(config.token_auth.clone()), store, session);

    if let Some(mut admin) = seeded_admin
        && !config.app_env.is_production()
    {
        seed_admin_token(&ctx, &mut admin).await?;
    }

    Ok(ctx)
}

/// One user and one super admin so the in-memory demo is usable.
async fn seeded_memory_store() -> Result<(MemoryEntityStore, EntityRecord)> {
    let store = MemoryEntityStore::new();
    let user = EntityType::new("User");
    let admin = EntityType::new("SuperAdmin");
    store.declare(&user).await;
    store.declare(&admin).await;

    store.insert(&user, "user@example.com", None).await?;
    let root = store.insert(&admin, "admin@example.com", None).await?;
    Ok((store, root))
}

/// Gives the seeded super admin a token. Provisioning goes through the shared
/// provisioner so controller registration does not repeat it.
async fn seed_admin_token(ctx: &AuthContext, admin: &mut EntityRecord) -> Result<String> {
    let super_admin = EntityType::new("SuperAdmin");
    ctx.provisioner.provision(&super_admin).await?;
    let token = ensure_authentication_token(ctx.store.as_ref(), &super_admin, admin).await?;

    tracing::info!(identifier = %admin.identifier, "seeded super admin token (development only)");
    tracing::debug!(token = %token, "seeded super admin token value");
    Ok(token)
}

/// Registers token authentication on every controller of the demo API.
pub async fn register_controllers(ctx: &AuthContext) -> Result<AppState, ConfigurationError> {
    let user = EntityType::new("User");
    let super_admin = EntityType::new("SuperAdmin");

    let posts = controller("PostsController", ctx);
    posts
        .handle_token_authentication_for(&user, RegistrationOptions::new().except(["public"]))
        .await?;

    let dashboard = controller("Admin::DashboardController", ctx);
    dashboard
        .handle_token_authentication_for(
            &super_admin,
            RegistrationOptions::new().fallback_to_devise(false),
        )
        .await?;

    let tokens = controller("Admin::TokensController", ctx);
    tokens
        .handle_token_authentication_for(
            &super_admin,
            RegistrationOptions::new().fallback(Fallback::Exception),
        )
        .await?;

    Ok(AppState {
        store: ctx.store.clone(),
        settings: ctx.settings.clone(),
        session: ctx.session.clone(),
        posts: Arc::new(posts),
        dashboard: Arc::new(dashboard),
        tokens: Arc::new(tokens),
    })
}

fn controller(owner: &str, ctx: &AuthContext) -> TokenAuthenticationHandler {
    TokenAuthenticationHandler::new(owner, ctx).with_before_action(Arc::new(FilterChain::new()))
}

fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .nest("/api/v1", api::v1::routes(&state))
        .with_state(state);

    middleware::http::apply(router, config)
}
