//! Before-action callbacks: the request pipeline side of guard registration.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::services::token_auth::naming::GuardName;
use crate::services::token_auth::options::HookScope;

/// Request pipeline collaborator that runs callbacks before actions.
///
/// Handlers without one simply skip hook installation.
#[async_trait]
pub trait BeforeAction: Send + Sync {
    async fn before_action(&self, callback: GuardName, scope: HookScope);

    /// Removes `callback` if installed.
    async fn skip_before_action(&self, callback: &GuardName);

    /// Callbacks to run before `action`, in installation order.
    async fn callbacks_for(&self, action: &str) -> Vec<GuardName>;
}

/// Ordered callback list. Installing a callback that is already present
/// replaces it (new scope, moved to the end).
#[derive(Debug, Default)]
pub struct FilterChain {
    callbacks: RwLock<Vec<(GuardName, HookScope)>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn callbacks(&self) -> Vec<(GuardName, HookScope)> {
        self.callbacks.read().await.clone()
    }
}

#[async_trait]
impl BeforeAction for FilterChain {
    async fn before_action(&self, callback: GuardName, scope: HookScope) {
        let mut callbacks = self.callbacks.write().await;
        callbacks.retain(|(existing, _)| *existing != callback);
        callbacks.push((callback, scope));
    }

    async fn skip_before_action(&self, callback: &GuardName) {
        self.callbacks
            .write()
            .await
            .retain(|(existing, _)| existing != callback);
    }

    async fn callbacks_for(&self, action: &str) -> Vec<GuardName> {
        self.callbacks
            .read()
            .await
            .iter()
            .filter(|(_, scope)| scope.applies_to(action))
            .map(|(callback, _)| callback.clone())
            .collect()
    }
}
