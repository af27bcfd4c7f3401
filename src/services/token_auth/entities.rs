use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::services::token_auth::entity::{Entity, EntityType};
use crate::services::token_auth::error::ConfigurationError;
use crate::services::token_auth::settings::Settings;
use crate::services::token_auth::store::EntityStore;

/// Provisions token storage through the store at most once per entity type,
/// however many handlers register that type. Shared through `AuthContext`.
pub struct TokenProvisioner {
    store: Arc<dyn EntityStore>,
    provisioned: Mutex<HashSet<EntityType>>,
}

impl std::fmt::Debug for TokenProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvisioner")
            .field("store", &self.store.backend_name())
            .finish_non_exhaustive()
    }
}

impl TokenProvisioner {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            provisioned: Mutex::new(HashSet::new()),
        }
    }

    pub async fn provision(&self, entity_type: &EntityType) -> Result<(), ConfigurationError> {
        // Held across the store call so concurrent registrations provision once.
        let mut provisioned = self.provisioned.lock().await;
        if provisioned.contains(entity_type) {
            return Ok(());
        }

        self.store
            .provision_token_storage(entity_type)
            .await
            .map_err(|source| ConfigurationError::Unprovisionable {
                entity: entity_type.name().to_string(),
                source,
            })?;
        provisioned.insert(entity_type.clone());
        info!(
            entity = %entity_type,
            backend = self.store.backend_name(),
            "token storage provisioned"
        );
        Ok(())
    }

    pub async fn is_provisioned(&self, entity_type: &EntityType) -> bool {
        self.provisioned.lock().await.contains(entity_type)
    }
}

/// Resolved `Entity` per (type, alias) pair for one handler.
pub struct EntitiesManager {
    provisioner: Arc<TokenProvisioner>,
    settings: Arc<Settings>,
    entities: Mutex<HashMap<(EntityType, Option<String>), Arc<Entity>>>,
}

impl std::fmt::Debug for EntitiesManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitiesManager")
            .field("provisioner", &self.provisioner)
            .finish_non_exhaustive()
    }
}

impl EntitiesManager {
    pub fn new(provisioner: Arc<TokenProvisioner>, settings: Arc<Settings>) -> Self {
        Self {
            provisioner,
            settings,
            entities: Mutex::new(HashMap::new()),
        }
    }

    pub async fn find_or_create_entity(
        &self,
        entity_type: &EntityType,
        alias: Option<&str>,
    ) -> Result<Arc<Entity>, ConfigurationError> {
        entity_type.validate()?;

        let mut entities = self.entities.lock().await;
        let key = (entity_type.clone(), alias.map(str::to_string));

        if let Some(entity) = entities.get(&key) {
            debug!(entity = %entity_type, "entity already registered");
            return Ok(entity.clone());
        }

        self.provisioner.provision(entity_type).await?;

        let entity = Arc::new(Entity::new(entity_type.clone(), alias, &self.settings));
        entities.insert(key, entity.clone());
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::token_auth::store::MemoryEntityStore;

    async fn manager_with(types: &[&str]) -> (EntitiesManager, Arc<MemoryEntityStore>) {
        let store = Arc::new(MemoryEntityStore::new());
        for name in types {
            store.declare(&EntityType::new(*name)).await;
        }
        let provisioner = Arc::new(TokenProvisioner::new(store.clone()));
        let manager = EntitiesManager::new(provisioner, Arc::new(Settings::default()));
        (manager, store)
    }

    #[tokio::test]
    async fn provisions_each_type_once() {
        let (manager, store) = manager_with(&["User"]).await;
        let user = EntityType::new("User");

        let first = manager.find_or_create_entity(&user, None).await.unwrap();
        let second = manager.find_or_create_entity(&user, None).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.provision_count(&user).await, 1);
        assert!(manager.provisioner.is_provisioned(&user).await);
    }

    #[tokio::test]
    async fn aliases_share_provisioning_but_not_entities() {
        let (manager, store) = manager_with(&["SuperAdmin"]).await;
        let admin = EntityType::new("SuperAdmin");

        let plain = manager.find_or_create_entity(&admin, None).await.unwrap();
        let aliased = manager
            .find_or_create_entity(&admin, Some("admin"))
            .await
            .unwrap();

        assert_eq!(plain.name_underscore(), "super_admin");
        assert_eq!(aliased.name_underscore(), "admin");
        assert_eq!(store.provision_count(&admin).await, 1);
    }

    #[tokio::test]
    async fn invalid_names_fail_before_touching_the_store() {
        let (manager, _) = manager_with(&[]).await;
        let err = manager
            .find_or_create_entity(&EntityType::new("not a type"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidEntityType { .. }));
    }

    #[tokio::test]
    async fn unprovisionable_types_are_configuration_errors() {
        let (manager, _) = manager_with(&["User"]).await;
        let ghost = EntityType::new("Ghost");

        let err = manager.find_or_create_entity(&ghost, None).await.unwrap_err();
        assert!(matches!(err, ConfigurationError::Unprovisionable { ref entity, .. } if entity == "Ghost"));
        assert!(!manager.provisioner.is_provisioned(&ghost).await);
    }

    #[tokio::test]
    async fn managers_sharing_a_provisioner_provision_once() {
        let store = Arc::new(MemoryEntityStore::new());
        let user = EntityType::new("User");
        store.declare(&user).await;
        let provisioner = Arc::new(TokenProvisioner::new(store.clone()));

        let posts = EntitiesManager::new(provisioner.clone(), Arc::new(Settings::default()));
        let comments = EntitiesManager::new(provisioner.clone(), Arc::new(Settings::default()));
        let a = posts.find_or_create_entity(&user, None).await.unwrap();
        let b = comments.find_or_create_entity(&user, None).await.unwrap();

        // Entities stay per manager; provisioning does not.
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(store.provision_count(&user).await, 1);
    }
}
