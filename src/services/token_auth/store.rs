//! Entity storage interface used by provisioning, lookups, and token generation.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::repos::error::{StoreError, StoreResult};
use crate::services::token_auth::entity::EntityType;

/// A stored authenticatable record, reduced to what token authentication needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: Uuid,
    pub identifier: String,
    pub authentication_token: Option<String>,
}

/// Persistence collaborator for authenticatable entities.
///
/// Implementations must be safe to share across requests (`Arc<dyn EntityStore>`).
#[async_trait]
pub trait EntityStore: Send + Sync {
    // Returns the backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Adds whatever the backend needs for `entity_type` to hold a token.
    // Must be idempotent, but callers only invoke it once per type.
    async fn provision_token_storage(&self, entity_type: &EntityType) -> StoreResult<()>;

    async fn find_for_authentication(
        &self,
        entity_type: &EntityType,
        identifier_field: &str,
        identifier: &str,
    ) -> StoreResult<Option<EntityRecord>>;

    async fn token_taken(&self, entity_type: &EntityType, token: &str) -> StoreResult<bool>;

    async fn set_authentication_token(
        &self,
        entity_type: &EntityType,
        id: Uuid,
        token: &str,
    ) -> StoreResult<()>;
}

#[derive(Debug, Default)]
struct MemoryTable {
    provision_count: usize,
    records: Vec<EntityRecord>,
}

impl MemoryTable {
    fn provisioned(&self) -> bool {
        self.provision_count > 0
    }
}

/// In-process store. Types must be declared before they can be provisioned;
/// records are matched on their single identifier value.
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    tables: RwLock<HashMap<String, MemoryTable>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn declare(&self, entity_type: &EntityType) {
        self.tables
            .write()
            .await
            .entry(entity_type.name().to_string())
            .or_default();
    }

    pub async fn insert(
        &self,
        entity_type: &EntityType,
        identifier: impl Into<String>,
        authentication_token: Option<&str>,
    ) -> StoreResult<EntityRecord> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(entity_type.name())
            .ok_or_else(|| StoreError::UnknownEntityType(entity_type.name().to_string()))?;

        let record = EntityRecord {
            id: Uuid::new_v4(),
            identifier: identifier.into(),
            authentication_token: authentication_token.map(str::to_string),
        };
        table.records.push(record.clone());
        Ok(record)
    }

    pub async fn provision_count(&self, entity_type: &EntityType) -> usize {
        self.tables
            .read()
            .await
            .get(entity_type.name())
            .map(|t| t.provision_count)
            .unwrap_or(0)
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn provision_token_storage(&self, entity_type: &EntityType) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(entity_type.name())
            .ok_or_else(|| StoreError::UnknownEntityType(entity_type.name().to_string()))?;
        table.provision_count += 1;
        Ok(())
    }

    async fn find_for_authentication(
        &self,
        entity_type: &EntityType,
        _identifier_field: &str,
        identifier: &str,
    ) -> StoreResult<Option<EntityRecord>> {
        let tables = self.tables.read().await;
        let table = provisioned_table(&tables, entity_type)?;

        Ok(table
            .records
            .iter()
            .find(|r| r.identifier == identifier)
            .cloned())
    }

    async fn token_taken(&self, entity_type: &EntityType, token: &str) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        let table = provisioned_table(&tables, entity_type)?;

        Ok(table
            .records
            .iter()
            .any(|r| r.authentication_token.as_deref() == Some(token)))
    }

    async fn set_authentication_token(
        &self,
        entity_type: &EntityType,
        id: Uuid,
        token: &str,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(entity_type.name())
            .filter(|t| t.provisioned())
            .ok_or_else(|| StoreError::NotProvisioned(entity_type.name().to_string()))?;

        let record = table
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::RecordNotFound(id))?;
        record.authentication_token = Some(token.to_string());
        Ok(())
    }
}

fn provisioned_table<'a>(
    tables: &'a HashMap<String, MemoryTable>,
    entity_type: &EntityType,
) -> StoreResult<&'a MemoryTable> {
    tables
        .get(entity_type.name())
        .filter(|t| t.provisioned())
        .ok_or_else(|| StoreError::NotProvisioned(entity_type.name().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn undeclared_types_cannot_be_provisioned() {
        let store = MemoryEntityStore::new();
        let err = store
            .provision_token_storage(&EntityType::new("Ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownEntityType(name) if name == "Ghost"));
    }

    #[tokio::test]
    async fn lookups_require_provisioning() {
        let store = MemoryEntityStore::new();
        let user = EntityType::new("User");
        store.declare(&user).await;
        store.insert(&user, "a@example.com", Some("tok")).await.unwrap();

        assert!(matches!(
            store.find_for_authentication(&user, "email", "a@example.com").await,
            Err(StoreError::NotProvisioned(_))
        ));

        store.provision_token_storage(&user).await.unwrap();
        let found = store
            .find_for_authentication(&user, "email", "a@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.authentication_token.as_deref(), Some("tok"));
        assert!(store.token_taken(&user, "tok").await.unwrap());
        assert!(!store.token_taken(&user, "other").await.unwrap());
    }

    #[tokio::test]
    async fn set_authentication_token_updates_the_record() {
        let store = MemoryEntityStore::new();
        let user = EntityType::new("User");
        store.declare(&user).await;
        store.provision_token_storage(&user).await.unwrap();
        let record = store.insert(&user, "a@example.com", None).await.unwrap();

        store
            .set_authentication_token(&user, record.id, "fresh")
            .await
            .unwrap();
        assert!(store.token_taken(&user, "fresh").await.unwrap());

        let missing = store
            .set_authentication_token(&user, Uuid::new_v4(), "x")
            .await;
        assert!(matches!(missing, Err(StoreError::RecordNotFound(_))));
    }
}
