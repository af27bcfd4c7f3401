/*
 * Responsibility
 * - PostgreSQL-backed EntityStore (SQLx)
 * - Provisioning adds the authentication_token column + unique index to the entity table
 * - Table names come from EntityType (validated CamelCase), identifier columns are checked here
 */
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::{StoreError, StoreResult};
use crate::services::token_auth::entity::EntityType;
use crate::services::token_auth::store::{EntityRecord, EntityStore};

#[derive(Debug, FromRow)]
struct EntityRow {
    id: Uuid,
    identifier: String,
    authentication_token: Option<String>,
}

impl From<EntityRow> for EntityRecord {
    fn from(row: EntityRow) -> Self {
        Self {
            id: row.id,
            identifier: row.identifier,
            authentication_token: row.authentication_token,
        }
    }
}

/// Expects one table per entity type (`users`, `super_admins`) with a `uuid` `id` column.
#[derive(Clone, Debug)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn provision_token_storage(&self, entity_type: &EntityType) -> StoreResult<()> {
        let table = entity_type.table_name();

        // Fails with undefined_table when the entity has no backing table.
        sqlx::query(&format!(
            r#"ALTER TABLE "{table}" ADD COLUMN IF NOT EXISTS authentication_token TEXT"#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS "index_{table}_on_authentication_token"
            ON "{table}" (authentication_token)
            "#
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_for_authentication(
        &self,
        entity_type: &EntityType,
        identifier_field: &str,
        identifier: &str,
    ) -> StoreResult<Option<EntityRecord>> {
        let table = entity_type.table_name();
        let column = checked_column(identifier_field)?;

        let row = sqlx::query_as::<_, EntityRow>(&format!(
            r#"
            SELECT id, "{column}"::text AS identifier, authentication_token
            FROM "{table}"
            WHERE "{column}" = $1
            LIMIT 1
            "#
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(EntityRecord::from))
    }

    async fn token_taken(&self, entity_type: &EntityType, token: &str) -> StoreResult<bool> {
        let table = entity_type.table_name();

        let taken = sqlx::query_scalar::<_, bool>(&format!(
            r#"SELECT EXISTS (SELECT 1 FROM "{table}" WHERE authentication_token = $1)"#
        ))
        .bind(token)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    async fn set_authentication_token(
        &self,
        entity_type: &EntityType,
        id: Uuid,
        token: &str,
    ) -> StoreResult<()> {
        let table = entity_type.table_name();

        let result = sqlx::query(&format!(
            r#"UPDATE "{table}" SET authentication_token = $2 WHERE id = $1"#
        ))
        .bind(id)
        .bind(token)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RecordNotFound(id));
        }
        Ok(())
    }
}

// Identifier columns are interpolated into SQL, so only plain snake_case names pass.
fn checked_column(name: &str) -> StoreResult<&str> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(name)
    } else {
        Err(StoreError::InvalidColumn(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_columns_are_checked() {
        assert_eq!(checked_column("email").unwrap(), "email");
        assert_eq!(checked_column("user_name2").unwrap(), "user_name2");
        assert!(checked_column("email\"; DROP TABLE users; --").is_err());
        assert!(checked_column("Email").is_err());
        assert!(checked_column("").is_err());
    }
}
