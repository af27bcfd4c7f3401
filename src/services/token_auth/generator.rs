//! Authentication token generation for stored records.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use thiserror::Error;
use tracing::{debug, warn};

use crate::repos::error::StoreError;
use crate::services::token_auth::entity::EntityType;
use crate::services::token_auth::store::{EntityRecord, EntityStore};

// 15 random bytes -> 20 URL-safe characters.
const TOKEN_BYTES: usize = 15;
const MAX_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("random source unavailable: {0}")]
    Random(getrandom::Error),

    #[error("no unused token after {0} attempts")]
    Exhausted(usize),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A 20-character URL-safe token without the easily confused `l`, `I`, `O`, `0`.
pub fn friendly_token() -> Result<String, TokenError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::fill(&mut bytes).map_err(TokenError::Random)?;

    Ok(URL_SAFE_NO_PAD
        .encode(bytes)
        .chars()
        .map(|c| match c {
            'l' => 's',
            'I' => 'x',
            'O' => 'y',
            '0' => 'z',
            c => c,
        })
        .collect())
}

/// Gives `record` a token unless it already has one, retrying until the
/// token is unused for this entity type, and persists it.
pub async fn ensure_authentication_token(
    store: &dyn EntityStore,
    entity_type: &EntityType,
    record: &mut EntityRecord,
) -> Result<String, TokenError> {
    if let Some(token) = record.authentication_token.as_deref().filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }

    for attempt in 1..=MAX_ATTEMPTS {
        let token = friendly_token()?;
        if store.token_taken(entity_type, &token).await? {
            debug!(entity = %entity_type, attempt, "generated token already taken");
            continue;
        }

        store
            .set_authentication_token(entity_type, record.id, &token)
            .await?;
        record.authentication_token = Some(token.clone());
        return Ok(token);
    }

    warn!(entity = %entity_type, "could not generate an unused authentication token");
    Err(TokenError::Exhausted(MAX_ATTEMPTS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::token_auth::store::MemoryEntityStore;

    #[test]
    fn friendly_tokens_are_twenty_url_safe_chars() {
        for _ in 0..50 {
            let token = friendly_token().unwrap();
            assert_eq!(token.len(), 20);
            assert!(
                token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            );
            assert!(!token.contains(&['l', 'I', 'O', '0'][..]));
        }
    }

    #[test]
    fn friendly_tokens_differ() {
        assert_ne!(friendly_token().unwrap(), friendly_token().unwrap());
    }

    #[tokio::test]
    async fn missing_token_is_generated_and_persisted() {
        let store = MemoryEntityStore::new();
        let user = EntityType::new("User");
        store.declare(&user).await;
        store.provision_token_storage(&user).await.unwrap();
        let mut record = store.insert(&user, "a@example.com", None).await.unwrap();

        let token = ensure_authentication_token(&store, &user, &mut record)
            .await
            .unwrap();

        assert_eq!(record.authentication_token.as_deref(), Some(token.as_str()));
        let stored = store
            .find_for_authentication(&user, "email", "a@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.authentication_token, Some(token));
    }

    #[tokio::test]
    async fn existing_token_is_kept() {
        let store = MemoryEntityStore::new();
        let user = EntityType::new("User");
        store.declare(&user).await;
        store.provision_token_storage(&user).await.unwrap();
        let mut record = store
            .insert(&user, "a@example.com", Some("kept-token"))
            .await
            .unwrap();

        let token = ensure_authentication_token(&store, &user, &mut record)
            .await
            .unwrap();
        assert_eq!(token, "kept-token");
    }

    #[tokio::test]
    async fn unprovisioned_type_surfaces_store_error() {
        let store = MemoryEntityStore::new();
        let user = EntityType::new("User");
        store.declare(&user).await;
        let mut record = store.insert(&user, "a@example.com", None).await.unwrap();

        let err = ensure_authentication_token(&store, &user, &mut record)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Store(StoreError::NotProvisioned(_))));
    }
}
