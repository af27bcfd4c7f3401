use thiserror::Error;

/// Entity storage failures (provisioning, lookups, token writes).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("db error")]
    Db(#[from] sqlx::Error),

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("token storage is not provisioned for {0}")]
    NotProvisioned(String),

    #[error("record not found: {0}")]
    RecordNotFound(uuid::Uuid),

    #[error("invalid column name: {0:?}")]
    InvalidColumn(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
