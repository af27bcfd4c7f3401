pub mod entity_repo;
pub mod error;
