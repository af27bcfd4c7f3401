/*
 * Responsibility
 * - Request/response DTO for issuing an entity's authentication token
 */
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct IssueTokenRequest {
    /// Value of the User identifier field (email unless configured otherwise).
    pub identifier: String,
}

impl IssueTokenRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.identifier.trim().is_empty() {
            return Err("identifier is required");
        }
        if self.identifier.len() > 256 {
            return Err("identifier must be <= 256 chars");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct IssueTokenResponse {
    pub id: Uuid,
    pub identifier: String,
    pub authentication_token: String,
}
