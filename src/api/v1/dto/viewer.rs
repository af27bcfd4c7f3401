/*
 * Responsibility
 * - Response DTO describing who is signed in on the request
 */
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::services::session::SignedIn;

#[derive(Debug, Serialize)]
pub struct ViewerResponse {
    pub scope: String,
    pub id: Uuid,
    pub identifier: String,
    pub via_token: bool,
    pub signed_in_at: DateTime<Utc>,
}

impl From<&SignedIn> for ViewerResponse {
    fn from(s: &SignedIn) -> Self {
        Self {
            scope: s.scope.clone(),
            id: s.record_id,
            identifier: s.identifier.clone(),
            via_token: s.via_token,
            signed_in_at: s.signed_in_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VisitResponse {
    pub signed_in: bool,
    pub viewer: Option<ViewerResponse>,
}
