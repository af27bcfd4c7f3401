/*
 * Responsibility
 * - Admin::DashboardController#show (soft guard: anonymous visits allowed)
 * - Admin::TokensController#create (strict guard, exception fallback):
 *   issue a User's authentication token, generating one if missing
 */
use axum::{Json, extract::State, http::StatusCode};

use crate::api::v1::{
    dto::tokens::{IssueTokenRequest, IssueTokenResponse},
    dto::viewer::{ViewerResponse, VisitResponse},
    extractors::Current,
};
use crate::error::AppError;
use crate::services::token_auth::entity::EntityType;
use crate::services::token_auth::generator::ensure_authentication_token;
use crate::state::AppState;

pub async fn dashboard(Current(current): Current) -> Json<VisitResponse> {
    let viewer = current.get("super_admin").map(ViewerResponse::from);
    Json(VisitResponse {
        signed_in: viewer.is_some(),
        viewer,
    })
}

pub async fn issue_token(
    State(state): State<AppState>,
    Current(current): Current,
    Json(req): Json<IssueTokenRequest>,
) -> Result<(StatusCode, Json<IssueTokenResponse>), AppError> {
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_REQUEST", msg))?;

    let entity_type = EntityType::new("User");
    let field = state.settings.identifier_for(entity_type.name());
    let identifier = if state.settings.is_case_insensitive(field) {
        req.identifier.trim().to_lowercase()
    } else {
        req.identifier.trim().to_string()
    };

    let mut record = state
        .store
        .find_for_authentication(&entity_type, field, &identifier)
        .await?
        .ok_or(AppError::not_found("user"))?;

    let had_token = record
        .authentication_token
        .as_deref()
        .is_some_and(|t| !t.is_empty());
    let token = ensure_authentication_token(state.store.as_ref(), &entity_type, &mut record).await?;

    tracing::info!(
        issued_by = current.get("super_admin").map(|a| a.identifier.as_str()),
        record_id = %record.id,
        generated = !had_token,
        "user token issued"
    );

    let status = if had_token {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(IssueTokenResponse {
            id: record.id,
            identifier: record.identifier,
            authentication_token: token,
        }),
    ))
}
