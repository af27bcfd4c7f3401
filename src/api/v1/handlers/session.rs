/*
 * Responsibility
 * - DELETE /session/{scope}: drop the cookie session stored for one scope
 *   (a token sign-in with TOKEN_AUTH_SIGN_IN_TOKEN=true creates one)
 */
use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
};

use crate::error::AppError;
use crate::services::token_auth::naming::validate_alias;
use crate::state::AppState;

pub async fn sign_out(
    State(state): State<AppState>,
    Path(scope): Path<String>,
    request: Request,
) -> Result<StatusCode, AppError> {
    let (parts, _) = request.into_parts();
    validate_alias(&scope).map_err(|_| AppError::bad_request("INVALID_SCOPE", "invalid scope"))?;

    let removed = state.session.sign_out(&scope, &parts).await.map_err(|err| {
        tracing::warn!(error = %err, scope = %scope, "sign out failed");
        AppError::Internal
    })?;

    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("session"))
    }
}
