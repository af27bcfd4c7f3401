/*
 * Responsibility
 * - PostsController actions
 *   - index: behind `authenticate_user_from_token!` (token or session)
 *   - public: excluded from the guard; reports the viewer when there is one
 */
use axum::Json;

use crate::api::v1::{
    dto::viewer::{ViewerResponse, VisitResponse},
    extractors::Current,
};
use crate::error::AppError;

pub async fn index(Current(current): Current) -> Result<Json<ViewerResponse>, AppError> {
    // The strict guard already ran; a missing user here means a miswired route.
    let user = current
        .get("user")
        .ok_or_else(|| AppError::unauthorized("user"))?;
    Ok(Json(user.into()))
}

pub async fn public(Current(current): Current) -> Json<VisitResponse> {
    let viewer = current.get("user").map(ViewerResponse::from);
    Json(VisitResponse {
        signed_in: viewer.is_some(),
        viewer,
    })
}
