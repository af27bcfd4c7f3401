use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::services::session::CurrentEntities;

/// Hands `CurrentEntities` to a handler.
/// Guards insert it into request extensions; a request nobody signed in on
/// gets an empty set, so soft-guarded actions still run.
pub struct Current(pub CurrentEntities);

impl<S> FromRequestParts<S> for Current
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Current(
            parts
                .extensions
                .get::<CurrentEntities>()
                .cloned()
                .unwrap_or_default(),
        ))
    }
}
