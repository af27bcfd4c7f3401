//! Runs a handler's before-action callbacks ahead of one action.
//!
//! ```ignore
//! let index = middleware::token_auth::apply(get(posts::index), state.posts.clone(), "index");
//! router = router.route("/posts", index);
//! ```
//!
//! A denial short-circuits with `AppError` (401 JSON or 302 to sign-in).
//! A session created by a token sign-in is returned as `Set-Cookie`.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use crate::error::AppError;
use crate::services::session::IssuedSession;
use crate::services::token_auth::handler::TokenAuthenticationHandler;

#[derive(Clone)]
struct ActionContext {
    handler: Arc<TokenAuthenticationHandler>,
    action: &'static str,
}

pub fn apply<S>(
    route: MethodRouter<S>,
    handler: Arc<TokenAuthenticationHandler>,
    action: &'static str,
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.layer(middleware::from_fn_with_state(
        ActionContext { handler, action },
        before_action_middleware,
    ))
}

async fn before_action_middleware(
    State(ctx): State<ActionContext>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    if let Err(failure) = ctx.handler.run_before_actions(ctx.action, &mut parts).await {
        tracing::warn!(
            owner = ctx.handler.owner(),
            action = ctx.action,
            scope = %failure.scope,
            "request denied"
        );
        return Err(failure.into());
    }

    let issued = parts.extensions.get::<IssuedSession>().cloned();
    let mut response = next.run(Request::from_parts(parts, body)).await;

    if let Some(issued) = issued {
        match HeaderValue::from_str(&issued.set_cookie_value()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(err) => tracing::warn!(error = %err, "session cookie not representable"),
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::StatusCode, routing::get};
    use tower::ServiceExt;

    use crate::api::v1::extractors::Current;
    use crate::services::token_auth::entity::EntityType;
    use crate::services::token_auth::options::RegistrationOptions;
    use crate::services::token_auth::settings::Settings;
    use crate::services::token_auth::test_support::Fixture;

    async fn whoami(Current(current): Current) -> String {
        current
            .get("user")
            .map(|u| u.identifier.clone())
            .unwrap_or_else(|| "anonymous".into())
    }

    async fn posts_router(settings: Settings) -> Router {
        let fx = Fixture::with_settings(settings).await;
        fx.store
            .insert(&EntityType::new("User"), "alice@example.com", Some("alice-token"))
            .await
            .unwrap();

        let handler = Arc::new(fx.handler());
        handler
            .handle_token_authentication_for(
                &EntityType::new("User"),
                RegistrationOptions::new().except(["public"]),
            )
            .await
            .unwrap();

        Router::new()
            .route("/posts", apply(get(whoami), handler.clone(), "index"))
            .route("/posts/public", apply(get(whoami), handler, "public"))
    }

    fn get_request(uri: &str, headers: &[(&str, &str)]) -> Request {
        let mut builder = axum::http::Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn missing_credentials_are_rejected() {
        let app = posts_router(Settings::default()).await;

        let response = app.oneshot(get_request("/posts", &[])).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn html_requests_are_redirected_to_sign_in() {
        let app = posts_router(Settings::default()).await;

        let response = app
            .oneshot(get_request("/posts", &[("accept", "text/html")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/users/sign_in"
        );
    }

    #[tokio::test]
    async fn valid_token_reaches_the_action() {
        let app = posts_router(Settings::default()).await;

        let response = app
            .oneshot(get_request(
                "/posts",
                &[("X-User-Email", "alice@example.com"), ("X-User-Token", "alice-token")],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(body_text(response).await, "alice@example.com");
    }

    #[tokio::test]
    async fn excepted_actions_skip_the_guard() {
        let app = posts_router(Settings::default()).await;

        let response = app.oneshot(get_request("/posts/public", &[])).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn token_sign_in_can_issue_a_session_cookie() {
        let app = posts_router(Settings {
            sign_in_token: true,
            ..Settings::default()
        })
        .await;

        let first = app
            .clone()
            .oneshot(get_request(
                "/posts?user_email=alice@example.com&user_token=alice-token",
                &[],
            ))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let set_cookie = first
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let cookie = set_cookie.split(';').next().unwrap().to_string();

        let second = app
            .oneshot(get_request("/posts", &[("cookie", cookie.as_str())]))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(body_text(second).await, "alice@example.com");
    }
}
