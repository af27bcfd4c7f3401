//! Transport middleware shared by every route.
//!
//! Order, outermost first: error mapping, request id, trace span, body limit, timeout.
//! The trace span carries the request id so token-auth denials logged inside
//! a request can be matched to the access log line.

use axum::{
    Router,
    error_handling::HandleErrorLayer,
    extract::Request,
    http::HeaderName,
    response::{IntoResponse, Response},
};
use tower::{BoxError, ServiceBuilder, timeout::TimeoutLayer, timeout::error::Elapsed};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::config::Config;
use crate::error::AppError;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub fn apply(router: Router, config: &Config) -> Router {
    let stack = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(map_layer_error))
        .layer(SetRequestIdLayer::new(REQUEST_ID, MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
        .layer(TimeoutLayer::new(config.request_timeout));

    router.layer(stack)
}

fn request_span(request: &Request) -> Span {
    let request_id = request
        .headers()
        .get(&REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id,
    )
}

async fn map_layer_error(err: BoxError) -> Response {
    if err.is::<Elapsed>() {
        tracing::warn!("request exceeded the configured timeout");
        AppError::Timeout.into_response()
    } else {
        tracing::error!(error = %err, "unhandled middleware error");
        AppError::Internal.into_response()
    }
}
