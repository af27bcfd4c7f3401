/*
 * Responsibility
 * - Public interface of the middleware layer
 * - http::apply (transport concerns), token_auth::apply (per-action before-action callbacks)
 */
pub mod http;
pub mod token_auth;
