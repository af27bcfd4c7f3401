pub mod cache;
pub mod session;
pub mod token_auth;
