//! Token authentication for entity types (User, SuperAdmin, ...) layered on a
//! session fallback, plus the axum demo server that exercises it.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod repos;
pub mod services;
pub mod state;
