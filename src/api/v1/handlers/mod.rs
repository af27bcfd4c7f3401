pub mod admin;
pub mod health;
pub mod posts;
pub mod session;
