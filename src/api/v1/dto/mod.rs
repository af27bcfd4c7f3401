pub mod tokens;
pub mod viewer;
