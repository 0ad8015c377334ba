//! Request middleware: authentication extractors and auth cookies.

pub mod auth;
pub mod cookies;

pub use auth::{RequireAdmin, RequireAuth};
