//! HTTP surface of the regulatory assistant.
//!
//! A password login yields a bearer session token; every other route except
//! `/health` requires it. Routes cover the general chat, the document
//! browser, uploads and document chat, and transcript export.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
