//! Shared types, configuration, and the error taxonomy for the Regulatory
//! Assistant workspace.

pub mod config;
pub mod error;
pub mod types;

pub use config::AssistConfig;
pub use error::{AssistError, Result};
pub use types::*;
