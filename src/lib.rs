pub mod admin_cli;
pub mod analysis;
pub mod auth;
pub mod core;
pub mod environment;
pub mod error;
pub mod ingestion;
pub mod permissions;
pub mod recommendation;
pub mod repositories;
pub mod types;
pub mod utils;
pub mod web;

pub use crate::core::ConfigManager;
pub use web::{build_rocket, start_web_server, AppParts, AppState};
