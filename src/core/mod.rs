// src/core/mod.rs
//! Core services shared by the CLI, the web server and the background pipelines

pub mod config_manager;
pub mod database;
pub mod media_store;
pub mod service_client;

pub use config_manager::ConfigManager;
pub use database::Database;
pub use media_store::{MediaCategory, MediaStore};
pub use service_client::ServiceClient;
