// src/core/config_manager.rs
//! Unified configuration: filesystem layout plus service settings from the environment

use anyhow::{Context, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::str::FromStr;
use tracing::{info, warn};

use crate::environment::EnvironmentConfig;

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub environment_name: String,
    pub environment: EnvironmentConfig,
    pub service: ServiceConfig,
    pub auth: AuthSettings,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub llm_api_url: String,
    pub openai_api_key: Option<String>,
    pub llm_model: String,
    pub embedding_api_url: String,
    pub embedding_model: String,
    pub embedding_batch_size: usize,
    pub recommendation_k: usize,
    pub fit_analysis_enabled: bool,
    pub pipeline_workers: usize,
    pub timeout_seconds: u64,
}

#[derive(Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .finish()
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", key, raw, e)),
        _ => Ok(default),
    }
}

fn string_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl ServiceConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            port: parse_or(&lookup, "ROCKET_PORT", 8000)?,
            llm_api_url: string_or(&lookup, "LLM_API_URL", "https://api.openai.com"),
            openai_api_key: lookup("OPENAI_API_KEY").filter(|key| !key.trim().is_empty()),
            llm_model: string_or(&lookup, "LLM_MODEL", "gpt-4-turbo"),
            embedding_api_url: string_or(&lookup, "EMBEDDING_API_URL", "http://127.0.0.1:11434"),
            embedding_model: string_or(&lookup, "EMBEDDING_MODEL", "all-minilm"),
            embedding_batch_size: parse_or(&lookup, "EMBEDDING_BATCH_SIZE", 32usize)?.max(1),
            recommendation_k: parse_or(&lookup, "RECOMMENDATION_K", 5usize)?.max(1),
            fit_analysis_enabled: parse_or(&lookup, "RECOMMENDATION_FIT_ANALYSIS", true)?,
            pipeline_workers: parse_or(&lookup, "PIPELINE_WORKERS", 2usize)?.max(1),
            timeout_seconds: parse_or(&lookup, "SERVICE_TIMEOUT_SECONDS", 120u64)?,
        })
    }
}

impl AuthSettings {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>, production: bool) -> Result<Self> {
        let jwt_secret = match lookup("JWT_SECRET").filter(|secret| !secret.trim().is_empty()) {
            Some(secret) => secret,
            None if production => anyhow::bail!("JWT_SECRET must be set in production"),
            None => {
                warn!("JWT_SECRET not set, using a random secret; tokens will not survive restarts");
                rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(48)
                    .map(char::from)
                    .collect()
            }
        };

        Ok(Self {
            jwt_secret,
            token_ttl_hours: parse_or(&lookup, "TOKEN_TTL_HOURS", 24i64)?.max(1),
        })
    }
}

impl ConfigManager {
    /// Load all configurations
    pub fn load() -> Result<Self> {
        let environment_name = EnvironmentConfig::environment_name();
        let environment = EnvironmentConfig::load()?;
        let lookup = |key: &str| std::env::var(key).ok();
        let service = ServiceConfig::from_lookup(lookup).context("Invalid service settings")?;
        let auth = AuthSettings::from_lookup(
            lookup,
            EnvironmentConfig::is_production(&environment_name),
        )?;

        info!(
            "Configuration loaded: database {}, media {}, llm model {}, embedding model {}",
            environment.database_path.display(),
            environment.media_path.display(),
            service.llm_model,
            service.embedding_model
        );

        Ok(Self {
            environment_name,
            environment,
            service,
            auth,
        })
    }

    /// Ensure all required directories exist
    pub async fn ensure_directories(&self) -> Result<()> {
        self.environment.ensure_directories().await
    }
}
