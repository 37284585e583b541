// src/environment.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Filesystem layout for one deployment environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub data_path: PathBuf,
    pub database_path: PathBuf,
    pub media_path: PathBuf,
    pub index_path: PathBuf,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    local: EnvironmentConfig,
    production: EnvironmentConfig,
}

impl EnvironmentConfig {
    /// Load configuration for the current environment from `config.yaml`,
    /// falling back to the built-in layout when the file is absent.
    pub fn load() -> Result<Self> {
        let environment = Self::environment_name();
        info!("Loading configuration for environment: {}", environment);

        let config_path = PathBuf::from("config.yaml");
        if config_path.exists() {
            Self::load_from_file(&config_path, &environment)
        } else {
            info!("config.yaml not found, using default paths");
            Self::defaults_for(&environment)
        }
    }

    pub fn environment_name() -> String {
        std::env::var("JOBPORTAL_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .unwrap_or_else(|_| "local".to_string())
    }

    pub fn is_production(environment: &str) -> bool {
        environment == "production"
    }

    pub fn load_from_file(config_path: &Path, environment: &str) -> Result<Self> {
        let config_content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config_file: ConfigFile = serde_yaml::from_str(&config_content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        let env_config = if Self::is_production(environment) {
            config_file.production
        } else {
            config_file.local
        };

        env_config.resolved()
    }

    pub fn defaults_for(environment: &str) -> Result<Self> {
        let base_dir = if Self::is_production(environment) {
            PathBuf::from("/app")
        } else {
            std::env::current_dir().context("Failed to get current directory")?
        };
        Ok(Self::under(&base_dir.join("data")))
    }

    /// Default layout rooted at `data_path`.
    pub fn under(data_path: &Path) -> Self {
        Self {
            data_path: data_path.to_path_buf(),
            database_path: data_path.join("jobportal.db"),
            media_path: data_path.join("media"),
            index_path: data_path.join("vectorstores").join("job_index.json"),
            log_file: None,
        }
    }

    fn resolved(self) -> Result<Self> {
        Ok(Self {
            data_path: resolve_path(&self.data_path)?,
            database_path: resolve_path(&self.database_path)?,
            media_path: resolve_path(&self.media_path)?,
            index_path: resolve_path(&self.index_path)?,
            log_file: self.log_file.as_deref().map(resolve_path).transpose()?,
        })
    }

    /// Ensure all configured directories exist
    pub async fn ensure_directories(&self) -> Result<()> {
        let mut dirs = vec![self.data_path.clone(), self.media_path.clone()];
        for file in [Some(&self.database_path), Some(&self.index_path), self.log_file.as_ref()]
            .into_iter()
            .flatten()
        {
            if let Some(parent) = file.parent() {
                dirs.push(parent.to_path_buf());
            }
        }

        for dir in dirs {
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        info!("All configured directories ensured to exist");
        Ok(())
    }
}

fn resolve_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Ok(current_dir.join(path))
    }
}
