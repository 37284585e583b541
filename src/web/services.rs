// src/web/services.rs
//! Shared application state and the wiring of outbound service clients

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::analysis::{LanguageModel, OpenAiChatClient, ResumeAnalyzer};
use crate::core::config_manager::{AuthSettings, ServiceConfig};
use crate::core::{ConfigManager, Database, MediaStore, ServiceClient};
use crate::ingestion::{PipelineContext, ResumePipeline, ResumeTextExtractor, TextExtractor};
use crate::recommendation::{
    EmbeddingModel, IndexBuilder, IndexReport, JobIndex, JobRecommender, OllamaEmbeddingClient,
    SharedIndex,
};
use crate::web::types::IndexStatusView;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

pub fn language_model(service: &ServiceConfig) -> Result<Arc<dyn LanguageModel>> {
    if service.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY not set, resume analysis requests will likely be rejected");
    }
    let client = ServiceClient::new(&service.llm_api_url, service.timeout_seconds)?
        .with_bearer_token(service.openai_api_key.clone())
        .with_retry(RETRY_ATTEMPTS, RETRY_BACKOFF);
    Ok(Arc::new(OpenAiChatClient::new(client, service.llm_model.clone())))
}

pub fn embedding_model(service: &ServiceConfig) -> Result<Arc<dyn EmbeddingModel>> {
    let client = ServiceClient::new(&service.embedding_api_url, service.timeout_seconds)?
        .with_retry(RETRY_ATTEMPTS, RETRY_BACKOFF);
    Ok(Arc::new(OllamaEmbeddingClient::new(
        client,
        service.embedding_model.clone(),
        service.embedding_batch_size,
    )))
}

/// Everything needed to assemble an [`AppState`].
pub struct AppParts {
    pub db: Database,
    pub media: MediaStore,
    pub auth: AuthSettings,
    pub language_model: Arc<dyn LanguageModel>,
    pub embedder: Arc<dyn EmbeddingModel>,
    pub extractor: Arc<dyn TextExtractor>,
    pub index_path: PathBuf,
    pub recommendation_k: usize,
    pub fit_analysis_enabled: bool,
    pub pipeline_workers: usize,
}

/// Managed by Rocket; handlers and guards reach every service through it.
pub struct AppState {
    pub db: Database,
    pub media: MediaStore,
    pub auth: AuthSettings,
    pub analyzer: ResumeAnalyzer,
    pub embedder: Arc<dyn EmbeddingModel>,
    pub index: SharedIndex,
    pub index_path: PathBuf,
    pub pipeline: ResumePipeline,
    pub recommendation_k: usize,
    pub fit_analysis_enabled: bool,
    rebuild_lock: Mutex<()>,
}

impl AppState {
    /// Load a previously built index, start the resume pipeline and re-queue
    /// resumes left unfinished by the last run.
    pub async fn assemble(parts: AppParts) -> Result<Self> {
        let analyzer = ResumeAnalyzer::new(parts.language_model);

        let index = match JobIndex::load_if_present(&parts.index_path).await {
            Ok(index) => index,
            Err(e) => {
                warn!("Ignoring unreadable job index: {:#}", e);
                None
            }
        };
        // Vectors from another embedding model are not comparable with new queries.
        let current_model = parts.embedder.model_name();
        let index = index.filter(|index| {
            if index.model != current_model {
                warn!(
                    "Ignoring job index built with embedding model '{}' (configured: '{}'); rebuild it",
                    index.model, current_model
                );
                return false;
            }
            true
        });
        if index.is_none() {
            info!("No job index yet; recommendations are unavailable until it is built");
        }

        let pipeline = ResumePipeline::start(
            PipelineContext {
                db: parts.db.clone(),
                media: parts.media.clone(),
                extractor: parts.extractor,
                analyzer: analyzer.clone(),
            },
            parts.pipeline_workers,
        );
        pipeline.requeue_unfinished().await?;

        Ok(Self {
            db: parts.db,
            media: parts.media,
            auth: parts.auth,
            analyzer,
            embedder: parts.embedder,
            index: Arc::new(RwLock::new(index)),
            index_path: parts.index_path,
            pipeline,
            recommendation_k: parts.recommendation_k,
            fit_analysis_enabled: parts.fit_analysis_enabled,
            rebuild_lock: Mutex::new(()),
        })
    }

    pub async fn from_config(config: &ConfigManager) -> Result<Self> {
        config.ensure_directories().await?;

        let db = Database::connect(&config.environment.database_path)
            .await
            .context("Failed to initialize database")?;

        Self::assemble(AppParts {
            db,
            media: MediaStore::new(config.environment.media_path.clone()),
            auth: config.auth.clone(),
            language_model: language_model(&config.service)?,
            embedder: embedding_model(&config.service)?,
            extractor: Arc::new(ResumeTextExtractor),
            index_path: config.environment.index_path.clone(),
            recommendation_k: config.service.recommendation_k,
            fit_analysis_enabled: config.service.fit_analysis_enabled,
            pipeline_workers: config.service.pipeline_workers,
        })
        .await
    }

    pub fn recommender(&self) -> JobRecommender {
        let analyzer = self.fit_analysis_enabled.then(|| self.analyzer.clone());
        JobRecommender::new(
            self.db.clone(),
            self.embedder.clone(),
            analyzer,
            self.index.clone(),
        )
    }

    /// Rebuild the job index and swap it in. Concurrent rebuilds run one at a time.
    pub async fn rebuild_index(&self) -> Result<Option<IndexReport>> {
        let _guard = self.rebuild_lock.lock().await;

        let built = IndexBuilder::new(self.db.clone(), self.embedder.clone())
            .build(&self.index_path)
            .await?;

        match built {
            Some((index, report)) => {
                *self.index.write().await = Some(index);
                info!(
                    "Job index rebuilt: {} jobs, {} chunks",
                    report.jobs, report.chunks
                );
                Ok(Some(report))
            }
            None => Ok(None),
        }
    }

    pub async fn index_status(&self) -> IndexStatusView {
        let guard = self.index.read().await;
        match guard.as_ref() {
            Some(index) => IndexStatusView {
                built: true,
                entries: index.len(),
                jobs: index.key_count(),
                model: Some(index.model.clone()),
                dimensions: Some(index.dimensions),
                built_at: Some(index.built_at),
            },
            None => IndexStatusView {
                built: false,
                entries: 0,
                jobs: 0,
                model: None,
                dimensions: None,
                built_at: None,
            },
        }
    }
}
