// src/ingestion/mod.rs
//! Background resume processing: extract text from the uploaded file, then
//! ask the language model for a structured analysis.

pub mod text_extractor;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use crate::analysis::ResumeAnalyzer;
use crate::core::{Database, MediaStore};
use crate::repositories::ResumeRepository;
use crate::types::ProcessingStatus;

pub use text_extractor::{ResumeTextExtractor, TextExtractor};

const QUEUE_CAPACITY: usize = 256;

/// Everything a worker needs to process one resume.
pub struct PipelineContext {
    pub db: Database,
    pub media: MediaStore,
    pub extractor: Arc<dyn TextExtractor>,
    pub analyzer: ResumeAnalyzer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    NotFound,
    /// No file attached; the resume stays pending.
    Skipped,
    Completed,
    Failed(String),
    /// A newer upload replaced the file while this run was in flight.
    Superseded,
}

/// Queue of resume ids drained by a bounded pool of workers.
#[derive(Clone)]
pub struct ResumePipeline {
    sender: mpsc::Sender<i64>,
    context: Arc<PipelineContext>,
}

impl ResumePipeline {
    /// Spawn the dispatcher. At most `workers` resumes are processed at once.
    pub fn start(context: PipelineContext, workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let context = Arc::new(context);
        let workers = workers.max(1);

        tokio::spawn(run_dispatcher(context.clone(), receiver, workers));
        info!("Resume pipeline started with {} workers", workers);

        Self { sender, context }
    }

    pub async fn enqueue(&self, resume_id: i64) -> Result<()> {
        self.sender
            .send(resume_id)
            .await
            .context("Resume pipeline is not running")?;
        debug!("Queued resume {} for processing", resume_id);
        Ok(())
    }

    /// Re-queue resumes whose processing was interrupted, e.g. by a restart.
    pub async fn requeue_unfinished(&self) -> Result<usize> {
        let ids = ResumeRepository::new(self.context.db.pool())
            .list_unfinished_ids()
            .await?;
        for id in &ids {
            self.enqueue(*id).await?;
        }
        if !ids.is_empty() {
            info!("Re-queued {} unfinished resumes", ids.len());
        }
        Ok(ids.len())
    }
}

async fn run_dispatcher(context: Arc<PipelineContext>, mut receiver: mpsc::Receiver<i64>, workers: usize) {
    let permits = Arc::new(Semaphore::new(workers));

    while let Some(resume_id) = receiver.recv().await {
        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let context = context.clone();
        tokio::spawn(async move {
            let outcome = process_resume(&context, resume_id).await;
            debug!("Resume {} finished with {:?}", resume_id, outcome);
            drop(permit);
        });
    }

    info!("Resume pipeline stopped");
}

/// Run both stages for one resume. Extracted text is stored before analysis
/// starts, so it survives a failed analysis.
pub async fn process_resume(context: &PipelineContext, resume_id: i64) -> ProcessOutcome {
    let resumes = ResumeRepository::new(context.db.pool());

    let resume = match resumes.find_by_id(resume_id).await {
        Ok(Some(resume)) => resume,
        Ok(None) => {
            warn!("Resume {} disappeared before processing", resume_id);
            return ProcessOutcome::NotFound;
        }
        Err(e) => {
            error!("Failed to load resume {}: {:#}", resume_id, e);
            return ProcessOutcome::Failed(e.to_string());
        }
    };
    let Some(file) = resume.file.clone() else {
        info!("Resume {} has no file, skipping", resume_id);
        return ProcessOutcome::Skipped;
    };

    match run_stages(context, &resumes, resume_id, &file).await {
        Ok(true) => {
            info!("Resume {} processed", resume_id);
            ProcessOutcome::Completed
        }
        Ok(false) => superseded(resume_id, &file),
        Err(e) => {
            let message = format!("{:#}", e);
            match resumes
                .set_status(resume_id, &file, ProcessingStatus::Failed, Some(&message))
                .await
            {
                Ok(false) => return superseded(resume_id, &file),
                Ok(true) => {}
                Err(update_err) => {
                    error!("Could not record failure for resume {}: {:#}", resume_id, update_err)
                }
            }
            error!("Processing resume {} failed: {}", resume_id, message);
            ProcessOutcome::Failed(message)
        }
    }
}

fn superseded(resume_id: i64, file: &str) -> ProcessOutcome {
    info!("Resume {} no longer points at {}, dropping stale run", resume_id, file);
    ProcessOutcome::Superseded
}

/// `Ok(false)` as soon as a write finds the resume pointing at another file.
async fn run_stages(
    context: &PipelineContext,
    resumes: &ResumeRepository<'_>,
    resume_id: i64,
    file: &str,
) -> Result<bool> {
    if !resumes
        .set_status(resume_id, file, ProcessingStatus::Extracting, None)
        .await?
    {
        return Ok(false);
    }

    let data = context.media.read(file).await?;
    let text = context.extractor.extract(&data, file).await?;
    if text.trim().is_empty() {
        anyhow::bail!("No extractable text found in {}", file);
    }
    if !resumes.save_extracted_text(resume_id, file, &text).await? {
        return Ok(false);
    }

    if !resumes
        .set_status(resume_id, file, ProcessingStatus::Analyzing, None)
        .await?
    {
        return Ok(false);
    }
    let analysis = context.analyzer.analyze_resume(&text).await?;
    let analysis_json =
        serde_json::to_string(&analysis).context("Failed to serialize resume analysis")?;
    resumes.save_analysis(resume_id, file, &analysis_json).await
}
