// src/recommendation/recommender.rs
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::embeddings::EmbeddingModel;
use super::SharedIndex;
use crate::analysis::{FitAnalysis, ResumeAnalysis, ResumeAnalyzer};
use crate::core::Database;
use crate::repositories::{JobRepository, ResumeRepository};
use crate::types::{Job, Resume};
use crate::utils::truncate_chars;

/// Characters of raw resume text used as the query when no analysis exists.
pub const QUERY_TEXT_CHARS: usize = 4_000;

/// Candidates fetched from the index per requested result, to survive filtering.
const OVERSAMPLE: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum RecommendationError {
    #[error("No processed resume found for this candidate. Upload a resume first.")]
    NoResume,
    #[error("Job index has not been built yet")]
    NoIndex,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct Recommendation {
    pub job: Job,
    pub score: f32,
    pub fit_analysis: Option<FitAnalysis>,
}

/// Text describing the candidate: analysis summary and skills when present,
/// otherwise the start of the extracted resume text.
pub fn candidate_query_text(resume: &Resume) -> Option<String> {
    let analysis = resume
        .ai_analysis
        .as_deref()
        .and_then(ResumeAnalysis::from_stored)
        .filter(|analysis| !analysis.is_empty());

    if let Some(analysis) = analysis {
        return Some(analysis.profile_text());
    }

    resume
        .extracted_text
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| truncate_chars(text, QUERY_TEXT_CHARS).to_string())
}

#[derive(Clone)]
pub struct JobRecommender {
    db: Database,
    embedder: Arc<dyn EmbeddingModel>,
    analyzer: Option<ResumeAnalyzer>,
    index: SharedIndex,
}

impl JobRecommender {
    pub fn new(
        db: Database,
        embedder: Arc<dyn EmbeddingModel>,
        analyzer: Option<ResumeAnalyzer>,
        index: SharedIndex,
    ) -> Self {
        Self {
            db,
            embedder,
            analyzer,
            index,
        }
    }

    /// Query text for the candidate's preferred resume.
    pub async fn candidate_profile(&self, candidate_id: i64) -> Result<String, RecommendationError> {
        let resume = ResumeRepository::new(self.db.pool())
            .preferred_for_candidate(candidate_id)
            .await?
            .ok_or(RecommendationError::NoResume)?;

        candidate_query_text(&resume).ok_or(RecommendationError::NoResume)
    }

    pub async fn recommend(
        &self,
        candidate_id: i64,
        k: usize,
    ) -> Result<Vec<Recommendation>, RecommendationError> {
        let query_text = self.candidate_profile(candidate_id).await?;

        if self.index.read().await.is_none() {
            return Err(RecommendationError::NoIndex);
        }

        let query = self.embedder.embed_one(&query_text).await?;
        let hits = {
            let guard = self.index.read().await;
            let index = guard.as_ref().ok_or(RecommendationError::NoIndex)?;
            index.search(&query, k.saturating_mul(OVERSAMPLE))?
        };
        debug!("Candidate {} matched {} indexed jobs", candidate_id, hits.len());

        let jobs = JobRepository::new(self.db.pool());
        let mut recommendations = Vec::with_capacity(k);
        for hit in hits {
            if recommendations.len() >= k {
                break;
            }
            let Ok(job_id) = hit.key.parse::<i64>() else {
                warn!("Ignoring index entry with non-numeric key {}", hit.key);
                continue;
            };
            let Some(job) = jobs.find_by_id(job_id).await? else {
                continue;
            };
            if !job.is_open() {
                continue;
            }

            let fit_analysis = self.fit_for(&query_text, &job).await;
            recommendations.push(Recommendation {
                job,
                score: hit.score,
                fit_analysis,
            });
        }

        info!(
            "Recommended {} jobs to candidate {}",
            recommendations.len(),
            candidate_id
        );
        Ok(recommendations)
    }

    /// A failed fit analysis only drops the analysis for that job.
    async fn fit_for(&self, profile: &str, job: &Job) -> Option<FitAnalysis> {
        let analyzer = self.analyzer.as_ref()?;
        match analyzer.analyze_fit(profile, job).await {
            Ok(fit) => Some(fit),
            Err(e) => {
                warn!("Fit analysis failed for job {}: {:#}", job.id, e);
                None
            }
        }
    }
}
