// src/recommendation/builder.rs
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::chunking::{Document, RecursiveCharacterSplitter};
use super::embeddings::EmbeddingModel;
use super::index::{IndexEntry, JobIndex};
use crate::analysis::resume_analyzer::job_description_text;
use crate::core::Database;
use crate::repositories::JobRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub jobs: usize,
    pub chunks: usize,
}

/// Build the job index from free-text postings: clean, chunk, embed.
pub struct IndexBuilder {
    db: Database,
    embedder: Arc<dyn EmbeddingModel>,
    splitter: RecursiveCharacterSplitter,
}

impl IndexBuilder {
    pub fn new(db: Database, embedder: Arc<dyn EmbeddingModel>) -> Self {
        Self {
            db,
            embedder,
            splitter: RecursiveCharacterSplitter::default(),
        }
    }

    /// Embed every active job and write the index to `index_path`.
    /// Returns `None` when there is nothing to index.
    pub async fn build(&self, index_path: &Path) -> Result<Option<(JobIndex, IndexReport)>> {
        let jobs = JobRepository::new(self.db.pool())
            .list_active()
            .await
            .context("Failed to load jobs for indexing")?;

        if jobs.is_empty() {
            warn!("No active jobs found, job index not built");
            return Ok(None);
        }

        let documents: Vec<Document> = jobs
            .iter()
            .map(|job| Document {
                key: job.id.to_string(),
                label: job.title.clone(),
                content: job_description_text(job),
            })
            .collect();

        let chunks = self.splitter.split_documents(&documents);
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let embeddings = self
            .embedder
            .embed(&texts)
            .await
            .context("Failed to embed job chunks")?;
        if embeddings.len() != chunks.len() {
            anyhow::bail!(
                "Embedding count mismatch: expected {}, got {}",
                chunks.len(),
                embeddings.len()
            );
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry {
                key: chunk.key,
                label: chunk.label,
                chunk_index: chunk.chunk_index,
                content: chunk.content,
                embedding,
            })
            .collect::<Vec<_>>();

        let report = IndexReport {
            jobs: jobs.len(),
            chunks: entries.len(),
        };
        let index = JobIndex::new(self.embedder.model_name(), entries)?;
        index.save(index_path).await?;

        info!(
            "Indexed {} jobs as {} chunks with {}",
            report.jobs,
            report.chunks,
            self.embedder.model_name()
        );
        Ok(Some((index, report)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::test_support::KeywordEmbedder;
    use crate::repositories::test_support;
    use crate::types::UserType;

    #[tokio::test]
    async fn test_no_jobs_builds_nothing() {
        let db = test_support::db().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job_index.json");

        let builder = IndexBuilder::new(db, Arc::new(KeywordEmbedder));
        assert!(builder.build(&path).await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_build_indexes_active_jobs() {
        let db = test_support::db().await;
        let owner = test_support::user(&db, "boss", Some(UserType::Employer)).await;
        let company = test_support::approved_company(&db, &owner, "Acme").await;
        let rust_job = test_support::job(&db, &company, "Rust Developer", None).await;
        let closed = test_support::job(&db, &company, "Chef", None).await;
        JobRepository::new(db.pool()).deactivate(closed.id).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectorstores").join("job_index.json");

        let (index, report) = IndexBuilder::new(db, Arc::new(KeywordEmbedder))
            .build(&path)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report, IndexReport { jobs: 1, chunks: 1 });
        assert_eq!(index.entries[0].key, rust_job.id.to_string());
        assert_eq!(index.entries[0].label, "Rust Developer");
        assert!(index.entries[0].content.starts_with("Title: Rust Developer\nDescription: Rust Developer wanted"));
        assert_eq!(index.model, "keyword");
        assert!(path.exists());
    }
}
