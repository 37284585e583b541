// src/recommendation/index.rs
//! Flat vector index persisted as a single JSON file

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: String,
    pub label: String,
    pub chunk_index: usize,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// Best-scoring chunk of one key.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub key: String,
    pub label: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobIndex {
    pub model: String,
    pub dimensions: usize,
    pub built_at: DateTime<Utc>,
    pub entries: Vec<IndexEntry>,
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let a_norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let b_norm: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    dot / (a_norm * b_norm)
}

impl JobIndex {
    /// All entries must share one dimension.
    pub fn new(model: impl Into<String>, entries: Vec<IndexEntry>) -> Result<Self> {
        let dimensions = entries.first().map_or(0, |entry| entry.embedding.len());
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimensions) {
            anyhow::bail!(
                "Vector dimension mismatch for {} chunk {}: {} != {}",
                bad.key,
                bad.chunk_index,
                bad.embedding.len(),
                dimensions
            );
        }

        Ok(Self {
            model: model.into(),
            dimensions,
            built_at: Utc::now(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        let mut keys: Vec<&str> = self.entries.iter().map(|e| e.key.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        keys.len()
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimensions {
            anyhow::bail!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.dimensions
            );
        }

        let mut best: HashMap<&str, SearchHit> = HashMap::new();
        for entry in &self.entries {
            let score = cosine_similarity(query, &entry.embedding);
            match best.get_mut(entry.key.as_str()) {
                Some(hit) if hit.score >= score => {}
                Some(hit) => hit.score = score,
                None => {
                    best.insert(
                        &entry.key,
                        SearchHit {
                            key: entry.key.clone(),
                            label: entry.label.clone(),
                            score,
                        },
                    );
                }
            }
        }

        let mut hits: Vec<SearchHit> = best.into_values().collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.key.cmp(&b.key)));
        hits.truncate(k);

        debug!("Index search returned {} hits", hits.len());
        Ok(hits)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create index directory {}", parent.display()))?;
        }

        let body = serde_json::to_vec(self).context("Failed to serialize job index")?;
        let temp_path = path.with_extension("json.tmp");

        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, path)
            .await
            .with_context(|| format!("Failed to move index into place at {}", path.display()))?;

        info!(
            "Saved job index with {} entries ({} dims) to {}",
            self.entries.len(),
            self.dimensions,
            path.display()
        );
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let body = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read job index {}", path.display()))?;
        let index: Self = serde_json::from_slice(&body)
            .with_context(|| format!("Job index {} is corrupt", path.display()))?;

        info!("Loaded job index with {} entries from {}", index.len(), path.display());
        Ok(index)
    }

    /// Load if the file exists.
    pub async fn load_if_present(path: &Path) -> Result<Option<Self>> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(None);
        }
        Self::load(path).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, chunk_index: usize, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            key: key.to_string(),
            label: format!("Job {}", key),
            chunk_index,
            content: format!("chunk {} of {}", chunk_index, key),
            embedding,
        }
    }

    fn sample_index() -> JobIndex {
        JobIndex::new(
            "test-model",
            vec![
                entry("1", 0, vec![1.0, 0.0]),
                entry("1", 1, vec![0.9, 0.1]),
                entry("2", 0, vec![0.0, 1.0]),
                entry("3", 0, vec![0.7, 0.7]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_returns_distinct_keys() {
        let index = sample_index();
        assert_eq!(index.key_count(), 3);

        let hits = index.search(&[1.0, 0.0], 10).unwrap();
        let keys: Vec<&str> = hits.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["1", "3", "2"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[0].label, "Job 1");

        assert_eq!(index.search(&[1.0, 0.0], 1).unwrap().len(), 1);
    }

    #[test]
    fn test_ties_are_broken_by_key() {
        let index = JobIndex::new(
            "m",
            vec![entry("b", 0, vec![1.0, 0.0]), entry("a", 0, vec![2.0, 0.0])],
        )
        .unwrap();
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].key, "a");
        assert_eq!(hits[1].key, "b");
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = sample_index();
        assert!(index.search(&[1.0, 0.0, 0.0], 3).is_err());
        assert!(JobIndex::new("m", vec![entry("1", 0, vec![1.0]), entry("2", 0, vec![1.0, 2.0])]).is_err());
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = JobIndex::new("m", Vec::new()).unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[1.0], 5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectorstores").join("job_index.json");

        assert!(JobIndex::load_if_present(&path).await.unwrap().is_none());

        let index = sample_index();
        index.save(&path).await.unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = JobIndex::load_if_present(&path).await.unwrap().unwrap();
        assert_eq!(loaded.model, "test-model");
        assert_eq!(loaded.dimensions, 2);
        assert_eq!(loaded.entries, index.entries);
    }

    #[tokio::test]
    async fn test_corrupt_index_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job_index.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        assert!(JobIndex::load(&path).await.is_err());
    }
}
