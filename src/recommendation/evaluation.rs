// src/recommendation/evaluation.rs
//! Offline retrieval quality check on a labelled applicant dataset.
//!
//! The CSV needs `Resume`, `Job Roles` and `Job Description` columns. Each
//! unique role becomes one index entry; held-out resumes are used as queries
//! and scored with hit-rate@K and mean reciprocal rank.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::info;

use super::embeddings::EmbeddingModel;
use super::index::{IndexEntry, JobIndex};

#[derive(Debug, Deserialize)]
struct DatasetRow {
    #[serde(rename = "Resume", default)]
    resume: Option<String>,
    #[serde(rename = "Job Roles", default)]
    role: Option<String>,
    #[serde(rename = "Job Description", default)]
    description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Applicant {
    pub resume: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleDocument {
    pub role: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct EvaluationDataset {
    pub applicants: Vec<Applicant>,
    pub corpus: Vec<RoleDocument>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl EvaluationDataset {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Dataset not found: {}", path.display()))?;
        Self::from_reader(file)
    }

    /// Rows missing any of the three columns are dropped, then duplicate
    /// resumes. The corpus keeps the first description seen for each role.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut dataset = Self::default();
        let mut seen_resumes = HashSet::new();
        let mut seen_roles = HashSet::new();

        for row in csv_reader.deserialize::<DatasetRow>() {
            let row = row.context("Malformed dataset row")?;
            let (Some(resume), Some(role), Some(description)) = (
                non_blank(row.resume),
                non_blank(row.role),
                non_blank(row.description),
            ) else {
                continue;
            };

            if !seen_resumes.insert(resume.clone()) {
                continue;
            }
            if seen_roles.insert(role.clone()) {
                dataset.corpus.push(RoleDocument {
                    role: role.clone(),
                    description,
                });
            }
            dataset.applicants.push(Applicant { resume, role });
        }

        Ok(dataset)
    }
}

/// Deterministic shuffle split. The test share is rounded up.
pub fn train_test_split<T: Clone>(items: &[T], test_ratio: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut shuffled = items.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let ratio = test_ratio.clamp(0.0, 1.0);
    let test_len = ((shuffled.len() as f64) * ratio).ceil() as usize;
    let test = shuffled.split_off(shuffled.len() - test_len.min(shuffled.len()));
    (shuffled, test)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub applicants: usize,
    pub roles: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub k: usize,
    pub hit_rate: f64,
    pub mean_reciprocal_rank: f64,
}

/// Hit-rate@K and MRR for `(expected, ranked)` pairs. Empty input scores zero.
pub fn score_rankings(results: &[(String, Vec<String>)]) -> (f64, f64) {
    if results.is_empty() {
        return (0.0, 0.0);
    }

    let mut hits = 0usize;
    let mut reciprocal_sum = 0.0;
    for (expected, ranked) in results {
        if let Some(position) = ranked.iter().position(|label| label == expected) {
            hits += 1;
            reciprocal_sum += 1.0 / (position + 1) as f64;
        }
    }

    let total = results.len() as f64;
    (hits as f64 / total, reciprocal_sum / total)
}

pub async fn evaluate(
    embedder: &dyn EmbeddingModel,
    dataset: &EvaluationDataset,
    k: usize,
    test_ratio: f64,
    seed: u64,
) -> Result<EvaluationReport> {
    let (train, test) = train_test_split(&dataset.applicants, test_ratio, seed);
    info!(
        "Evaluating on {} applicants ({} train, {} test) against {} roles",
        dataset.applicants.len(),
        train.len(),
        test.len(),
        dataset.corpus.len()
    );

    let descriptions: Vec<String> = dataset.corpus.iter().map(|doc| doc.description.clone()).collect();
    let vectors = embedder
        .embed(&descriptions)
        .await
        .context("Failed to embed role descriptions")?;
    let entries = dataset
        .corpus
        .iter()
        .zip(vectors)
        .map(|(doc, embedding)| IndexEntry {
            key: doc.role.clone(),
            label: doc.role.clone(),
            chunk_index: 0,
            content: doc.description.clone(),
            embedding,
        })
        .collect();
    let index = JobIndex::new(embedder.model_name(), entries)?;

    let queries: Vec<String> = test.iter().map(|applicant| applicant.resume.clone()).collect();
    let query_vectors = embedder
        .embed(&queries)
        .await
        .context("Failed to embed test resumes")?;

    let mut results = Vec::with_capacity(test.len());
    for (applicant, query) in test.iter().zip(query_vectors) {
        let ranked = index
            .search(&query, k)?
            .into_iter()
            .map(|hit| hit.label)
            .collect();
        results.push((applicant.role.clone(), ranked));
    }

    let (hit_rate, mean_reciprocal_rank) = score_rankings(&results);
    Ok(EvaluationReport {
        applicants: dataset.applicants.len(),
        roles: dataset.corpus.len(),
        train_size: train.len(),
        test_size: test.len(),
        k,
        hit_rate,
        mean_reciprocal_rank,
    })
}
