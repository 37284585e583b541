// src/analysis/resume_analyzer.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::llm_client::LanguageModel;
use crate::recommendation::chunking::clean_html;
use crate::types::Job;
use crate::utils::truncate_chars;

/// Longest slice of resume text sent to the model.
pub const MAX_RESUME_CHARS: usize = 12_000;

const RESUME_SYSTEM_PROMPT: &str = "You are an experienced technical recruiter. \
Read the resume you are given and extract structured information. \
Answer with a single JSON object and nothing else.";

const FIT_SYSTEM_PROMPT: &str = "You are a career advisor comparing a candidate with a job posting. \
Be concise and factual. Answer with a single JSON object and nothing else.";

/// Structured summary of a resume, stored as JSON on the resume record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeAnalysis {
    pub skills: Vec<String>,
    pub experience_years: f64,
    pub summary: String,
}

/// How well a candidate matches one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitAnalysis {
    pub fit_score: u8,
    pub matching_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub summary: String,
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(joined)) => joined
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Numbers may come back as JSON numbers or as text such as "5+ years".
fn lenient_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            let end = trimmed
                .char_indices()
                .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && *c == '-')))
                .map_or(trimmed.len(), |(i, _)| i);
            trimmed[..end].parse().ok()
        }
        _ => None,
    }
}

fn text_field(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

impl ResumeAnalysis {
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .context("Resume analysis must be a JSON object")?;

        Ok(Self {
            skills: string_list(object.get("skills")),
            experience_years: lenient_number(object.get("experience_years"))
                .unwrap_or(0.0)
                .max(0.0),
            summary: text_field(object.get("summary")),
        })
    }

    /// Parse the JSON stored on a resume record.
    pub fn from_stored(raw: &str) -> Option<Self> {
        serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|value| Self::from_value(&value).ok())
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty() && self.summary.is_empty()
    }

    /// Compact description of the candidate used for retrieval and fit prompts.
    pub fn profile_text(&self) -> String {
        let mut parts = Vec::new();
        if !self.summary.is_empty() {
            parts.push(self.summary.clone());
        }
        if !self.skills.is_empty() {
            parts.push(format!("Skills: {}", self.skills.join(", ")));
        }
        parts.join("\n")
    }
}

impl FitAnalysis {
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .context("Fit analysis must be a JSON object")?;

        let score = lenient_number(object.get("fit_score"))
            .context("Fit analysis is missing fit_score")?;

        Ok(Self {
            fit_score: score.round().clamp(0.0, 100.0) as u8,
            matching_skills: string_list(object.get("matching_skills")),
            missing_skills: string_list(object.get("missing_skills")),
            summary: text_field(object.get("summary")),
        })
    }
}

pub fn job_description_text(job: &Job) -> String {
    format!(
        "Title: {}\nDescription: {}\nLocation: {}\nJob type: {}",
        job.title,
        clean_html(job.description.as_deref().unwrap_or_default()),
        job.location,
        job.job_type.display_name()
    )
}

#[derive(Clone)]
pub struct ResumeAnalyzer {
    model: Arc<dyn LanguageModel>,
}

impl ResumeAnalyzer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn analyze_resume(&self, resume_text: &str) -> Result<ResumeAnalysis> {
        let excerpt = truncate_chars(resume_text, MAX_RESUME_CHARS);
        let prompt = format!(
            r#"RESUME:
{}

Return a JSON object with exactly these keys:
- "skills": a list of the candidate's main skills, e.g. ["Python", "Django", "React", "Project Management"]
- "experience_years": the estimated total years of professional experience, as a number
- "summary": a short paragraph (3-4 sentences) summarising the candidate's experience and strengths"#,
            excerpt
        );

        let value = self
            .model
            .complete_json(RESUME_SYSTEM_PROMPT, &prompt)
            .await
            .context("Resume analysis request failed")?;

        let analysis = ResumeAnalysis::from_value(&value)?;
        info!(
            "Resume analysed with {}: {} skills, {} years",
            self.model.model_name(),
            analysis.skills.len(),
            analysis.experience_years
        );
        Ok(analysis)
    }

    pub async fn analyze_fit(&self, candidate_profile: &str, job: &Job) -> Result<FitAnalysis> {
        let prompt = format!(
            r#"JOB POSTING:
{}

CANDIDATE:
{}

Return a JSON object with exactly these keys:
- "fit_score": an integer from 0 to 100 rating how well the candidate fits the job
- "matching_skills": skills the candidate has that the job asks for
- "missing_skills": skills the job asks for that the candidate lacks
- "summary": two or three sentences explaining the score"#,
            job_description_text(job),
            truncate_chars(candidate_profile, MAX_RESUME_CHARS)
        );

        let value = self
            .model
            .complete_json(FIT_SYSTEM_PROMPT, &prompt)
            .await
            .with_context(|| format!("Fit analysis request failed for job {}", job.id))?;

        FitAnalysis::from_value(&value)
    }
}
