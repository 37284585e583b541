// src/analysis/mod.rs
//! LLM-backed resume understanding: structured extraction and job fit scoring

pub mod llm_client;
pub mod resume_analyzer;

pub use llm_client::{LanguageModel, OpenAiChatClient};
pub use resume_analyzer::{FitAnalysis, ResumeAnalysis, ResumeAnalyzer};
