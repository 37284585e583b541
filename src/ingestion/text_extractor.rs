// src/ingestion/text_extractor.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::utils::{get_file_extension, normalize_whitespace};

/// Pulls plain text out of an uploaded document.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, data: &[u8], filename: &str) -> Result<String>;
}

/// Handles the resume formats accepted on upload: PDF and plain text.
pub struct ResumeTextExtractor;

async fn extract_pdf_text(data: &[u8], filename: &str) -> Result<String> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        anyhow::bail!("File '{}' is not a valid PDF (missing %PDF header)", filename);
    }

    let bytes = data.to_vec();
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .with_context(|| format!("PDF extraction of '{}' aborted", filename))?
        .with_context(|| format!("Failed to extract text from PDF '{}'", filename))?;

    debug!("Extracted {} chars from PDF {}", text.len(), filename);
    Ok(text)
}

#[async_trait]
impl TextExtractor for ResumeTextExtractor {
    async fn extract(&self, data: &[u8], filename: &str) -> Result<String> {
        if data.is_empty() {
            anyhow::bail!("File '{}' is empty", filename);
        }

        let raw = match get_file_extension(filename).as_deref() {
            Some("pdf") => extract_pdf_text(data, filename).await?,
            Some("txt") => String::from_utf8_lossy(data).into_owned(),
            other => anyhow::bail!(
                "Unsupported resume format: {}",
                other.unwrap_or("no extension")
            ),
        };

        Ok(normalize_whitespace(&raw))
    }
}
