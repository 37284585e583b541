// src/core/media_store.rs
//! Uploaded files (avatars, logos, resumes) on local disk, served under /media

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

pub const MEDIA_URL_PREFIX: &str = "/media";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Avatars,
    Logos,
    Resumes,
}

impl MediaCategory {
    pub fn dir_name(&self) -> &'static str {
        match self {
            MediaCategory::Avatars => "avatars",
            MediaCategory::Logos => "logos",
            MediaCategory::Resumes => "resumes",
        }
    }

    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            MediaCategory::Avatars | MediaCategory::Logos => &["png", "jpg", "jpeg", "gif", "webp"],
            MediaCategory::Resumes => &["pdf", "txt"],
        }
    }

    /// Normalised extension for an upload, if the category accepts it.
    pub fn accept(&self, ext: &str) -> Option<String> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.allowed_extensions()
            .contains(&ext.as_str())
            .then_some(ext)
    }
}

/// A freshly allocated storage slot.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub relative: String,
    pub absolute: PathBuf,
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve `<category>/<uuid>.<ext>` and make sure its directory exists.
    pub async fn allocate(&self, category: MediaCategory, ext: &str) -> Result<StoredFile> {
        let ext = category.accept(ext).with_context(|| {
            format!(
                "Unsupported file extension '{}' for {}; allowed: {}",
                ext,
                category.dir_name(),
                category.allowed_extensions().join(", ")
            )
        })?;

        let dir = self.root.join(category.dir_name());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let file_name = format!("{}.{}", uuid::Uuid::new_v4(), ext);
        Ok(StoredFile {
            relative: format!("{}/{}", category.dir_name(), file_name),
            absolute: dir.join(file_name),
        })
    }

    pub async fn save_bytes(&self, category: MediaCategory, ext: &str, bytes: &[u8]) -> Result<String> {
        let slot = self.allocate(category, ext).await?;
        tokio::fs::write(&slot.absolute, bytes)
            .await
            .with_context(|| format!("Failed to write file: {}", slot.absolute.display()))?;

        info!("Stored {} bytes at {}", bytes.len(), slot.relative);
        Ok(slot.relative)
    }

    /// Resolve a stored relative path, refusing anything that escapes the root.
    pub fn absolute(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        let safe = path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !safe || relative.is_empty() {
            anyhow::bail!("Invalid media path: {}", relative);
        }
        Ok(self.root.join(path))
    }

    pub async fn read(&self, relative: &str) -> Result<Vec<u8>> {
        let path = self.absolute(relative)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))
    }

    /// Remove a stored file; a file that is already gone is fine.
    pub async fn delete(&self, relative: &str) -> Result<()> {
        let path = self.absolute(relative)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted media file {}", relative);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Media file {} already missing", relative);
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }

    pub fn url(relative: &str) -> String {
        format!("{}/{}", MEDIA_URL_PREFIX, relative.trim_start_matches('/'))
    }
}
