// src/web/file_handlers.rs
//! Storing multipart uploads in the media store

use anyhow::Context;
use rocket::fs::TempFile;
use tracing::{info, warn};

use crate::core::{MediaCategory, MediaStore};
use crate::error::{ApiError, ApiResult};
use crate::utils::get_file_extension;

pub(crate) const MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;

const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];

/// Extension of the uploaded file, from its submitted name or else its content type.
fn upload_extension(file: &TempFile<'_>) -> Option<String> {
    file.raw_name()
        .and_then(|name| get_file_extension(name.dangerous_unsafe_unsanitized_raw().as_str()))
        .or_else(|| {
            file.content_type()
                .and_then(|content_type| content_type.extension())
                .map(|ext| ext.as_str().to_lowercase())
        })
}

/// Check that image bytes match the format their extension claims.
pub fn check_image_signature(ext: &str, header: &[u8]) -> Result<(), String> {
    let valid = match ext {
        "png" => header.starts_with(PNG_SIGNATURE),
        "jpg" | "jpeg" => header.starts_with(JPEG_SIGNATURE),
        "gif" => header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a"),
        "webp" => header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP",
        _ => false,
    };
    if valid {
        return Ok(());
    }

    if header.starts_with(PNG_SIGNATURE) {
        Err(format!("File is PNG but has .{} extension", ext))
    } else if header.starts_with(JPEG_SIGNATURE) {
        Err(format!("File is JPEG but has .{} extension", ext))
    } else {
        Err("Upload a valid image. The file you uploaded was either not an image or a corrupted image.".to_string())
    }
}

/// Copy an uploaded file into `category` and return its relative media path.
pub async fn store_upload(
    media: &MediaStore,
    category: MediaCategory,
    field: &str,
    file: &mut TempFile<'_>,
) -> ApiResult<String> {
    let allowed = category.allowed_extensions().join(", ");
    let ext = upload_extension(file)
        .and_then(|ext| category.accept(&ext))
        .ok_or_else(|| {
            ApiError::validation(
                field,
                format!("Unsupported file extension. Allowed extensions are: {}.", allowed),
            )
        })?;

    if file.len() == 0 {
        return Err(ApiError::validation(field, "The submitted file is empty."));
    }
    if file.len() > MAX_UPLOAD_SIZE {
        return Err(ApiError::validation(
            field,
            format!(
                "File too large: {:.1}MB (max 10MB)",
                file.len() as f64 / 1024.0 / 1024.0
            ),
        ));
    }

    let slot = media.allocate(category, &ext).await?;
    file.copy_to(&slot.absolute)
        .await
        .with_context(|| format!("Failed to store upload at {}", slot.absolute.display()))?;

    if matches!(category, MediaCategory::Avatars | MediaCategory::Logos) {
        let bytes = media.read(&slot.relative).await?;
        if let Err(message) = check_image_signature(&ext, &bytes) {
            warn!("Rejected {} upload: {}", category.dir_name(), message);
            media.delete(&slot.relative).await?;
            return Err(ApiError::validation(field, message));
        }
    }

    info!("Stored upload {} ({} bytes)", slot.relative, file.len());
    Ok(slot.relative)
}

/// Remove a file that was replaced or whose record is gone. Failures are only logged.
pub async fn discard_media(media: &MediaStore, relative: Option<&str>) {
    if let Some(relative) = relative {
        if let Err(e) = media.delete(relative).await {
            warn!("Failed to remove media file {}: {:#}", relative, e);
        }
    }
}
