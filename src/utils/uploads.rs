use std::path::Path as StdPath;

use tokio::fs;

use crate::error::{Error, Result};

const ALLOWED_EXTS: [&str; 9] = ["pdf", "doc", "docx", "txt", "rtf", "jpg", "jpeg", "png", "webp"];

/// Validates an uploaded file and writes it under `UPLOADS_DIR/{subdir}` with
/// a fresh UUID name. Returns the stored path.
pub async fn save_upload(subdir: &str, filename: &str, data: &bytes::Bytes) -> Result<String> {
    let ext = StdPath::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| "bin".to_string());

    if !ALLOWED_EXTS.contains(&ext.as_str()) {
        return Err(Error::BadRequest(format!("File type .{} is not allowed", ext)));
    }

    if ext == "pdf" && !data.starts_with(b"%PDF") {
        return Err(Error::BadRequest("Invalid PDF file content".into()));
    }
    if (ext == "jpg" || ext == "jpeg") && !data.starts_with(&[0xFF, 0xD8]) {
        return Err(Error::BadRequest("Invalid JPEG file content".into()));
    }
    if ext == "png" && !data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return Err(Error::BadRequest("Invalid PNG file content".into()));
    }

    let upload_root = std::env::var("UPLOADS_DIR").unwrap_or_else(|_| "./uploads".to_string());
    let upload_dir = format!("{}/{}", upload_root, subdir);
    fs::create_dir_all(&upload_dir)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

    let file_id = uuid::Uuid::new_v4();
    let file_path = format!("{}/{}.{}", upload_dir, file_id, ext);

    fs::write(&file_path, data).await.map_err(|e| {
        tracing::error!("Failed to write uploaded file: {}", e);
        Error::Internal(format!("Failed to save file: {}", e))
    })?;

    Ok(file_path)
}
