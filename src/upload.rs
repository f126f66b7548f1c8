use std::path::PathBuf;

use tokio::fs;
use uuid::Uuid;

use crate::error::ApiError;

/// Disk-backed store for uploaded images. Filenames are freshly generated
/// uuids; nothing client-controlled reaches the filesystem.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
    max_bytes: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum FileStoreError {
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("file exceeds the {max} byte limit")]
    TooLarge { max: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<FileStoreError> for ApiError {
    fn from(e: FileStoreError) -> Self {
        match e {
            FileStoreError::UnsupportedType(ct) => ApiError::BadRequest(
                "UNSUPPORTED_MEDIA_TYPE",
                format!("only image uploads are allowed, got {ct}"),
            ),
            FileStoreError::TooLarge { max } => ApiError::BadRequest(
                "FILE_TOO_LARGE",
                format!("file exceeds the {max} byte limit"),
            ),
            FileStoreError::Io(e) => ApiError::Internal(format!("file store error: {e}")),
        }
    }
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    /// Persist an uploaded image and return its public `/uploads/...` path.
    pub async fn save_image(
        &self,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, FileStoreError> {
        let ct = content_type.unwrap_or("application/octet-stream");
        let ext = image_extension(ct)
            .ok_or_else(|| FileStoreError::UnsupportedType(ct.to_string()))?;

        if bytes.len() > self.max_bytes {
            return Err(FileStoreError::TooLarge {
                max: self.max_bytes,
            });
        }

        let filename = format!("{}.{ext}", Uuid::new_v4());
        fs::create_dir_all(&self.root).await?;
        fs::write(self.root.join(&filename), bytes).await?;

        Ok(format!("/uploads/{filename}"))
    }

    /// Best-effort removal of a previously stored file by its public path.
    pub async fn remove(&self, public_path: &str) {
        if let Some(filename) = public_path.strip_prefix("/uploads/") {
            // Paths we minted contain no separators; ignore anything else.
            if !filename.contains('/') && !filename.contains("..") {
                let _ = fs::remove_file(self.root.join(filename)).await;
            }
        }
    }
}

fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_store(max_bytes: usize) -> FileStore {
        let root = std::env::temp_dir().join(format!("tabib-uploads-{}", Uuid::new_v4()));
        FileStore::new(root, max_bytes)
    }

    #[test]
    fn test_image_extension_allowlist() {
        assert_eq!(image_extension("image/png"), Some("png"));
        assert_eq!(image_extension("image/jpeg"), Some("jpg"));
        assert_eq!(image_extension("application/pdf"), None);
        assert_eq!(image_extension("text/html"), None);
    }

    #[tokio::test]
    async fn test_save_image_rejects_non_image_mime() {
        let store = scratch_store(1024);
        let err = store
            .save_image(Some("application/x-sh"), b"#!/bin/sh")
            .await
            .unwrap_err();
        assert!(matches!(err, FileStoreError::UnsupportedType(_)));

        // Missing content type is not trusted either.
        let err = store.save_image(None, b"data").await.unwrap_err();
        assert!(matches!(err, FileStoreError::UnsupportedType(_)));
    }

    #[tokio::test]
    async fn test_save_image_enforces_size_cap() {
        let store = scratch_store(8);
        let err = store
            .save_image(Some("image/png"), &[0u8; 9])
            .await
            .unwrap_err();
        assert!(matches!(err, FileStoreError::TooLarge { max: 8 }));
    }

    #[tokio::test]
    async fn test_save_image_writes_and_remove_deletes() {
        let store = scratch_store(1024);
        let path = store
            .save_image(Some("image/jpeg"), &[0xFF, 0xD8, 0xFF])
            .await
            .unwrap();
        assert!(path.starts_with("/uploads/"));
        assert!(path.ends_with(".jpg"));

        let on_disk = store.root.join(path.strip_prefix("/uploads/").unwrap());
        assert!(on_disk.exists());

        store.remove(&path).await;
        assert!(!on_disk.exists());
    }
}
