//! services/api/src/adapters/file_store.rs
//!
//! Local-disk implementation of the `FileStore` port. Files are served back by the
//! router under the configured public base.

use async_trait::async_trait;
use conversa_core::domain::StoredFile;
use conversa_core::ports::{FileStore, PortError, PortResult};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct LocalFileStore {
    root: PathBuf,
    public_base: String,
}

impl LocalFileStore {
    pub fn new(root: PathBuf, public_base: String) -> Self {
        Self { root, public_base }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

/// Extensions are limited to short alphanumeric strings so names stay inside `root`.
fn sanitize_extension(extension: &str) -> PortResult<String> {
    let ext = extension.trim().trim_start_matches('.').to_lowercase();
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(PortError::Validation(format!(
            "unsupported file extension '{}'",
            extension
        )));
    }
    Ok(ext)
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save(&self, bytes: &[u8], extension: &str) -> PortResult<StoredFile> {
        let ext = sanitize_extension(extension)?;
        let name = format!("{}.{}", Uuid::new_v4(), ext);

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        tokio::fs::write(self.root.join(&name), bytes)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        info!("Stored {} bytes as {}", bytes.len(), name);

        Ok(StoredFile {
            url: format!("{}/{}", self.public_base, name),
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_writes_under_root_and_builds_url() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("audio");
        let store = LocalFileStore::new(root.clone(), "/files".to_string());

        let stored = store.save(b"ID3fake-mp3", ".MP3").await.unwrap();
        assert!(stored.name.ends_with(".mp3"));
        assert_eq!(stored.url, format!("/files/{}", stored.name));

        let written = tokio::fs::read(root.join(&stored.name)).await.unwrap();
        assert_eq!(written, b"ID3fake-mp3");
    }

    #[tokio::test]
    async fn test_path_like_extensions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().to_path_buf(), "/files".to_string());
        let err = store.save(b"x", "../../etc").await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
    }
}
