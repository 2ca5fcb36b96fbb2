//! Image file storage under the root folder
//!
//! Layout:
//! - `<root>/uploads/<analysis_id>.<ext>`   original upload
//! - `<root>/annotated/<analysis_id>.jpg`   copy with detection boxes drawn

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::StoredAnalysis;

const UPLOADS_DIR: &str = "uploads";
const ANNOTATED_DIR: &str = "annotated";

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root folder and its subdirectories if missing
    pub async fn ensure_directories(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.root.join(UPLOADS_DIR)).await?;
        tokio::fs::create_dir_all(self.root.join(ANNOTATED_DIR)).await?;
        Ok(())
    }

    pub fn original_path(&self, id: Uuid, extension: &str) -> PathBuf {
        self.root
            .join(UPLOADS_DIR)
            .join(format!("{}.{}", id, extension))
    }

    pub fn annotated_path(&self, id: Uuid) -> PathBuf {
        self.root.join(ANNOTATED_DIR).join(format!("{}.jpg", id))
    }

    pub async fn write(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Stored file");
        Ok(())
    }

    /// Delete the files of evicted or deleted analyses; missing files are ignored
    pub async fn remove_files(&self, analyses: &[StoredAnalysis]) {
        for analysis in analyses {
            self.remove_paths(&[
                analysis.original_path.as_path(),
                analysis.annotated_path.as_path(),
            ])
            .await;
        }
    }

    pub async fn remove_paths(&self, paths: &[&Path]) {
        for path in paths {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(path = %path.display(), "Removed file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove file")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ihub_common::AnalysisResult;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_layout_and_cleanup() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.ensure_directories().await.unwrap();

        let id = Uuid::new_v4();
        let original = storage.original_path(id, "png");
        let annotated = storage.annotated_path(id);
        assert!(original.starts_with(dir.path().join("uploads")));
        assert!(annotated.to_string_lossy().ends_with(".jpg"));

        storage.write(&original, b"original").await.unwrap();
        storage.write(&annotated, b"annotated").await.unwrap();

        let result = AnalysisResult::from_detections(id, vec![], None, Utc::now());
        let stored = StoredAnalysis::new(result, original.clone(), annotated.clone());
        storage.remove_files(&[stored.clone()]).await;
        assert!(!original.exists());
        assert!(!annotated.exists());

        // Second removal is a no-op
        storage.remove_files(&[stored]).await;
    }
}
