//! Screenshot evidence.

use crate::errors::FlowError;
use crate::transport::DeviceSession;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// A saved screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    /// Where the file was written.
    pub path: PathBuf,
    /// Hex SHA-256 of the file contents.
    pub sha256: String,
    /// File size in bytes.
    pub bytes: usize,
}

impl EvidenceRecord {
    /// Builds a record for `png` saved at `path`.
    #[must_use]
    pub fn describe(path: impl Into<PathBuf>, png: &[u8]) -> Self {
        Self {
            path: path.into(),
            sha256: hex::encode(Sha256::digest(png)),
            bytes: png.len(),
        }
    }
}

/// Persists screenshots. Records are append-only.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Saves `png` under a name starting with `prefix`.
    async fn save(&self, prefix: &str, png: &[u8]) -> Result<EvidenceRecord, FlowError>;
}

/// Writes `{prefix}_{yyyyMMdd_HHmmss_mmm}.png` files into a directory.
///
/// A name collision within the same millisecond gets a `_{n}` suffix.
#[derive(Debug, Clone)]
pub struct FsEvidenceStore {
    directory: PathBuf,
}

impl FsEvidenceStore {
    /// Creates a store rooted at `directory`. The directory is created on first save.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// The output directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[async_trait]
impl EvidenceStore for FsEvidenceStore {
    async fn save(&self, prefix: &str, png: &[u8]) -> Result<EvidenceRecord, FlowError> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let stem = format!(
            "{}_{}",
            sanitize(prefix),
            chrono::Local::now().format("%Y%m%d_%H%M%S_%3f")
        );

        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("{stem}.png")
            } else {
                format!("{stem}_{attempt}.png")
            };
            let path = self.directory.join(name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(png).await?;
                    file.flush().await?;
                    return Ok(EvidenceRecord::describe(path, png));
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Keeps file names portable.
fn sanitize(prefix: &str) -> String {
    prefix
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Takes screenshots from a session and hands them to a store.
#[derive(Clone)]
pub struct EvidenceCamera {
    session: Arc<dyn DeviceSession>,
    store: Arc<dyn EvidenceStore>,
}

impl EvidenceCamera {
    /// Creates a camera.
    #[must_use]
    pub fn new(session: Arc<dyn DeviceSession>, store: Arc<dyn EvidenceStore>) -> Self {
        Self { session, store }
    }

    /// Captures and saves a screenshot.
    pub async fn capture(&self, prefix: &str) -> Result<EvidenceRecord, FlowError> {
        let png = self
            .session
            .screenshot()
            .await
            .map_err(|e| FlowError::Evidence(format!("screenshot failed: {e}")))?;
        let record = self
            .store
            .save(prefix, &png)
            .await
            .map_err(|e| FlowError::Evidence(format!("save failed: {e}")))?;
        info!(path = %record.path.display(), sha256 = %record.sha256, "Evidence saved");
        Ok(record)
    }

    /// Captures a screenshot, logging instead of failing.
    pub async fn capture_best_effort(&self, prefix: &str) -> Option<PathBuf> {
        match self.capture(prefix).await {
            Ok(record) => Some(record.path),
            Err(err) => {
                warn!(prefix = %prefix, error = %err, "Evidence capture failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for EvidenceCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceCamera").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDevice, MemoryEvidenceStore};

    #[test]
    fn test_sanitize_replaces_separators() {
        assert_eq!(sanitize("TC01_Start App/Pass"), "TC01_Start_App_Pass");
    }

    #[test]
    fn test_describe_hashes_contents() {
        let record = EvidenceRecord::describe("a.png", b"abc");
        assert_eq!(
            record.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(record.bytes, 3);
    }

    #[tokio::test]
    async fn test_fs_store_writes_prefixed_png() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEvidenceStore::new(dir.path().join("evidence"));

        let first = store.save("TC01_StartApp_Pass", b"png-1").await.unwrap();
        let second = store.save("TC01_StartApp_Pass", b"png-2").await.unwrap();

        assert_ne!(first.path, second.path);
        let name = first.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("TC01_StartApp_Pass_"));
        assert!(name.ends_with(".png"));
        assert_eq!(std::fs::read(&second.path).unwrap(), b"png-2");
    }

    #[tokio::test]
    async fn test_best_effort_capture_swallows_screenshot_failure() {
        let device = Arc::new(FakeDevice::new());
        device.fail_on("screenshot", "device offline");
        let store = Arc::new(MemoryEvidenceStore::new());
        let camera = EvidenceCamera::new(device, store.clone());

        assert!(camera.capture_best_effort("DEBUG_x").await.is_none());
        assert!(store.prefixes().is_empty());
    }
}
