use crate::domain::errors::StoreError;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Content directory holding one opaque file per registered version
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        info!("Artifact store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, artifact_ref: &str) -> PathBuf {
        self.root.join(artifact_ref)
    }

    /// Hex-encoded SHA-256 of `bytes`
    pub fn checksum(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// Writes through a temporary file so readers never see a partial artifact.
    /// An existing artifact is never replaced.
    pub async fn write(&self, artifact_ref: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let target = self.path_for(artifact_ref);
        let staging = self.path_for(&format!("{}.partial", artifact_ref));

        fs::write(&staging, bytes).await?;
        // hard_link fails on an existing target, unlike rename
        let linked = fs::hard_link(&staging, &target).await;
        if let Err(e) = fs::remove_file(&staging).await {
            warn!("Failed to remove staging file {}: {}", staging.display(), e);
        }
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::ArtifactExists { path: target });
            }
            Err(e) => return Err(e.into()),
        }

        debug!("Wrote artifact {} ({} bytes)", target.display(), bytes.len());
        Ok(Self::checksum(bytes))
    }

    /// Reads an artifact and verifies it against the recorded checksum
    pub async fn read(
        &self,
        model_id: &str,
        artifact_ref: &str,
        expected_checksum: &str,
    ) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(artifact_ref);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::ArtifactMissing {
                    model_id: model_id.to_string(),
                    path,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let actual = Self::checksum(&bytes);
        if actual != expected_checksum {
            return Err(StoreError::ArtifactCorrupted {
                model_id: model_id.to_string(),
                expected: expected_checksum.to_string(),
                actual,
            });
        }
        Ok(bytes)
    }

    /// Returns `false` when the file was already gone
    pub async fn remove(&self, artifact_ref: &str) -> Result<bool, StoreError> {
        match fs::remove_file(self.path_for(artifact_ref)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
