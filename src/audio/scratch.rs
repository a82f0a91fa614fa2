//! # Scratch Artifacts
//!
//! Temporary on-disk files that live for exactly one request: the raw upload
//! and the canonical WAV produced from it.
//!
//! A [`ScratchArtifact`] owns its file. Dropping it deletes the file, so every
//! exit path of a request (success, early `?` return, a dropped future after a
//! client disconnect) cleans up. Call [`ScratchArtifact::release`] on the normal
//! path to delete eagerly; deletion failures are logged and never returned.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, warn};
use uuid::Uuid;

/// Factory for the scratch artifacts of one request.
///
/// Every artifact created through the same `ScratchSpace` shares a request id in
/// its file name, which makes it easy to pair inputs and outputs in a scratch
/// directory while names stay unique across concurrent requests.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    dir: PathBuf,
    request_id: Uuid,
}

impl ScratchSpace {
    /// Scratch space under `dir`, or the OS temp dir when `None`.
    pub fn new(dir: Option<&Path>) -> Self {
        Self {
            dir: dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir),
            request_id: Uuid::new_v4(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Create an empty artifact named `<request-id>-<role>-XXXXXX<suffix>`.
    pub fn create(&self, role: &'static str, suffix: &str) -> io::Result<ScratchArtifact> {
        let prefix = format!("{}-{}-", self.request_id, role);
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(suffix)
            .tempfile_in(&self.dir)?;

        let path = file.into_temp_path();
        debug!(role, path = %path.display(), "Created scratch artifact");

        Ok(ScratchArtifact {
            path: Some(path),
            role,
        })
    }

    /// Create an artifact and fill it with `bytes`.
    pub async fn write(
        &self,
        role: &'static str,
        suffix: &str,
        bytes: &[u8],
    ) -> io::Result<ScratchArtifact> {
        let artifact = self.create(role, suffix)?;
        tokio::fs::write(artifact.path(), bytes).await?;
        Ok(artifact)
    }
}

/// A request-scoped temporary file, deleted when released or dropped.
#[derive(Debug)]
pub struct ScratchArtifact {
    path: Option<TempPath>,
    role: &'static str,
}

impl ScratchArtifact {
    pub fn path(&self) -> &Path {
        match &self.path {
            Some(path) => &**path,
            None => Path::new(""),
        }
    }

    pub fn role(&self) -> &'static str {
        self.role
    }

    /// Current size on disk; a missing file reads as zero bytes.
    pub async fn size_on_disk(&self) -> u64 {
        tokio::fs::metadata(self.path())
            .await
            .map(|meta| meta.len())
            .unwrap_or(0)
    }

    /// Delete the file now.
    pub fn release(mut self) {
        self.delete();
    }

    fn delete(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };

        let shown = path.display().to_string();
        match path.close() {
            Ok(()) => debug!(role = self.role, path = %shown, "Deleted scratch artifact"),
            // Another process (or ffmpeg itself) may have removed it already.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                role = self.role,
                path = %shown,
                error = %e,
                "Failed to delete scratch artifact"
            ),
        }
    }
}

impl Drop for ScratchArtifact {
    fn drop(&mut self) {
        self.delete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_write_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(Some(dir.path()));

        let artifact = space.write("input", ".aac", b"abc").await.unwrap();
        assert_eq!(artifact.size_on_disk().await, 3);
        assert_eq!(artifact.role(), "input");
        assert_eq!(entries(dir.path()), 1);

        artifact.release();
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_drop_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(Some(dir.path()));

        {
            let _input = space.create("input", ".tmp").unwrap();
            let _output = space.create("canonical", ".wav").unwrap();
            assert_eq!(entries(dir.path()), 2);
        }

        assert_eq!(entries(dir.path()), 0);
    }

    #[test]
    fn test_names_share_request_id_and_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(Some(dir.path()));

        let input = space.create("input", ".webm").unwrap();
        let output = space.create("canonical", ".wav").unwrap();

        let id = space.request_id().to_string();
        let input_name = input.path().file_name().unwrap().to_string_lossy().to_string();
        let output_name = output.path().file_name().unwrap().to_string_lossy().to_string();

        assert!(input_name.starts_with(&format!("{}-input-", id)));
        assert!(input_name.ends_with(".webm"));
        assert!(output_name.starts_with(&format!("{}-canonical-", id)));
        assert!(output_name.ends_with(".wav"));
        assert_ne!(input.path(), output.path());
    }

    #[tokio::test]
    async fn test_release_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(Some(dir.path()));

        let artifact = space.create("canonical", ".wav").unwrap();
        std::fs::remove_file(artifact.path()).unwrap();
        assert_eq!(artifact.size_on_disk().await, 0);
        artifact.release();
    }
}
