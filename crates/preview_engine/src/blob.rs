use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use preview_logging::{preview_debug, preview_warn};
use tempfile::{Builder, TempDir};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob directory unavailable: {0}")]
    Directory(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("cannot express {0:?} as a file url")]
    Url(PathBuf),
}

/// Owns a private temp directory holding blob files. Dropping the store
/// removes any blob that is still alive.
#[derive(Debug)]
pub struct BlobStore {
    dir: TempDir,
}

impl BlobStore {
    pub fn new() -> Result<Self, BlobError> {
        let dir = Builder::new()
            .prefix("label-preview-")
            .tempdir()
            .map_err(|e| BlobError::Directory(e.to_string()))?;
        Ok(Self { dir })
    }

    pub fn new_in(parent: &Path) -> Result<Self, BlobError> {
        let dir = Builder::new()
            .prefix("label-preview-")
            .tempdir_in(parent)
            .map_err(|e| BlobError::Directory(e.to_string()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `bytes` into a fresh file and returns a URL referencing it.
    /// The file keeps the extension of `suggested_name` so OS viewers pick
    /// the right handler.
    pub fn create(&self, bytes: &[u8], suggested_name: &str) -> Result<BlobUrl, BlobError> {
        let suffix = Path::new(suggested_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let mut tmp = Builder::new()
            .prefix("blob-")
            .suffix(&suffix)
            .tempfile_in(self.dir.path())?;
        tmp.write_all(bytes)?;
        tmp.flush()?;

        let (_, path) = tmp.keep().map_err(|e| BlobError::Io(e.error))?;
        let url = url::Url::from_file_path(&path).map_err(|()| BlobError::Url(path.clone()))?;
        preview_debug!("Created blob {} ({} bytes)", url, bytes.len());
        Ok(BlobUrl {
            path,
            url,
            revoked: false,
        })
    }
}

/// Temporary reference to binary data. Revoked explicitly or on drop.
#[derive(Debug)]
pub struct BlobUrl {
    path: PathBuf,
    url: url::Url,
    revoked: bool,
}

impl BlobUrl {
    pub fn url(&self) -> &url::Url {
        &self.url
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    pub fn revoke(&mut self) {
        if self.revoked {
            return;
        }
        self.revoked = true;
        match fs::remove_file(&self.path) {
            Ok(()) => preview_debug!("Revoked blob {}", self.url),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => preview_warn!("Failed to revoke blob {}: {}", self.url, err),
        }
    }

    /// Leaves the file in place for an external viewer. The owning
    /// [`BlobStore`] still removes it when dropped.
    pub fn detach(mut self) -> url::Url {
        self.revoked = true;
        self.url.clone()
    }
}

impl Drop for BlobUrl {
    fn drop(&mut self) {
        self.revoke();
    }
}
