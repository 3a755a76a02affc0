//! Hand a fetched file to the OS so the user can pick a print or share target.

use std::sync::Arc;

use preview_logging::{preview_info, preview_warn};

use crate::blob::BlobStore;
use crate::fetch::{Credentials, FetchRequest, Fetcher};
use crate::{FailureKind, LoadError};

pub const DEFAULT_SHARE_NAME: &str = "document.pdf";
const FALLBACK_MIME: &str = "application/octet-stream";
const SHARE_TEXT: &str = "Share / Print";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePayload {
    pub filename: String,
    pub mime: String,
    pub bytes: bytes::Bytes,
    pub title: String,
    pub text: String,
}

/// OS-level share facility.
pub trait ShareSheet: Send + Sync {
    fn can_share(&self, payload: &SharePayload) -> bool;

    fn share(&self, payload: SharePayload) -> Result<(), LoadError>;
}

/// Opens a URL in whatever the host uses to view files.
pub trait Opener: Send + Sync {
    fn open(&self, url: &url::Url) -> Result<(), LoadError>;
}

/// Host without any share sheet, e.g. a headless terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableShareSheet;

impl ShareSheet for UnavailableShareSheet {
    fn can_share(&self, _payload: &SharePayload) -> bool {
        false
    }

    fn share(&self, _payload: SharePayload) -> Result<(), LoadError> {
        Err(unsupported("file sharing"))
    }
}

/// Opens URLs with the platform default handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl Opener for SystemOpener {
    fn open(&self, url: &url::Url) -> Result<(), LoadError> {
        open::that_detached(url.as_str()).map_err(|err| {
            LoadError::new(
                FailureKind::UnsupportedCapability {
                    capability: "open url".to_string(),
                },
                err.to_string(),
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared { filename: String },
    /// No share sheet; the file was opened through a blob URL instead.
    OpenedFallback { url: String },
}

pub struct ShareHandoff {
    fetcher: Arc<dyn Fetcher>,
    sheet: Arc<dyn ShareSheet>,
    opener: Option<Arc<dyn Opener>>,
    blobs: Arc<BlobStore>,
    credentials: Credentials,
}

impl ShareHandoff {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        sheet: Arc<dyn ShareSheet>,
        opener: Option<Arc<dyn Opener>>,
        blobs: Arc<BlobStore>,
        credentials: Credentials,
    ) -> Self {
        Self {
            fetcher,
            sheet,
            opener,
            blobs,
            credentials,
        }
    }

    pub async fn run(&self, url: &str, suggested_name: &str) -> Result<ShareOutcome, LoadError> {
        let request = FetchRequest::new(url).with_credentials(self.credentials.clone());
        let output = self.fetcher.fetch(&request).await?;

        let filename = if suggested_name.trim().is_empty() {
            DEFAULT_SHARE_NAME.to_string()
        } else {
            suggested_name.trim().to_string()
        };
        let mime = output
            .metadata
            .content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
            .filter(|ct| !ct.is_empty())
            .unwrap_or(FALLBACK_MIME)
            .to_string();
        let payload = SharePayload {
            title: filename.clone(),
            filename,
            mime,
            bytes: output.bytes,
            text: SHARE_TEXT.to_string(),
        };

        if self.sheet.can_share(&payload) {
            let filename = payload.filename.clone();
            self.sheet.share(payload)?;
            preview_info!("Shared {} through the share sheet", filename);
            return Ok(ShareOutcome::Shared { filename });
        }

        let Some(opener) = self.opener.as_ref() else {
            preview_warn!("No share sheet and no opener for {}", url);
            return Err(unsupported("file sharing"));
        };
        preview_info!("Share sheet unavailable, opening {} directly", payload.filename);
        let blob = self
            .blobs
            .create(&payload.bytes, &payload.filename)
            .map_err(|err| {
                LoadError::new(
                    FailureKind::UnsupportedCapability {
                        capability: "blob url".to_string(),
                    },
                    err.to_string(),
                )
            })?;
        opener.open(blob.url())?;
        // The viewer reads the file after we return; the store removes it on teardown.
        let url = blob.detach();
        Ok(ShareOutcome::OpenedFallback {
            url: url.to_string(),
        })
    }
}

fn unsupported(capability: &str) -> LoadError {
    LoadError::new(
        FailureKind::UnsupportedCapability {
            capability: capability.to_string(),
        },
        "the host cannot share files",
    )
}
