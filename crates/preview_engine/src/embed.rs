//! Embedded preview of a whole file: fetch once, hand the viewer a blob URL.

use std::sync::Arc;

use preview_logging::{preview_info, preview_warn};

use crate::blob::{BlobStore, BlobUrl};
use crate::fetch::{FetchRequest, Fetcher};
use crate::share::{Opener, DEFAULT_SHARE_NAME};
use crate::{FailureClass, FailureKind, LoadError};

/// What an embedded viewer points at.
#[derive(Debug)]
pub enum EmbedSource {
    /// Bytes were readable and now live in a blob owned by the preview.
    Blob(BlobUrl),
    /// The host refused to hand over the bytes; the viewer gets the raw URL.
    Direct(url::Url),
}

impl EmbedSource {
    pub fn url(&self) -> &url::Url {
        match self {
            EmbedSource::Blob(blob) => blob.url(),
            EmbedSource::Direct(url) => url,
        }
    }

    pub fn is_blob(&self) -> bool {
        matches!(self, EmbedSource::Blob(_))
    }
}

pub struct EmbedPreview {
    fetcher: Arc<dyn Fetcher>,
    blobs: Arc<BlobStore>,
    opener: Option<Arc<dyn Opener>>,
}

impl EmbedPreview {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        blobs: Arc<BlobStore>,
        opener: Option<Arc<dyn Opener>>,
    ) -> Self {
        Self {
            fetcher,
            blobs,
            opener,
        }
    }

    /// Fetches `url` without credentials into a blob. A cross-origin refusal
    /// degrades to embedding the URL itself; other failures are returned.
    pub async fn prepare(&self, url: &str) -> Result<EmbedSource, LoadError> {
        let parsed = url::Url::parse(url)
            .map_err(|err| LoadError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let output = match self.fetcher.fetch(&FetchRequest::new(url)).await {
            Ok(output) => output,
            Err(err) if err.class() == FailureClass::CrossOrigin => {
                preview_warn!("Embedding {} directly: {}", url, err);
                return Ok(EmbedSource::Direct(parsed));
            }
            Err(err) => return Err(err),
        };

        let blob = self
            .blobs
            .create(&output.bytes, &file_name(&parsed))
            .map_err(|err| {
                LoadError::new(
                    FailureKind::UnsupportedCapability {
                        capability: "blob url".to_string(),
                    },
                    err.to_string(),
                )
            })?;
        preview_info!("Embedded {} as {}", url, blob.url());
        Ok(EmbedSource::Blob(blob))
    }

    /// Opens the embedded file in the system viewer, which is where the user
    /// prints it from.
    pub fn open(&self, source: &EmbedSource) -> Result<(), LoadError> {
        let Some(opener) = self.opener.as_ref() else {
            return Err(LoadError::new(
                FailureKind::UnsupportedCapability {
                    capability: "open url".to_string(),
                },
                "no viewer to open the preview in",
            ));
        };
        opener.open(source.url())
    }
}

fn file_name(url: &url::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| segment.contains('.'))
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_SHARE_NAME.to_string())
}
