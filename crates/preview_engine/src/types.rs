use std::fmt;

use crate::document::{PageInfo, Viewport};
use crate::print::PrintReceipt;
use crate::share::ShareOutcome;

/// Identity of one load invocation. A newer attempt supersedes every older one.
pub type AttemptId = u64;

/// Position of one `StrategyChain::load` invocation in its state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainState {
    Idle,
    Attempting { index: usize, strategy: String },
    Succeeded { strategy: String },
    Failed,
}

impl ChainState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChainState::Succeeded { .. } | ChainState::Failed)
    }
}

/// Summary of a loaded document. The document itself stays with the engine worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub strategy: String,
    pub page_count: u32,
    pub byte_len: u64,
}

/// Where an embedded preview points. Blob files stay with the engine worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedSummary {
    pub url: String,
    pub blob: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub page: PageInfo,
    pub viewport: Viewport,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ChainProgress {
        attempt: AttemptId,
        state: ChainState,
    },
    LoadCompleted {
        attempt: AttemptId,
        result: Result<DocumentSummary, LoadError>,
    },
    PageRendered {
        attempt: AttemptId,
        result: Result<RenderedPage, LoadError>,
    },
    PrintCompleted {
        result: Result<PrintReceipt, LoadError>,
    },
    ShareCompleted {
        result: Result<ShareOutcome, LoadError>,
    },
    EmbedReady {
        attempt: AttemptId,
        result: Result<EmbedSummary, LoadError>,
    },
    /// The embedded file was handed to the system viewer; carries its URL.
    EmbedOpened {
        attempt: AttemptId,
        result: Result<String, LoadError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: bytes::Bytes,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub kind: FailureKind,
    pub message: String,
}

impl LoadError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn class(&self) -> FailureClass {
        self.kind.class()
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for LoadError {}

/// A single strategy's failure, kept for diagnostics once the chain is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    pub strategy: String,
    pub error: LoadError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    CrossOrigin { reason: String },
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Decode,
    UnsupportedCapability { capability: String },
    Exhausted,
}

/// Coarse grouping of [`FailureKind`] used when presenting errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Network,
    CrossOrigin,
    Decode,
    UnsupportedCapability,
    Input,
}

impl FailureKind {
    pub fn class(&self) -> FailureClass {
        match self {
            FailureKind::HttpStatus(_)
            | FailureKind::Timeout
            | FailureKind::Network
            | FailureKind::TooLarge { .. }
            | FailureKind::Exhausted => FailureClass::Network,
            FailureKind::CrossOrigin { .. } | FailureKind::UnsupportedContentType { .. } => {
                FailureClass::CrossOrigin
            }
            FailureKind::Decode => FailureClass::Decode,
            FailureKind::UnsupportedCapability { .. } => FailureClass::UnsupportedCapability,
            FailureKind::InvalidUrl => FailureClass::Input,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::CrossOrigin { reason } => write!(f, "cross-origin failure ({reason})"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Decode => write!(f, "decode failure"),
            FailureKind::UnsupportedCapability { capability } => {
                write!(f, "unsupported capability: {capability}")
            }
            FailureKind::Exhausted => write!(f, "all loading strategies failed"),
        }
    }
}
