//! Preview engine: fetching, strategy chain, decoding and effect execution.
mod blob;
mod document;
mod embed;
mod engine;
mod fetch;
mod print;
mod share;
mod strategy;
mod types;

pub use blob::{BlobError, BlobStore, BlobUrl};
pub use document::{
    DecodedDocument, DocumentDecoder, LopdfDecoder, PageInfo, Viewport, DEFAULT_RENDER_SCALE,
};
pub use embed::{EmbedPreview, EmbedSource};
pub use engine::{EngineConfig, EngineHandle, EngineParts};
pub use fetch::{Credentials, FetchRequest, FetchSettings, Fetcher, ReqwestFetcher, PDF_CONTENT_TYPES};
pub use print::{
    PlannedPage, PrintBinding, PrintPlan, PrintReceipt, PrintRequest, SimulatedPrintBinding,
};
pub use share::{
    Opener, ShareHandoff, ShareOutcome, SharePayload, ShareSheet, SystemOpener,
    UnavailableShareSheet, DEFAULT_SHARE_NAME,
};
pub use strategy::{
    ChainError, ChainObserver, CredentialedStrategy, DirectStrategy, LoadStrategy, LoadedDocument,
    NoopObserver, ProxyStrategy, StrategyChain, DEFAULT_PROXY_TEMPLATE, EXHAUSTED_MESSAGE,
};
pub use types::{
    AttemptId, ChainState, DocumentSummary, EmbedSummary, EngineEvent, FailureClass, FailureKind,
    FetchMetadata, FetchOutput, LoadError, RenderedPage, StrategyFailure,
};
