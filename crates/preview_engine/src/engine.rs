use std::collections::HashMap;
use std::io;
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use preview_logging::{preview_debug, preview_info, preview_warn};
use tokio_util::sync::CancellationToken;

use crate::blob::BlobStore;
use crate::document::{DecodedDocument, DocumentDecoder, LopdfDecoder, DEFAULT_RENDER_SCALE};
use crate::embed::{EmbedPreview, EmbedSource};
use crate::fetch::{Credentials, FetchSettings, Fetcher, ReqwestFetcher};
use crate::print::{PrintBinding, PrintPlan, PrintRequest, SimulatedPrintBinding};
use crate::share::{ShareHandoff, ShareSheet, SystemOpener, UnavailableShareSheet};
use crate::strategy::{ChainObserver, StrategyChain, DEFAULT_PROXY_TEMPLATE};
use crate::{
    AttemptId, ChainState, DocumentSummary, EmbedSummary, EngineEvent, FailureKind, LoadError,
    RenderedPage,
};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub fetch: FetchSettings,
    pub credentials: Credentials,
    pub proxy_templates: Vec<String>,
    pub print_delay: Duration,
    pub render_scale: f32,
    /// Open files with the system viewer when no share sheet exists.
    pub open_fallback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            credentials: Credentials::Omit,
            proxy_templates: vec![DEFAULT_PROXY_TEMPLATE.to_string()],
            print_delay: Duration::from_secs(1),
            render_scale: DEFAULT_RENDER_SCALE,
            open_fallback: true,
        }
    }
}

/// Collaborators the worker runs against. Built from an [`EngineConfig`] or
/// assembled by hand to substitute any of them.
pub struct EngineParts {
    pub chain: StrategyChain,
    pub printer: Arc<dyn PrintBinding>,
    pub share: ShareHandoff,
    pub embed: EmbedPreview,
    pub render_scale: f32,
}

impl EngineParts {
    pub fn from_config(config: EngineConfig) -> io::Result<Self> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(ReqwestFetcher::new(config.fetch));
        let decoder: Arc<dyn DocumentDecoder> = Arc::new(LopdfDecoder);
        let chain = StrategyChain::standard(
            fetcher.clone(),
            decoder,
            config.credentials.clone(),
            &config.proxy_templates,
        );
        let blobs = Arc::new(
            BlobStore::new().map_err(|err| io::Error::other(err.to_string()))?,
        );
        let sheet: Arc<dyn ShareSheet> = Arc::new(UnavailableShareSheet);
        let opener = config
            .open_fallback
            .then(|| Arc::new(SystemOpener) as Arc<dyn crate::share::Opener>);
        let embed = EmbedPreview::new(fetcher.clone(), blobs.clone(), opener.clone());
        let share = ShareHandoff::new(fetcher, sheet, opener, blobs, config.credentials);
        Ok(Self {
            chain,
            printer: Arc::new(SimulatedPrintBinding::new(config.print_delay)),
            share,
            embed,
            render_scale: config.render_scale,
        })
    }
}

enum EngineCommand {
    Load { attempt: AttemptId, url: String },
    Release { attempt: AttemptId },
    Render { attempt: AttemptId, page: u32 },
    Print { attempt: Option<AttemptId>, url: String },
    Share { url: String, name: String },
    Embed { attempt: AttemptId, url: String },
    OpenEmbed { attempt: AttemptId },
    Shutdown,
}

/// An embedded preview, from request until release.
enum EmbedSlot {
    Pending,
    Ready(EmbedSource),
}

struct Liveness {
    attempt: AttemptId,
    token: CancellationToken,
}

/// State shared between the worker loop and its spawned tasks.
struct Shared {
    parts: EngineParts,
    documents: Mutex<HashMap<AttemptId, Box<dyn DecodedDocument>>>,
    current: Mutex<Option<Liveness>>,
    embeds: Mutex<HashMap<AttemptId, EmbedSlot>>,
}

impl Shared {
    fn documents(&self) -> MutexGuard<'_, HashMap<AttemptId, Box<dyn DecodedDocument>>> {
        self.documents.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current(&self) -> MutexGuard<'_, Option<Liveness>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn embeds(&self) -> MutexGuard<'_, HashMap<AttemptId, EmbedSlot>> {
        self.embeds.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes `attempt` the live one and cancels whatever it supersedes.
    fn supersede(&self, attempt: AttemptId) -> CancellationToken {
        let token = CancellationToken::new();
        let mut current = self.current();
        let previous = current.replace(Liveness {
            attempt,
            token: token.clone(),
        });
        // Cancelled under the same lock adopt_document checks liveness under.
        if let Some(previous) = previous {
            if previous.attempt != attempt {
                preview_debug!("Attempt {} superseded by {}", previous.attempt, attempt);
                previous.token.cancel();
            }
        }
        token
    }

    fn release(&self, attempt: AttemptId) {
        {
            let mut current = self.current();
            if current.as_ref().is_some_and(|live| live.attempt == attempt) {
                if let Some(live) = current.take() {
                    live.token.cancel();
                }
            }
        }
        if self.documents().remove(&attempt).is_some() {
            preview_debug!("Released document for attempt {}", attempt);
        }
        // Dropping a ready blob revokes it.
        if self.embeds().remove(&attempt).is_some() {
            preview_debug!("Released embedded preview for attempt {}", attempt);
        }
    }

    /// Stores `document` unless `token` was cancelled. The liveness check and
    /// the insert happen under the `current` lock so a release cannot slip in
    /// between them.
    fn adopt_document(
        &self,
        attempt: AttemptId,
        token: &CancellationToken,
        document: Box<dyn DecodedDocument>,
    ) -> bool {
        let _current = self.current();
        if token.is_cancelled() {
            return false;
        }
        self.documents().insert(attempt, document);
        true
    }
}

pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> io::Result<Self> {
        Self::with_parts(EngineParts::from_config(config)?)
    }

    pub fn with_parts(parts: EngineParts) -> io::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Runtime::new()?;
        let shared = Arc::new(Shared {
            parts,
            documents: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            embeds: Mutex::new(HashMap::new()),
        });

        thread::Builder::new()
            .name("preview-engine".to_string())
            .spawn(move || {
                while let Ok(command) = cmd_rx.recv() {
                    let shared = shared.clone();
                    let event_tx = event_tx.clone();
                    match command {
                        EngineCommand::Load { attempt, url } => {
                            let token = shared.supersede(attempt);
                            runtime.spawn(async move {
                                handle_load(&shared, attempt, url, token, event_tx).await;
                            });
                        }
                        EngineCommand::Release { attempt } => shared.release(attempt),
                        EngineCommand::Render { attempt, page } => {
                            handle_render(&shared, attempt, page, &event_tx);
                        }
                        EngineCommand::Print { attempt, url } => {
                            runtime.spawn(async move {
                                handle_print(&shared, attempt, url, event_tx).await;
                            });
                        }
                        EngineCommand::Share { url, name } => {
                            runtime.spawn(async move {
                                let result = shared.parts.share.run(&url, &name).await;
                                if let Err(err) = &result {
                                    preview_warn!("Share of {} failed: {}", url, err);
                                }
                                let _ = event_tx.send(EngineEvent::ShareCompleted { result });
                            });
                        }
                        EngineCommand::Embed { attempt, url } => {
                            shared.embeds().insert(attempt, EmbedSlot::Pending);
                            runtime.spawn(async move {
                                handle_embed(&shared, attempt, url, event_tx).await;
                            });
                        }
                        EngineCommand::OpenEmbed { attempt } => {
                            handle_open_embed(&shared, attempt, &event_tx);
                        }
                        EngineCommand::Shutdown => {
                            preview_info!("Engine shutdown requested");
                            break;
                        }
                    }
                }
                preview_debug!("Engine command channel closed, shutting down");
                runtime.shutdown_timeout(Duration::from_millis(250));
            })?;

        Ok(Self { cmd_tx, event_rx })
    }

    /// Starts loading `url` as `attempt`, superseding any earlier attempt.
    pub fn load(&self, attempt: AttemptId, url: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Load {
            attempt,
            url: url.into(),
        });
    }

    pub fn release(&self, attempt: AttemptId) {
        let _ = self.cmd_tx.send(EngineCommand::Release { attempt });
    }

    pub fn render(&self, attempt: AttemptId, page: u32) {
        let _ = self.cmd_tx.send(EngineCommand::Render { attempt, page });
    }

    pub fn print(&self, attempt: Option<AttemptId>, url: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Print {
            attempt,
            url: url.into(),
        });
    }

    pub fn share(&self, url: impl Into<String>, name: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Share {
            url: url.into(),
            name: name.into(),
        });
    }

    /// Fetches `url` into a blob that lives until `attempt` is released.
    pub fn embed(&self, attempt: AttemptId, url: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Embed {
            attempt,
            url: url.into(),
        });
    }

    pub fn open_embed(&self, attempt: AttemptId) {
        let _ = self.cmd_tx.send(EngineCommand::OpenEmbed { attempt });
    }

    /// Stops the worker. In-flight tasks are abandoned and no further events
    /// are emitted; later commands are ignored.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

struct EventObserver {
    attempt: AttemptId,
    token: CancellationToken,
    tx: mpsc::Sender<EngineEvent>,
}

impl ChainObserver for EventObserver {
    fn on_state(&self, state: &ChainState) {
        if self.token.is_cancelled() {
            return;
        }
        let _ = self.tx.send(EngineEvent::ChainProgress {
            attempt: self.attempt,
            state: state.clone(),
        });
    }
}

async fn handle_load(
    shared: &Shared,
    attempt: AttemptId,
    url: String,
    token: CancellationToken,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let observer = EventObserver {
        attempt,
        token: token.clone(),
        tx: event_tx.clone(),
    };
    let outcome = shared.parts.chain.load(&url, &observer).await;

    // Requests are never aborted; a superseded attempt just drops its result.
    if token.is_cancelled() {
        preview_info!("Discarding result of stale attempt {}", attempt);
        return;
    }

    let result = match outcome {
        Ok(loaded) => {
            let summary = DocumentSummary {
                strategy: loaded.strategy.clone(),
                page_count: loaded.page_count(),
                byte_len: loaded.document.byte_len(),
            };
            if !shared.adopt_document(attempt, &token, loaded.document) {
                preview_info!("Discarding result of stale attempt {}", attempt);
                return;
            }
            Ok(summary)
        }
        Err(err) => {
            for failure in err.failures() {
                preview_debug!(
                    "attempt {} [{}] {}",
                    attempt,
                    failure.strategy,
                    failure.error
                );
            }
            Err(err.to_load_error())
        }
    };
    let _ = event_tx.send(EngineEvent::LoadCompleted { attempt, result });
}

fn handle_render(
    shared: &Shared,
    attempt: AttemptId,
    page: u32,
    event_tx: &mpsc::Sender<EngineEvent>,
) {
    let result = match shared.documents().get(&attempt) {
        Some(document) => document.page(page).map(|info| RenderedPage {
            page: info,
            viewport: info.viewport(shared.parts.render_scale),
        }),
        None => Err(LoadError::new(
            FailureKind::Decode,
            format!("no document loaded for attempt {attempt}"),
        )),
    };
    let _ = event_tx.send(EngineEvent::PageRendered { attempt, result });
}

async fn handle_print(
    shared: &Shared,
    attempt: Option<AttemptId>,
    url: String,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    if let Some(attempt) = attempt {
        let plan = shared
            .documents()
            .get(&attempt)
            .map(|document| PrintPlan::for_document(document.as_ref(), shared.parts.render_scale));
        match plan {
            Some(Ok(plan)) => preview_info!("{} prepared for attempt {}", plan.title(), attempt),
            Some(Err(err)) => {
                let _ = event_tx.send(EngineEvent::PrintCompleted { result: Err(err) });
                return;
            }
            None => {}
        }
    }
    let result = shared.parts.printer.print(PrintRequest { uri: url }).await;
    let _ = event_tx.send(EngineEvent::PrintCompleted { result });
}

async fn handle_embed(
    shared: &Shared,
    attempt: AttemptId,
    url: String,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let outcome = shared.parts.embed.prepare(&url).await;

    let result = {
        let mut embeds = shared.embeds();
        if !matches!(embeds.get(&attempt), Some(EmbedSlot::Pending)) {
            // Released while fetching; dropping the source revokes its blob.
            preview_info!("Discarding embedded preview of released attempt {}", attempt);
            return;
        }
        match outcome {
            Ok(source) => {
                let summary = EmbedSummary {
                    url: source.url().to_string(),
                    blob: source.is_blob(),
                };
                embeds.insert(attempt, EmbedSlot::Ready(source));
                Ok(summary)
            }
            Err(err) => {
                embeds.remove(&attempt);
                preview_warn!("Embedding attempt {} failed: {}", attempt, err);
                Err(err)
            }
        }
    };
    let _ = event_tx.send(EngineEvent::EmbedReady { attempt, result });
}

fn handle_open_embed(shared: &Shared, attempt: AttemptId, event_tx: &mpsc::Sender<EngineEvent>) {
    let result = match shared.embeds().get(&attempt) {
        Some(EmbedSlot::Ready(source)) => shared
            .parts
            .embed
            .open(source)
            .map(|()| source.url().to_string()),
        _ => Err(LoadError::new(
            FailureKind::Decode,
            format!("no embedded preview for attempt {attempt}"),
        )),
    };
    let _ = event_tx.send(EngineEvent::EmbedOpened { attempt, result });
}
