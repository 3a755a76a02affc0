//! Ordered fallback chain of ways to obtain a decoded document for a URL.
//!
//! Strategies run strictly one after another. The first success wins; a
//! failing strategy is logged under its name and the next one is tried. Only
//! when every strategy has failed does the caller see an error, and that
//! error is always [`ChainError::Exhausted`].

use std::sync::Arc;

use preview_logging::{preview_error, preview_info, preview_warn};

use crate::document::{DecodedDocument, DocumentDecoder};
use crate::fetch::{Credentials, FetchRequest, Fetcher};
use crate::{ChainState, FailureKind, LoadError, StrategyFailure};

pub const DEFAULT_PROXY_TEMPLATE: &str = "https://api.allorigins.win/raw?url={url}";
pub const EXHAUSTED_MESSAGE: &str = "All loading strategies failed";

#[async_trait::async_trait]
pub trait LoadStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn attempt(&self, url: &str) -> Result<Box<dyn DecodedDocument>, LoadError>;
}

/// Receives every state transition of a chain invocation.
pub trait ChainObserver: Send + Sync {
    fn on_state(&self, state: &ChainState);
}

/// Observer that ignores all transitions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ChainObserver for NoopObserver {
    fn on_state(&self, _state: &ChainState) {}
}

#[derive(Debug)]
pub struct LoadedDocument {
    pub strategy: String,
    pub document: Box<dyn DecodedDocument>,
}

impl LoadedDocument {
    pub fn page_count(&self) -> u32 {
        self.document.page_count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("invalid url: {}", .0.message)]
    InvalidUrl(LoadError),
    #[error("no loading strategies configured")]
    Empty,
    #[error("All loading strategies failed")]
    Exhausted { failures: Vec<StrategyFailure> },
}

impl ChainError {
    pub fn failures(&self) -> &[StrategyFailure] {
        match self {
            ChainError::Exhausted { failures } => failures,
            ChainError::InvalidUrl(_) | ChainError::Empty => &[],
        }
    }

    pub fn to_load_error(&self) -> LoadError {
        match self {
            ChainError::InvalidUrl(err) => err.clone(),
            ChainError::Empty | ChainError::Exhausted { .. } => {
                LoadError::new(FailureKind::Exhausted, self.to_string())
            }
        }
    }
}

/// Fetches the URL directly without credentials, asking for a PDF.
pub struct DirectStrategy {
    fetcher: Arc<dyn Fetcher>,
    decoder: Arc<dyn DocumentDecoder>,
}

impl DirectStrategy {
    pub fn new(fetcher: Arc<dyn Fetcher>, decoder: Arc<dyn DocumentDecoder>) -> Self {
        Self { fetcher, decoder }
    }
}

#[async_trait::async_trait]
impl LoadStrategy for DirectStrategy {
    fn name(&self) -> &str {
        "Direct URL"
    }

    async fn attempt(&self, url: &str) -> Result<Box<dyn DecodedDocument>, LoadError> {
        let output = self.fetcher.fetch(&FetchRequest::pdf(url)).await?;
        self.decoder.decode(&output.bytes)
    }
}

/// Fetches the URL with the caller's credentials attached.
pub struct CredentialedStrategy {
    fetcher: Arc<dyn Fetcher>,
    decoder: Arc<dyn DocumentDecoder>,
    credentials: Credentials,
}

impl CredentialedStrategy {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        decoder: Arc<dyn DocumentDecoder>,
        credentials: Credentials,
    ) -> Self {
        Self {
            fetcher,
            decoder,
            credentials,
        }
    }
}

#[async_trait::async_trait]
impl LoadStrategy for CredentialedStrategy {
    fn name(&self) -> &str {
        "Fetch"
    }

    async fn attempt(&self, url: &str) -> Result<Box<dyn DecodedDocument>, LoadError> {
        let request = FetchRequest::new(url).with_credentials(self.credentials.clone());
        let output = self.fetcher.fetch(&request).await?;
        self.decoder.decode(&output.bytes)
    }
}

/// Relays the request through a proxy. `{url}` in the template is replaced
/// with the percent-encoded source URL.
pub struct ProxyStrategy {
    name: String,
    template: String,
    fetcher: Arc<dyn Fetcher>,
    decoder: Arc<dyn DocumentDecoder>,
}

impl ProxyStrategy {
    pub fn new(
        template: impl Into<String>,
        fetcher: Arc<dyn Fetcher>,
        decoder: Arc<dyn DocumentDecoder>,
    ) -> Self {
        Self {
            name: "Proxy".to_string(),
            template: template.into(),
            fetcher,
            decoder,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn relay_url(&self, url: &str) -> String {
        let encoded = urlencoding::encode(url);
        if self.template.contains("{url}") {
            self.template.replace("{url}", &encoded)
        } else {
            format!("{}{}", self.template, encoded)
        }
    }
}

#[async_trait::async_trait]
impl LoadStrategy for ProxyStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, url: &str) -> Result<Box<dyn DecodedDocument>, LoadError> {
        let output = self
            .fetcher
            .fetch(&FetchRequest::new(self.relay_url(url)))
            .await
            .map_err(|err| LoadError::new(err.kind, format!("proxy failed: {}", err.message)))?;
        self.decoder.decode(&output.bytes)
    }
}

#[derive(Clone, Default)]
pub struct StrategyChain {
    strategies: Vec<Arc<dyn LoadStrategy>>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Arc<dyn LoadStrategy>>) -> Self {
        Self { strategies }
    }

    /// Direct, credentialed and one proxy strategy per template, in that order.
    pub fn standard(
        fetcher: Arc<dyn Fetcher>,
        decoder: Arc<dyn DocumentDecoder>,
        credentials: Credentials,
        proxy_templates: &[String],
    ) -> Self {
        let mut strategies: Vec<Arc<dyn LoadStrategy>> = vec![
            Arc::new(DirectStrategy::new(fetcher.clone(), decoder.clone())),
            Arc::new(CredentialedStrategy::new(
                fetcher.clone(),
                decoder.clone(),
                credentials,
            )),
        ];
        for (index, template) in proxy_templates.iter().enumerate() {
            let mut proxy = ProxyStrategy::new(template.clone(), fetcher.clone(), decoder.clone());
            if index > 0 {
                proxy = proxy.with_name(format!("Proxy {}", index + 1));
            }
            strategies.push(Arc::new(proxy));
        }
        Self { strategies }
    }

    pub fn push(&mut self, strategy: Arc<dyn LoadStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub async fn load(
        &self,
        url: &str,
        observer: &dyn ChainObserver,
    ) -> Result<LoadedDocument, ChainError> {
        observer.on_state(&ChainState::Idle);

        if let Err(err) = url::Url::parse(url) {
            preview_warn!("Rejecting url before any strategy: {}", err);
            observer.on_state(&ChainState::Failed);
            return Err(ChainError::InvalidUrl(LoadError::new(
                FailureKind::InvalidUrl,
                err.to_string(),
            )));
        }
        if self.strategies.is_empty() {
            observer.on_state(&ChainState::Failed);
            return Err(ChainError::Empty);
        }

        let mut failures = Vec::with_capacity(self.strategies.len());
        for (index, strategy) in self.strategies.iter().enumerate() {
            let name = strategy.name().to_string();
            observer.on_state(&ChainState::Attempting {
                index,
                strategy: name.clone(),
            });
            preview_info!("[{}] Attempting to load PDF...", name);

            match strategy.attempt(url).await {
                Ok(document) => {
                    preview_info!(
                        "[{}] PDF loaded successfully ({} pages)",
                        name,
                        document.page_count()
                    );
                    observer.on_state(&ChainState::Succeeded {
                        strategy: name.clone(),
                    });
                    return Ok(LoadedDocument {
                        strategy: name,
                        document,
                    });
                }
                Err(error) => {
                    preview_warn!("[{}] Failed: {}", name, error);
                    failures.push(StrategyFailure {
                        strategy: name,
                        error,
                    });
                }
            }
        }

        preview_error!("{} for {}", EXHAUSTED_MESSAGE, url);
        observer.on_state(&ChainState::Failed);
        Err(ChainError::Exhausted { failures })
    }
}
