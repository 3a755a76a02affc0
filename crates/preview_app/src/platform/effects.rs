use std::io;
use std::time::Duration;

use preview_core::{Effect, Msg};
use preview_engine::{
    ChainState, EngineConfig, EngineEvent, EngineHandle, ShareOutcome, Viewport,
};
use preview_logging::{preview_debug, preview_info, preview_warn};

/// Side information the core does not track but the report shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Observations {
    pub strategies_tried: Vec<String>,
    pub viewport: Option<Viewport>,
    pub print_uri: Option<String>,
    pub share: Option<ShareOutcome>,
    pub opened_embed: Option<String>,
}

/// Executes core effects against the engine and turns engine events back
/// into core messages.
pub(crate) struct EffectRunner {
    engine: EngineHandle,
    share_name: Option<String>,
    observations: Observations,
}

impl EffectRunner {
    pub(crate) fn new(config: EngineConfig) -> io::Result<Self> {
        Ok(Self::with_engine(EngineHandle::new(config)?))
    }

    #[cfg(test)]
    pub(crate) fn with_parts(parts: preview_engine::EngineParts) -> io::Result<Self> {
        Ok(Self::with_engine(EngineHandle::with_parts(parts)?))
    }

    fn with_engine(engine: EngineHandle) -> Self {
        Self {
            engine,
            share_name: None,
            observations: Observations::default(),
        }
    }

    /// Replaces the file name derived from the URL for share requests.
    pub(crate) fn override_share_name(&mut self, name: Option<String>) {
        self.share_name = name;
    }

    pub(crate) fn observations(&self) -> &Observations {
        &self.observations
    }

    pub(crate) fn enqueue(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartLoad { attempt, url } => {
                    preview_info!("StartLoad attempt={} url={}", attempt, url);
                    self.observations.strategies_tried.clear();
                    self.observations.viewport = None;
                    self.engine.load(attempt, url);
                }
                Effect::ReleaseDocument { attempt } => {
                    preview_debug!("ReleaseDocument attempt={}", attempt);
                    self.engine.release(attempt);
                }
                Effect::RenderPage { attempt, page } => {
                    self.engine.render(attempt, page);
                }
                Effect::Print { attempt, url } => {
                    preview_info!("Print attempt={} url={}", attempt, url);
                    self.engine.print(Some(attempt), url);
                }
                Effect::Share { url, name } => {
                    let name = self.share_name.clone().unwrap_or(name);
                    preview_info!("Share url={} name={}", url, name);
                    self.engine.share(url, name);
                }
                Effect::PrepareEmbed { attempt, url } => {
                    preview_info!("PrepareEmbed attempt={} url={}", attempt, url);
                    self.engine.embed(attempt, url);
                }
                Effect::OpenEmbed { attempt } => {
                    self.engine.open_embed(attempt);
                }
            }
        }
    }

    /// Waits up to `timeout` for the next engine event that maps to a message.
    pub(crate) fn next_msg(&mut self, timeout: Duration) -> Option<Msg> {
        let event = self.engine.recv_timeout(timeout)?;
        Some(self.translate(event))
    }

    fn translate(&mut self, event: EngineEvent) -> Msg {
        match event {
            EngineEvent::ChainProgress { attempt, state } => {
                match &state {
                    ChainState::Attempting { index, strategy } => {
                        preview_debug!("attempt {} trying #{} {}", attempt, index, strategy);
                        self.observations.strategies_tried.push(strategy.clone());
                    }
                    ChainState::Succeeded { strategy } => {
                        preview_info!("attempt {} loaded via {}", attempt, strategy);
                    }
                    ChainState::Failed => {
                        preview_warn!("attempt {} exhausted every strategy", attempt);
                    }
                    ChainState::Idle => {}
                }
                Msg::NoOp
            }
            EngineEvent::LoadCompleted { attempt, result } => match result {
                Ok(summary) => Msg::LoadSucceeded {
                    attempt,
                    page_count: summary.page_count,
                    strategy: summary.strategy,
                },
                Err(err) => Msg::LoadFailed {
                    attempt,
                    message: err.to_string(),
                },
            },
            EngineEvent::PageRendered { attempt, result } => match result {
                Ok(rendered) => {
                    self.observations.viewport = Some(rendered.viewport);
                    Msg::PageRendered {
                        attempt,
                        page: rendered.page.number,
                    }
                }
                Err(err) => Msg::RenderFailed {
                    attempt,
                    message: err.to_string(),
                },
            },
            EngineEvent::PrintCompleted { result } => match result {
                Ok(receipt) => {
                    self.observations.print_uri = Some(receipt.uri);
                    Msg::PrintFinished { error: None }
                }
                Err(err) => {
                    preview_warn!("Print failed: {}", err);
                    Msg::PrintFinished {
                        error: Some(err.message),
                    }
                }
            },
            EngineEvent::ShareCompleted { result } => match result {
                Ok(outcome) => {
                    self.observations.share = Some(outcome);
                    Msg::ShareFinished { error: None }
                }
                Err(err) => Msg::ShareFinished {
                    error: Some(err.to_string()),
                },
            },
            EngineEvent::EmbedReady { attempt, result } => match result {
                Ok(summary) => Msg::EmbedReady {
                    attempt,
                    url: summary.url,
                    blob: summary.blob,
                },
                Err(err) => Msg::EmbedFailed {
                    attempt,
                    message: err.to_string(),
                },
            },
            EngineEvent::EmbedOpened { attempt, result } => match result {
                Ok(url) => {
                    self.observations.opened_embed = Some(url);
                    Msg::EmbedOpened {
                        attempt,
                        error: None,
                    }
                }
                Err(err) => Msg::EmbedOpened {
                    attempt,
                    error: Some(err.to_string()),
                },
            },
        }
    }
}
