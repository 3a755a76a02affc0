use std::time::{Duration, Instant};

use preview_core::{update, LoadStatus, Msg, ViewerState, ViewerViewModel, SAMPLE_LABEL_URL};
use preview_logging::{preview_debug, preview_warn};
use thiserror::Error;

use super::args::{Command, Source};
use super::effects::EffectRunner;
use super::report::Report;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Upper bound on any one command, whatever the configured timeout says.
pub(crate) const MAX_SESSION_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("timed out after {0:?} waiting for the viewer to {1}")]
    Timeout(Duration, &'static str),
}

/// One headless viewer: core state driven by engine events.
pub(crate) struct Session {
    state: ViewerState,
    runner: EffectRunner,
    sample_url: String,
    timeout: Duration,
}

impl Session {
    pub(crate) fn new(runner: EffectRunner, sample_url: String, timeout: Duration) -> Self {
        Self {
            state: ViewerState::new(),
            runner,
            sample_url,
            timeout: timeout.min(MAX_SESSION_TIMEOUT),
        }
    }

    #[cfg(test)]
    pub(crate) fn view(&self) -> ViewerViewModel {
        self.state.view()
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        if state.consume_dirty() {
            let view = state.view();
            preview_debug!(
                "view status={:?} page={}/{} error={:?}",
                view.status,
                view.current_page,
                view.page_count,
                view.error
            );
        }
        self.state = state;
        self.runner.enqueue(effects);
    }

    fn source_url(&self, source: &Source) -> String {
        match source {
            Source::Sample => self.sample_url.clone(),
            Source::Url(url) => url.clone(),
        }
    }

    fn open(&mut self, source: &Source) {
        match source {
            Source::Sample if self.sample_url == SAMPLE_LABEL_URL => {
                self.dispatch(Msg::UseSampleClicked);
            }
            Source::Sample => {
                let url = self.sample_url.clone();
                self.dispatch(Msg::InputChanged(url));
                self.dispatch(Msg::PreviewSubmitted);
            }
            Source::Url(url) => {
                self.dispatch(Msg::InputChanged(url.clone()));
                self.dispatch(Msg::PreviewSubmitted);
            }
        }
    }

    /// Feeds engine events into the core until `done` holds for the view.
    fn pump_until(
        &mut self,
        goal: &'static str,
        deadline: Instant,
        done: impl Fn(&ViewerViewModel) -> bool,
    ) -> Result<(), SessionError> {
        loop {
            if done(&self.state.view()) {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SessionError::Timeout(self.timeout, goal));
            }
            let wait = (deadline - now).min(POLL_INTERVAL);
            if let Some(msg) = self.runner.next_msg(wait) {
                self.dispatch(msg);
            } else {
                self.dispatch(Msg::Tick);
            }
        }
    }

    fn settle_load(&mut self, deadline: Instant) -> Result<(), SessionError> {
        self.pump_until("load the document", deadline, |view| !view.loading)?;
        self.pump_until("render the page", deadline, page_settled)
    }

    pub(crate) fn run(&mut self, command: &Command) -> Result<Report, SessionError> {
        let deadline = deadline_after(self.timeout);
        match command {
            Command::Help => {}
            Command::Load { source } => {
                self.open(source);
                self.settle_load(deadline)?;
            }
            Command::Page { source, page } => {
                self.open(source);
                self.settle_load(deadline)?;
                if matches!(self.state.view().status, LoadStatus::Ready { .. }) {
                    self.dispatch(Msg::GoToPage(*page));
                    self.pump_until("render the page", deadline, page_settled)?;
                }
            }
            Command::Print { source } => {
                self.open(source);
                self.settle_load(deadline)?;
                if self.state.view().can_print {
                    self.dispatch(Msg::PrintClicked);
                    self.pump_until("finish printing", deadline, |view| !view.printing)?;
                }
            }
            Command::Share { source, name } => {
                self.runner.override_share_name(name.clone());
                let url = self.source_url(source);
                self.dispatch(Msg::InputChanged(url));
                if self.state.view().can_share {
                    self.dispatch(Msg::ShareClicked);
                    self.pump_until("finish sharing", deadline, |view| !view.sharing)?;
                } else {
                    // Surfaces the invalid URL without touching the engine.
                    self.dispatch(Msg::PreviewSubmitted);
                }
            }
            Command::Embed { source, open } => {
                let url = self.source_url(source);
                self.dispatch(Msg::InputChanged(url));
                self.dispatch(Msg::EmbedClicked);
                if !self.state.view().embed_preparing {
                    self.dispatch(Msg::PreviewSubmitted);
                } else {
                    self.pump_until("prepare the preview", deadline, |view| {
                        !view.embed_preparing
                    })?;
                    if *open && self.state.view().can_open_embed {
                        self.dispatch(Msg::EmbedOpenClicked);
                        self.pump_until("open the preview", deadline, |view| {
                            !view.embed_opening
                        })?;
                    }
                }
            }
        }

        let view = self.state.view();
        let report = Report::from_session(command.name(), &view, self.runner.observations());
        if let Some(error) = &report.error {
            preview_warn!("{} finished with error: {}", command.name(), error);
        }
        Ok(report)
    }

    /// Releases the current document, as closing the viewer does.
    pub(crate) fn close(&mut self) {
        self.dispatch(Msg::Closed);
    }
}

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(MAX_SESSION_TIMEOUT))
        .unwrap_or(now)
}

/// A ready document has its current page drawn, or an error explains why not.
fn page_settled(view: &ViewerViewModel) -> bool {
    match view.status {
        LoadStatus::Ready { .. } => {
            view.rendered_page == Some(view.current_page) || view.error.is_some()
        }
        _ => true,
    }
}
