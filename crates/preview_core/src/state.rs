use crate::view_model::ViewerViewModel;

pub type AttemptId = u64;

/// Default demo input: a shipping label hosted on S3.
pub const SAMPLE_LABEL_URL: &str = "https://pickpack-assets.s3.us-east-1.amazonaws.com/serverless/pnp/dev/printed-labels/packages/00bece1b-fa2d-4111-b9f2-e262db7064cd.pdf";

/// Shown when every loading strategy failed.
pub const LOAD_FAILED_MESSAGE: &str =
    "Cannot load PDF due to CORS restrictions. Please try the iframe solution or use a CORS-enabled URL.";

const DEFAULT_FILE_NAME: &str = "document.pdf";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading {
        attempt: AttemptId,
    },
    Ready {
        attempt: AttemptId,
        page_count: u32,
        strategy: String,
    },
    Failed {
        message: String,
    },
}

/// Embedded whole-file preview, tracked apart from the paged viewer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EmbedStatus {
    #[default]
    Idle,
    Preparing {
        attempt: AttemptId,
    },
    Ready {
        attempt: AttemptId,
        url: String,
        blob: bool,
    },
    Failed {
        message: String,
    },
}

impl EmbedStatus {
    pub fn attempt(&self) -> Option<AttemptId> {
        match self {
            EmbedStatus::Preparing { attempt } | EmbedStatus::Ready { attempt, .. } => {
                Some(*attempt)
            }
            EmbedStatus::Idle | EmbedStatus::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewerState {
    input: String,
    source_url: Option<String>,
    last_attempt: AttemptId,
    current_attempt: Option<AttemptId>,
    status: LoadStatus,
    current_page: u32,
    rendered_page: Option<u32>,
    printing: bool,
    sharing: bool,
    embed: EmbedStatus,
    embed_opening: bool,
    error: Option<String>,
    error_detail: Option<String>,
    dirty: bool,
}

impl ViewerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> ViewerViewModel {
        let page_count = self.page_count();
        let ready = page_count > 0;
        ViewerViewModel {
            input: self.input.clone(),
            source_url: self.source_url.clone(),
            status: self.status.clone(),
            loading: matches!(self.status, LoadStatus::Loading { .. }),
            page_count,
            current_page: if ready { self.current_page } else { 0 },
            rendered_page: self.rendered_page,
            show_navigation: page_count > 1,
            can_prev: ready && self.current_page > 1,
            can_next: ready && self.current_page < page_count,
            can_print: ready && !self.printing,
            can_share: self.share_target().is_some() && !self.sharing,
            printing: self.printing,
            sharing: self.sharing,
            embed_url: match &self.embed {
                EmbedStatus::Ready { url, .. } => Some(url.clone()),
                _ => None,
            },
            embed_is_blob: matches!(self.embed, EmbedStatus::Ready { blob: true, .. }),
            embed_preparing: matches!(self.embed, EmbedStatus::Preparing { .. }),
            embed_error: match &self.embed {
                EmbedStatus::Failed { message } => Some(message.clone()),
                _ => None,
            },
            embed_opening: self.embed_opening,
            can_open_embed: matches!(self.embed, EmbedStatus::Ready { .. }) && !self.embed_opening,
            error: self.error.clone(),
            error_detail: self.error_detail.clone(),
            dirty: self.dirty,
        }
    }

    /// Returns whether the view changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.current_attempt
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn input(&self) -> &str {
        &self.input
    }

    pub(crate) fn set_input(&mut self, input: String) {
        if self.input != input {
            self.input = input;
            self.mark_dirty();
        }
    }

    pub(crate) fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    /// URL acted on by share and embed: the typed input when it parses,
    /// otherwise the loaded source.
    pub(crate) fn share_target(&self) -> Option<String> {
        let typed = self.input.trim();
        if !typed.is_empty() && url::Url::parse(typed).is_ok() {
            return Some(typed.to_string());
        }
        self.source_url.clone()
    }

    pub(crate) fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub(crate) fn page_count(&self) -> u32 {
        match self.status {
            LoadStatus::Ready { page_count, .. } => page_count,
            _ => 0,
        }
    }

    pub(crate) fn current_page(&self) -> u32 {
        self.current_page
    }

    pub(crate) fn is_current(&self, attempt: AttemptId) -> bool {
        self.current_attempt == Some(attempt)
    }

    /// Drops the current attempt, returning it so its document can be released.
    pub(crate) fn take_attempt(&mut self) -> Option<AttemptId> {
        self.current_attempt.take()
    }

    fn next_attempt(&mut self) -> AttemptId {
        self.last_attempt += 1;
        self.last_attempt
    }

    pub(crate) fn begin_attempt(&mut self, url: String) -> AttemptId {
        let attempt = self.next_attempt();
        self.current_attempt = Some(attempt);
        self.source_url = Some(url);
        self.status = LoadStatus::Loading { attempt };
        self.current_page = 1;
        self.rendered_page = None;
        self.clear_error();
        self.mark_dirty();
        attempt
    }

    pub(crate) fn reject_source(&mut self, message: String) {
        self.source_url = None;
        self.status = LoadStatus::Failed {
            message: message.clone(),
        };
        self.current_page = 0;
        self.rendered_page = None;
        self.error = Some(message);
        self.error_detail = None;
        self.mark_dirty();
    }

    pub(crate) fn apply_loaded(&mut self, attempt: AttemptId, page_count: u32, strategy: String) {
        self.status = LoadStatus::Ready {
            attempt,
            page_count,
            strategy,
        };
        self.current_page = 1;
        self.rendered_page = None;
        self.clear_error();
        self.mark_dirty();
    }

    pub(crate) fn apply_failed(&mut self, detail: String) {
        self.status = LoadStatus::Failed {
            message: LOAD_FAILED_MESSAGE.to_string(),
        };
        self.current_page = 0;
        self.error = Some(LOAD_FAILED_MESSAGE.to_string());
        self.error_detail = Some(detail);
        self.mark_dirty();
    }

    pub(crate) fn set_current_page(&mut self, page: u32) {
        self.current_page = page;
        self.mark_dirty();
    }

    pub(crate) fn apply_rendered(&mut self, page: u32) {
        if page == self.current_page && self.rendered_page != Some(page) {
            self.rendered_page = Some(page);
            self.mark_dirty();
        }
    }

    pub(crate) fn set_error(&mut self, message: String) {
        self.error = Some(message);
        self.mark_dirty();
    }

    fn clear_error(&mut self) {
        self.error = None;
        self.error_detail = None;
    }

    pub(crate) fn is_printing(&self) -> bool {
        self.printing
    }

    pub(crate) fn set_printing(&mut self, printing: bool) {
        self.printing = printing;
        self.mark_dirty();
    }

    pub(crate) fn is_sharing(&self) -> bool {
        self.sharing
    }

    pub(crate) fn set_sharing(&mut self, sharing: bool) {
        self.sharing = sharing;
        self.mark_dirty();
    }

    pub(crate) fn embed(&self) -> &EmbedStatus {
        &self.embed
    }

    /// Drops the embed, returning its attempt so the engine can revoke it.
    pub(crate) fn take_embed(&mut self) -> Option<AttemptId> {
        let attempt = self.embed.attempt();
        if attempt.is_some() {
            self.embed = EmbedStatus::Idle;
            self.embed_opening = false;
            self.mark_dirty();
        }
        attempt
    }

    pub(crate) fn begin_embed(&mut self) -> AttemptId {
        let attempt = self.next_attempt();
        self.embed = EmbedStatus::Preparing { attempt };
        self.mark_dirty();
        attempt
    }

    pub(crate) fn set_embed(&mut self, embed: EmbedStatus) {
        self.embed = embed;
        self.mark_dirty();
    }

    pub(crate) fn is_embed_opening(&self) -> bool {
        self.embed_opening
    }

    pub(crate) fn set_embed_opening(&mut self, opening: bool) {
        self.embed_opening = opening;
        self.mark_dirty();
    }

    pub(crate) fn close(&mut self) {
        let last_attempt = self.last_attempt;
        let input = std::mem::take(&mut self.input);
        *self = Self {
            input,
            last_attempt,
            dirty: true,
            ..Self::default()
        };
    }
}

/// File name offered to share targets: the URL's last path segment when it
/// looks like a file, else `document.pdf`.
pub fn suggested_file_name(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|segment| segment.contains('.') && !segment.starts_with('.'))
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
}
