use crate::LoadStatus;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewerViewModel {
    pub input: String,
    pub source_url: Option<String>,
    pub status: LoadStatus,
    pub loading: bool,
    pub page_count: u32,
    /// 1-based; 0 while no document is ready.
    pub current_page: u32,
    pub rendered_page: Option<u32>,
    /// Navigation is only offered for multi-page documents.
    pub show_navigation: bool,
    pub can_prev: bool,
    pub can_next: bool,
    pub can_print: bool,
    pub can_share: bool,
    pub printing: bool,
    pub sharing: bool,
    /// Blob or raw URL the embedded preview shows.
    pub embed_url: Option<String>,
    pub embed_is_blob: bool,
    pub embed_preparing: bool,
    pub embed_error: Option<String>,
    pub embed_opening: bool,
    pub can_open_embed: bool,
    pub error: Option<String>,
    pub error_detail: Option<String>,
    pub dirty: bool,
}

impl ViewerViewModel {
    pub fn page_label(&self) -> Option<String> {
        (self.page_count > 0).then(|| format!("Page {} of {}", self.current_page, self.page_count))
    }
}
