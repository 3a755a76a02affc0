use std::fmt::Write as _;

use chrono::Utc;
use preview_core::{LoadStatus, ViewerViewModel};
use preview_engine::ShareOutcome;
use serde::Serialize;

use super::effects::Observations;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct ReportViewport {
    pub width_px: u32,
    pub height_px: u32,
}

/// Outcome of one command, printed as text or JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Report {
    pub generated_utc: String,
    pub command: String,
    pub source_url: Option<String>,
    pub status: &'static str,
    pub success: bool,
    pub strategy: Option<String>,
    pub strategies_tried: Vec<String>,
    pub page_count: u32,
    pub current_page: u32,
    pub rendered_page: Option<u32>,
    pub page_label: Option<String>,
    pub viewport: Option<ReportViewport>,
    pub print_uri: Option<String>,
    pub share: Option<String>,
    pub embed_url: Option<String>,
    pub embed_blob: bool,
    pub opened: Option<String>,
    pub error: Option<String>,
    pub error_detail: Option<String>,
}

impl Report {
    pub(crate) fn from_session(
        command: &str,
        view: &ViewerViewModel,
        observations: &Observations,
    ) -> Self {
        let (status, strategy) = match &view.status {
            LoadStatus::Idle => ("idle", None),
            LoadStatus::Loading { .. } => ("loading", None),
            LoadStatus::Ready { strategy, .. } => ("ready", Some(strategy.clone())),
            LoadStatus::Failed { .. } => ("failed", None),
        };
        let share = observations.share.as_ref().map(|outcome| match outcome {
            ShareOutcome::Shared { filename } => format!("shared {filename}"),
            ShareOutcome::OpenedFallback { url } => format!("opened {url}"),
        });
        let error = view.embed_error.clone().or_else(|| view.error.clone());
        // Share and embed never load the document, so only their own
        // outcome counts.
        let success = match command {
            "share" => share.is_some(),
            "embed" => view.embed_url.is_some() && error.is_none(),
            _ => error.is_none(),
        };

        Self {
            generated_utc: Utc::now().to_rfc3339(),
            command: command.to_string(),
            source_url: view.source_url.clone(),
            status,
            success,
            strategy,
            strategies_tried: observations.strategies_tried.clone(),
            page_count: view.page_count,
            current_page: view.current_page,
            rendered_page: view.rendered_page,
            page_label: view.page_label(),
            viewport: observations.viewport.map(|viewport| ReportViewport {
                width_px: viewport.width_px,
                height_px: viewport.height_px,
            }),
            print_uri: observations.print_uri.clone(),
            share,
            embed_url: view.embed_url.clone(),
            embed_blob: view.embed_is_blob,
            opened: observations.opened_embed.clone(),
            error,
            error_detail: view.error_detail.clone(),
        }
    }

    pub(crate) fn is_success(&self) -> bool {
        self.success
    }

    pub(crate) fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub(crate) fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}: {}", self.command, self.status);
        if let Some(url) = &self.source_url {
            let _ = writeln!(out, "  source:   {url}");
        }
        if !self.strategies_tried.is_empty() {
            let _ = writeln!(out, "  tried:    {}", self.strategies_tried.join(" -> "));
        }
        if let Some(strategy) = &self.strategy {
            let _ = writeln!(out, "  loaded:   {strategy}");
        }
        if let Some(label) = &self.page_label {
            let _ = writeln!(out, "  {label}");
        }
        if let Some(viewport) = self.viewport {
            let _ = writeln!(
                out,
                "  viewport: {}x{} px",
                viewport.width_px, viewport.height_px
            );
        }
        if let Some(uri) = &self.print_uri {
            let _ = writeln!(out, "  printed:  {uri}");
        }
        if let Some(share) = &self.share {
            let _ = writeln!(out, "  share:    {share}");
        }
        if let Some(url) = &self.embed_url {
            let kind = if self.embed_blob { "blob" } else { "direct" };
            let _ = writeln!(out, "  embed:    {url} ({kind})");
        }
        if let Some(url) = &self.opened {
            let _ = writeln!(out, "  opened:   {url}");
        }
        if let Some(error) = &self.error {
            let _ = writeln!(out, "  error:    {error}");
        }
        if let Some(detail) = &self.error_detail {
            let _ = writeln!(out, "  detail:   {detail}");
        }
        out
    }
}
