use crate::AttemptId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User edited the URL input box.
    InputChanged(String),
    /// User asked to preview the current input.
    PreviewSubmitted,
    /// User picked the bundled sample label.
    UseSampleClicked,
    /// Engine loaded a document for an attempt.
    LoadSucceeded {
        attempt: AttemptId,
        page_count: u32,
        strategy: String,
    },
    /// Engine gave up on an attempt.
    LoadFailed { attempt: AttemptId, message: String },
    NextPage,
    PrevPage,
    GoToPage(u32),
    PageRendered { attempt: AttemptId, page: u32 },
    RenderFailed { attempt: AttemptId, message: String },
    PrintClicked,
    PrintFinished { error: Option<String> },
    /// Share the typed URL, or the loaded one when the input is not a URL.
    ShareClicked,
    ShareFinished { error: Option<String> },
    /// User asked for the embedded whole-file preview.
    EmbedClicked,
    EmbedReady {
        attempt: AttemptId,
        url: String,
        blob: bool,
    },
    EmbedFailed { attempt: AttemptId, message: String },
    /// Print from the embedded preview by opening it in the system viewer.
    EmbedOpenClicked,
    EmbedOpened {
        attempt: AttemptId,
        error: Option<String>,
    },
    /// The viewer is being torn down.
    Closed,
    /// Render tick to coalesce output.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
