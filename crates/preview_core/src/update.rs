use crate::{
    suggested_file_name, Effect, EmbedStatus, LoadStatus, Msg, ViewerState, SAMPLE_LABEL_URL,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: ViewerState, msg: Msg) -> (ViewerState, Vec<Effect>) {
    let effects = match msg {
        Msg::InputChanged(text) => {
            state.set_input(text);
            Vec::new()
        }
        Msg::PreviewSubmitted => {
            let url = state.input().trim().to_string();
            if url.is_empty() {
                return (state, Vec::new());
            }
            submit_source(&mut state, url)
        }
        Msg::UseSampleClicked => {
            state.set_input(SAMPLE_LABEL_URL.to_string());
            submit_source(&mut state, SAMPLE_LABEL_URL.to_string())
        }
        Msg::LoadSucceeded {
            attempt,
            page_count,
            strategy,
        } => {
            // Results of superseded attempts are dropped without touching state.
            if !state.is_current(attempt)
                || !matches!(state.status(), LoadStatus::Loading { .. })
            {
                return (state, Vec::new());
            }
            if page_count == 0 {
                state.apply_failed(format!("[{strategy}] document has no pages"));
                return (state, Vec::new());
            }
            state.apply_loaded(attempt, page_count, strategy);
            vec![Effect::RenderPage { attempt, page: 1 }]
        }
        Msg::LoadFailed { attempt, message } => {
            if !state.is_current(attempt)
                || !matches!(state.status(), LoadStatus::Loading { .. })
            {
                return (state, Vec::new());
            }
            state.apply_failed(message);
            Vec::new()
        }
        Msg::NextPage => {
            let target = state.current_page().saturating_add(1);
            go_to_page(&mut state, target)
        }
        Msg::PrevPage => {
            let target = state.current_page().saturating_sub(1);
            go_to_page(&mut state, target)
        }
        Msg::GoToPage(page) => go_to_page(&mut state, page),
        Msg::PageRendered { attempt, page } => {
            if state.is_current(attempt) {
                state.apply_rendered(page);
            }
            Vec::new()
        }
        Msg::RenderFailed { attempt, message } => {
            if state.is_current(attempt) {
                state.set_error(format!("Error rendering page: {message}"));
            }
            Vec::new()
        }
        Msg::PrintClicked => {
            let ready_attempt = match state.status() {
                LoadStatus::Ready { attempt, .. } => Some(*attempt),
                _ => None,
            };
            match (ready_attempt, state.source_url().map(str::to_string)) {
                (Some(attempt), Some(url)) if !state.is_printing() => {
                    state.set_printing(true);
                    vec![Effect::Print { attempt, url }]
                }
                _ => Vec::new(),
            }
        }
        Msg::PrintFinished { error } => {
            if !state.is_printing() {
                return (state, Vec::new());
            }
            state.set_printing(false);
            if let Some(error) = error {
                state.set_error(format!("Error printing PDF: {error}"));
            }
            Vec::new()
        }
        // Sharing hands over a URL; it never waits on or starts a load.
        Msg::ShareClicked => match state.share_target() {
            Some(url) if !state.is_sharing() => {
                state.set_sharing(true);
                let name = suggested_file_name(&url);
                vec![Effect::Share { url, name }]
            }
            _ => Vec::new(),
        },
        Msg::ShareFinished { error } => {
            if !state.is_sharing() {
                return (state, Vec::new());
            }
            state.set_sharing(false);
            if let Some(error) = error {
                state.set_error(error);
            }
            Vec::new()
        }
        Msg::EmbedClicked => {
            let Some(url) = state.share_target() else {
                return (state, Vec::new());
            };
            let mut effects = Vec::with_capacity(2);
            if let Some(previous) = state.take_embed() {
                effects.push(Effect::ReleaseDocument { attempt: previous });
            }
            let attempt = state.begin_embed();
            effects.push(Effect::PrepareEmbed { attempt, url });
            effects
        }
        Msg::EmbedReady { attempt, url, blob } => {
            if state.embed() == &(EmbedStatus::Preparing { attempt }) {
                state.set_embed(EmbedStatus::Ready { attempt, url, blob });
            }
            Vec::new()
        }
        Msg::EmbedFailed { attempt, message } => {
            if state.embed() == &(EmbedStatus::Preparing { attempt }) {
                state.set_embed(EmbedStatus::Failed {
                    message: format!("Error preparing preview: {message}"),
                });
            }
            Vec::new()
        }
        Msg::EmbedOpenClicked => {
            let ready = match state.embed() {
                EmbedStatus::Ready { attempt, .. } => Some(*attempt),
                _ => None,
            };
            match ready {
                Some(attempt) if !state.is_embed_opening() => {
                    state.set_embed_opening(true);
                    vec![Effect::OpenEmbed { attempt }]
                }
                _ => Vec::new(),
            }
        }
        Msg::EmbedOpened { attempt, error } => {
            let current = matches!(
                state.embed(),
                EmbedStatus::Ready { attempt: ready, .. } if *ready == attempt
            );
            if !current || !state.is_embed_opening() {
                return (state, Vec::new());
            }
            state.set_embed_opening(false);
            if let Some(error) = error {
                state.set_error(format!("Error opening preview: {error}"));
            }
            Vec::new()
        }
        Msg::Closed => {
            let released = [state.take_attempt(), state.take_embed()];
            state.close();
            released
                .into_iter()
                .flatten()
                .map(|attempt| Effect::ReleaseDocument { attempt })
                .collect()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

/// Switches the viewer to `url`, superseding whatever was loading or shown.
fn submit_source(state: &mut ViewerState, url: String) -> Vec<Effect> {
    let in_progress = matches!(
        state.status(),
        LoadStatus::Loading { .. } | LoadStatus::Ready { .. }
    );
    if in_progress && state.source_url() == Some(url.as_str()) {
        return Vec::new();
    }

    let mut effects = Vec::with_capacity(3);
    for previous in [state.take_attempt(), state.take_embed()].into_iter().flatten() {
        effects.push(Effect::ReleaseDocument { attempt: previous });
    }

    if let Err(err) = url::Url::parse(&url) {
        state.reject_source(format!("Invalid URL: {err}"));
        return effects;
    }

    let attempt = state.begin_attempt(url.clone());
    effects.push(Effect::StartLoad { attempt, url });
    effects
}

fn go_to_page(state: &mut ViewerState, page: u32) -> Vec<Effect> {
    let LoadStatus::Ready {
        attempt,
        page_count,
        ..
    } = *state.status()
    else {
        return Vec::new();
    };
    let target = page.clamp(1, page_count);
    if target == state.current_page() {
        return Vec::new();
    }
    state.set_current_page(target);
    vec![Effect::RenderPage {
        attempt,
        page: target,
    }]
}
