mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use preview_engine::{
    AttemptId, BlobStore, ChainState, Credentials, DirectStrategy, DocumentDecoder, EmbedPreview,
    EmbedSummary, EngineEvent, EngineHandle, EngineParts, FailureKind, FetchSettings, Fetcher,
    LoadError, LoadStrategy, LopdfDecoder, Opener, ReqwestFetcher, ShareHandoff,
    SimulatedPrintBinding, StrategyChain, UnavailableShareSheet,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingOpener {
    opened: Mutex<Vec<url::Url>>,
}

impl Opener for RecordingOpener {
    fn open(&self, url: &url::Url) -> Result<(), LoadError> {
        self.opened.lock().unwrap().push(url.clone());
        Ok(())
    }
}

fn engine() -> EngineHandle {
    engine_with_opener(None)
}

fn engine_with_opener(opener: Option<Arc<dyn Opener>>) -> EngineHandle {
    let fetcher: Arc<dyn Fetcher> = Arc::new(ReqwestFetcher::new(FetchSettings::default()));
    let decoder: Arc<dyn DocumentDecoder> = Arc::new(LopdfDecoder);
    let direct: Arc<dyn LoadStrategy> = Arc::new(DirectStrategy::new(fetcher.clone(), decoder));
    let blobs = Arc::new(BlobStore::new().unwrap());
    let parts = EngineParts {
        chain: StrategyChain::new(vec![direct]),
        printer: Arc::new(SimulatedPrintBinding::new(Duration::from_millis(5))),
        share: ShareHandoff::new(
            fetcher.clone(),
            Arc::new(UnavailableShareSheet),
            None,
            blobs.clone(),
            Credentials::Omit,
        ),
        embed: EmbedPreview::new(fetcher, blobs, opener),
        render_scale: 1.0,
    };
    EngineHandle::with_parts(parts).unwrap()
}

/// Collects events until `done` matches one or the deadline passes.
fn collect_until(
    engine: &EngineHandle,
    deadline: Duration,
    done: impl Fn(&EngineEvent) -> bool,
) -> Vec<EngineEvent> {
    let start = Instant::now();
    let mut events = Vec::new();
    while start.elapsed() < deadline {
        if let Some(event) = engine.recv_timeout(Duration::from_millis(20)) {
            let finished = done(&event);
            events.push(event);
            if finished {
                break;
            }
        }
    }
    events
}

fn completed_attempts(events: &[EngineEvent]) -> Vec<AttemptId> {
    events
        .iter()
        .filter_map(|event| match event {
            EngineEvent::LoadCompleted { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect()
}

async fn label_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(400))
                .set_body_raw(common::label_pdf(1), "application/pdf"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private.pdf"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/three.pdf"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(common::label_pdf(3), "application/pdf"),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test(flavor = "multi_thread")]
async fn load_then_render_reports_page_geometry() {
    common::init_logging();
    let server = label_server().await;
    let engine = engine();

    engine.load(1, format!("{}/three.pdf", server.uri()));
    let events = collect_until(&engine, Duration::from_secs(5), |e| {
        matches!(e, EngineEvent::LoadCompleted { .. })
    });
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::ChainProgress {
            attempt: 1,
            state: ChainState::Succeeded { .. }
        }
    )));
    match events.last() {
        Some(EngineEvent::LoadCompleted { attempt: 1, result }) => {
            let summary = result.as_ref().unwrap();
            assert_eq!(summary.page_count, 3);
            assert_eq!(summary.strategy, "Direct URL");
        }
        other => panic!("unexpected event {other:?}"),
    }

    engine.render(1, 3);
    let events = collect_until(&engine, Duration::from_secs(2), |e| {
        matches!(e, EngineEvent::PageRendered { .. })
    });
    match events.last() {
        Some(EngineEvent::PageRendered { attempt: 1, result }) => {
            let rendered = result.as_ref().unwrap();
            assert_eq!(rendered.page.number, 3);
            assert_eq!(rendered.viewport.width_px, 288);
            assert_eq!(rendered.viewport.height_px, 432);
        }
        other => panic!("unexpected event {other:?}"),
    }

    engine.render(1, 4);
    let events = collect_until(&engine, Duration::from_secs(2), |e| {
        matches!(e, EngineEvent::PageRendered { .. })
    });
    assert!(matches!(
        events.last(),
        Some(EngineEvent::PageRendered {
            result: Err(_),
            ..
        })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn superseded_attempt_result_is_discarded() {
    let server = label_server().await;
    let engine = engine();

    engine.load(1, format!("{}/slow.pdf", server.uri()));
    engine.load(2, format!("{}/three.pdf", server.uri()));

    // Wait well past the slow response so a stale completion would have arrived.
    let events = collect_until(&engine, Duration::from_millis(1500), |_| false);
    assert_eq!(completed_attempts(&events), vec![2]);
}

#[tokio::test(flavor = "multi_thread")]
async fn released_attempt_no_longer_renders() {
    let server = label_server().await;
    let engine = engine();

    engine.load(7, format!("{}/three.pdf", server.uri()));
    collect_until(&engine, Duration::from_secs(5), |e| {
        matches!(e, EngineEvent::LoadCompleted { .. })
    });
    engine.release(7);
    engine.render(7, 1);
    let events = collect_until(&engine, Duration::from_secs(2), |e| {
        matches!(e, EngineEvent::PageRendered { .. })
    });
    match events.last() {
        Some(EngineEvent::PageRendered { result: Err(err), .. }) => {
            assert_eq!(err.kind, FailureKind::Decode);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn release_during_load_discards_the_result() {
    let server = label_server().await;
    let engine = engine();

    engine.load(3, format!("{}/slow.pdf", server.uri()));
    engine.release(3);

    let events = collect_until(&engine, Duration::from_millis(1200), |_| false);
    assert!(completed_attempts(&events).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn print_uses_the_binding() {
    let server = label_server().await;
    let engine = engine();
    let url = format!("{}/three.pdf", server.uri());

    engine.load(1, url.clone());
    collect_until(&engine, Duration::from_secs(5), |e| {
        matches!(e, EngineEvent::LoadCompleted { .. })
    });
    engine.print(Some(1), url.clone());
    let events = collect_until(&engine, Duration::from_secs(2), |e| {
        matches!(e, EngineEvent::PrintCompleted { .. })
    });
    match events.last() {
        Some(EngineEvent::PrintCompleted { result: Ok(receipt) }) => assert_eq!(receipt.uri, url),
        other => panic!("unexpected event {other:?}"),
    }
}

fn embed_result(events: &[EngineEvent]) -> Option<&Result<EmbedSummary, LoadError>> {
    events.iter().find_map(|event| match event {
        EngineEvent::EmbedReady { result, .. } => Some(result),
        _ => None,
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_holds_a_blob_until_release() {
    common::init_logging();
    let server = label_server().await;
    let engine = engine();

    engine.embed(4, format!("{}/three.pdf", server.uri()));
    let events = collect_until(&engine, Duration::from_secs(5), |e| {
        matches!(e, EngineEvent::EmbedReady { .. })
    });
    let summary = embed_result(&events).unwrap().as_ref().unwrap().clone();
    assert!(summary.blob);
    let file = url::Url::parse(&summary.url).unwrap().to_file_path().unwrap();
    assert!(std::fs::read(&file).unwrap().starts_with(b"%PDF"));

    engine.release(4);
    // Release is handled in order; a later command proves it ran.
    engine.open_embed(4);
    collect_until(&engine, Duration::from_secs(2), |e| {
        matches!(e, EngineEvent::EmbedOpened { .. })
    });
    assert!(!file.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn blocked_embed_falls_back_to_the_raw_url() {
    let server = label_server().await;
    let engine = engine();
    let url = format!("{}/private.pdf", server.uri());

    engine.embed(1, url.clone());
    let events = collect_until(&engine, Duration::from_secs(5), |e| {
        matches!(e, EngineEvent::EmbedReady { .. })
    });
    assert_eq!(
        embed_result(&events),
        Some(&Ok(EmbedSummary { url, blob: false }))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_embed_source_reports_http_status() {
    let server = label_server().await;
    let engine = engine();

    engine.embed(1, format!("{}/missing.pdf", server.uri()));
    let events = collect_until(&engine, Duration::from_secs(5), |e| {
        matches!(e, EngineEvent::EmbedReady { .. })
    });
    match embed_result(&events) {
        Some(Err(err)) => assert_eq!(err.kind, FailureKind::HttpStatus(404)),
        other => panic!("unexpected result {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_released_while_fetching_is_dropped() {
    let server = label_server().await;
    let engine = engine();

    engine.embed(5, format!("{}/slow.pdf", server.uri()));
    engine.release(5);
    let events = collect_until(&engine, Duration::from_millis(1200), |_| false);
    assert!(embed_result(&events).is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn open_embed_hands_the_blob_to_the_viewer() {
    let server = label_server().await;
    let opener = Arc::new(RecordingOpener::default());
    let engine = engine_with_opener(Some(opener.clone() as Arc<dyn Opener>));

    engine.embed(2, format!("{}/three.pdf", server.uri()));
    let events = collect_until(&engine, Duration::from_secs(5), |e| {
        matches!(e, EngineEvent::EmbedReady { .. })
    });
    let summary = embed_result(&events).unwrap().as_ref().unwrap().clone();

    engine.open_embed(2);
    let events = collect_until(&engine, Duration::from_secs(2), |e| {
        matches!(e, EngineEvent::EmbedOpened { .. })
    });
    match events.last() {
        Some(EngineEvent::EmbedOpened {
            attempt: 2,
            result: Ok(url),
        }) => assert_eq!(url, &summary.url),
        other => panic!("unexpected event {other:?}"),
    }
    let opened = opener.opened.lock().unwrap();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].as_str(), summary.url);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_stops_event_delivery() {
    let server = label_server().await;
    let engine = engine();

    engine.shutdown();
    engine.load(1, format!("{}/three.pdf", server.uri()));
    engine.render(1, 1);
    let events = collect_until(&engine, Duration::from_millis(600), |_| false);
    assert!(events.is_empty());
}
