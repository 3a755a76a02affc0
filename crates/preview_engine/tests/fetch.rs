mod common;

use std::time::Duration;

use preview_engine::{Credentials, FailureKind, FetchRequest, FetchSettings, Fetcher, ReqwestFetcher};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fetcher_returns_pdf_bytes_and_metadata() {
    common::init_logging();
    let server = MockServer::start().await;
    let body = common::label_pdf(1);
    Mock::given(method("GET"))
        .and(path("/label.pdf"))
        .and(header("accept", "application/pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.clone(), "application/pdf"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let url = format!("{}/label.pdf", server.uri());

    let output = fetcher.fetch(&FetchRequest::pdf(&url)).await.expect("fetch ok");
    assert_eq!(output.metadata.original_url, url);
    assert_eq!(output.metadata.final_url, output.metadata.original_url);
    assert_eq!(output.metadata.redirect_count, 0);
    assert_eq!(output.metadata.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(output.metadata.byte_len, body.len() as u64);
    assert_eq!(output.bytes.as_ref(), body.as_slice());
}

#[tokio::test]
async fn fetcher_fails_on_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let url = format!("{}/missing", server.uri());

    let err = fetcher.fetch(&FetchRequest::new(url)).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn forbidden_response_is_a_cross_origin_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/private.pdf"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let url = format!("{}/private.pdf", server.uri());

    let err = fetcher.fetch(&FetchRequest::pdf(url)).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::CrossOrigin {
            reason: "blocked".into()
        }
    );
}

#[tokio::test]
async fn empty_body_is_treated_as_opaque() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/opaque"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let url = format!("{}/opaque", server.uri());

    let err = fetcher.fetch(&FetchRequest::new(url)).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::CrossOrigin {
            reason: "opaque".into()
        }
    );
}

#[tokio::test]
async fn html_login_page_is_rejected_for_pdf_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/label.pdf"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>sign in</html>", "text/html"),
        )
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let url = format!("{}/label.pdf", server.uri());

    let err = fetcher.fetch(&FetchRequest::pdf(url)).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::UnsupportedContentType {
            content_type: "text/html".into()
        }
    );
}

#[tokio::test]
async fn credentials_are_sent_as_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secure.pdf"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1, 2, 3], "application/pdf"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let request = FetchRequest::new(format!("{}/secure.pdf", server.uri())).with_credentials(
        Credentials::Include {
            headers: vec![("Authorization".into(), "Bearer s3cret".into())],
        },
    );

    let output = fetcher.fetch(&request).await.expect("fetch ok");
    assert_eq!(output.bytes.as_ref(), &[1, 2, 3]);
}

#[tokio::test]
async fn fetcher_times_out_on_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let url = format!("{}/slow", server.uri());

    let err = fetcher.fetch(&FetchRequest::new(url)).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn fetcher_rejects_too_large_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/pdf")
                .insert_header("Content-Length", "11")
                .set_body_string("01234567890"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let url = format!("{}/large", server.uri());

    let err = fetcher.fetch(&FetchRequest::new(url)).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

/// Mounts `/hop/0` .. `/hop/{hops - 1}` each redirecting to the next, the
/// last one to `/label.pdf`.
async fn redirect_chain(server: &MockServer, hops: usize) {
    for hop in 0..hops {
        let next = if hop + 1 == hops {
            format!("{}/label.pdf", server.uri())
        } else {
            format!("{}/hop/{}", server.uri(), hop + 1)
        };
        Mock::given(method("GET"))
            .and(path(format!("/hop/{hop}")))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", next.as_str()))
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/label.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(common::label_pdf(1), "application/pdf"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn redirects_are_counted_per_hop() {
    let server = MockServer::start().await;
    redirect_chain(&server, 2).await;

    let settings = FetchSettings {
        redirect_limit: 2,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let url = format!("{}/hop/0", server.uri());

    let output = fetcher.fetch(&FetchRequest::pdf(&url)).await.expect("fetch ok");
    assert_eq!(output.metadata.original_url, url);
    assert_eq!(output.metadata.redirect_count, 2);
    assert_eq!(
        output.metadata.final_url,
        format!("{}/label.pdf", server.uri())
    );
}

#[tokio::test]
async fn redirect_overflow_is_a_network_failure() {
    let server = MockServer::start().await;
    redirect_chain(&server, 3).await;

    let settings = FetchSettings {
        redirect_limit: 2,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let url = format!("{}/hop/0", server.uri());

    let err = fetcher.fetch(&FetchRequest::pdf(url)).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Network);
}

/// Serves one chunked response without `Content-Length`, so only the
/// streamed byte cap can stop it.
async fn serve_chunked(chunks: usize, chunk_len: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 2048];
        let _ = socket.read(&mut request).await;
        let mut response = b"HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
        for _ in 0..chunks {
            response.extend_from_slice(format!("{chunk_len:x}\r\n").as_bytes());
            response.extend(std::iter::repeat(b'x').take(chunk_len));
            response.extend_from_slice(b"\r\n");
        }
        response.extend_from_slice(b"0\r\n\r\n");
        let _ = socket.write_all(&response).await;
        let _ = socket.shutdown().await;
    });
    format!("http://{addr}/stream.pdf")
}

#[tokio::test]
async fn streamed_body_is_capped_without_content_length() {
    let url = serve_chunked(4, 512).await;
    let settings = FetchSettings {
        max_bytes: 1024,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);

    let err = fetcher.fetch(&FetchRequest::new(url)).await.unwrap_err();
    match err.kind {
        FailureKind::TooLarge { max_bytes, actual } => {
            assert_eq!(max_bytes, 1024);
            assert!(actual.is_some_and(|actual| actual > 1024));
        }
        other => panic!("expected TooLarge, got {other:?}"),
    }
}

#[tokio::test]
async fn streamed_body_within_cap_is_accepted() {
    let url = serve_chunked(2, 512).await;
    let settings = FetchSettings {
        max_bytes: 1024,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);

    let output = fetcher.fetch(&FetchRequest::new(url)).await.expect("fetch ok");
    assert_eq!(output.metadata.byte_len, 1024);
}
