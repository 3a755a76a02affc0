use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;

use crate::{FailureKind, FetchMetadata, FetchOutput, LoadError};

pub const PDF_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/x-pdf",
    "application/octet-stream",
    "binary/octet-stream",
];

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Whether a request carries the caller's credentials.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Credentials {
    #[default]
    Omit,
    /// Extra headers such as `Authorization` or `Cookie`.
    Include { headers: Vec<(String, String)> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub credentials: Credentials,
    pub accept: Option<String>,
    /// Empty means any content type is accepted.
    pub allowed_content_types: Vec<String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: Credentials::Omit,
            accept: None,
            allowed_content_types: Vec::new(),
        }
    }

    /// Request restricted to PDF payloads with a matching `Accept` header.
    pub fn pdf(url: impl Into<String>) -> Self {
        Self {
            accept: Some("application/pdf".to_string()),
            allowed_content_types: PDF_CONTENT_TYPES.iter().map(|ct| ct.to_string()).collect(),
            ..Self::new(url)
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        if self.allowed_content_types.is_empty() {
            return true;
        }
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutput, LoadError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    fn build_client(&self, redirect_counter: Arc<AtomicUsize>) -> Result<reqwest::Client, LoadError> {
        let redirect_limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            // `previous` holds every URL requested so far, so its length is
            // the number of hops including the one being decided.
            let count = attempt.previous().len();
            if count > redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                redirect_counter.store(count, Ordering::Relaxed);
                attempt.follow()
            }
        });

        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(policy)
            .build()
            .map_err(|err| LoadError::new(FailureKind::Network, err.to_string()))
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutput, LoadError> {
        let parsed = reqwest::Url::parse(&request.url)
            .map_err(|err| LoadError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let redirect_counter = Arc::new(AtomicUsize::new(0));
        let client = self.build_client(redirect_counter.clone())?;

        let response = client
            .get(parsed)
            .headers(request_headers(request)?)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(LoadError::new(
                FailureKind::CrossOrigin {
                    reason: "blocked".to_string(),
                },
                status.to_string(),
            ));
        }
        if !status.is_success() {
            return Err(LoadError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(LoadError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !request.is_content_type_allowed(ct) {
                return Err(LoadError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(LoadError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(LoadError::new(
                FailureKind::CrossOrigin {
                    reason: "opaque".to_string(),
                },
                "response body is empty",
            ));
        }

        let metadata = FetchMetadata {
            original_url: request.url.clone(),
            final_url,
            redirect_count: redirect_counter.load(Ordering::Relaxed),
            content_type,
            byte_len: bytes.len() as u64,
        };

        Ok(FetchOutput {
            bytes: bytes.into(),
            metadata,
        })
    }
}

fn request_headers(request: &FetchRequest) -> Result<HeaderMap, LoadError> {
    let mut headers = HeaderMap::new();
    if let Some(accept) = request.accept.as_deref() {
        let value = HeaderValue::from_str(accept)
            .map_err(|err| LoadError::new(FailureKind::Network, err.to_string()))?;
        headers.insert(ACCEPT, value);
    }
    if let Credentials::Include { headers: extra } = &request.credentials {
        for (name, value) in extra {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                LoadError::new(FailureKind::Network, format!("credential header: {err}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|err| {
                LoadError::new(FailureKind::Network, format!("credential header: {err}"))
            })?;
            headers.append(name, value);
        }
    }
    Ok(headers)
}

fn map_reqwest_error(err: reqwest::Error) -> LoadError {
    if err.is_timeout() {
        return LoadError::new(FailureKind::Timeout, err.to_string());
    }
    LoadError::new(FailureKind::Network, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_request_accepts_parameterized_pdf_type() {
        let request = FetchRequest::pdf("https://example.com/a.pdf");
        assert!(request.is_content_type_allowed("application/pdf; qs=0.9"));
        assert!(request.is_content_type_allowed("Binary/Octet-Stream"));
        assert!(!request.is_content_type_allowed("text/html"));
    }

    #[test]
    fn plain_request_accepts_anything() {
        let request = FetchRequest::new("https://example.com/a.png");
        assert!(request.is_content_type_allowed("image/png"));
    }

    #[test]
    fn credential_headers_are_only_sent_when_included() {
        let omitted = FetchRequest::pdf("https://example.com/a.pdf");
        let headers = request_headers(&omitted).unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/pdf");

        let included = omitted.with_credentials(Credentials::Include {
            headers: vec![("Authorization".into(), "Bearer token".into())],
        });
        let headers = request_headers(&included).unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer token");
    }

    #[test]
    fn malformed_credential_header_is_rejected() {
        let request = FetchRequest::new("https://example.com").with_credentials(
            Credentials::Include {
                headers: vec![("bad header".into(), "x".into())],
            },
        );
        let err = request_headers(&request).unwrap_err();
        assert_eq!(err.kind, FailureKind::Network);
    }
}
