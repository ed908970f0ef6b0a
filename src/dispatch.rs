//! Request dispatch: turn a [`Source`] and a [`ConversionConfig`] into one
//! HTTP call and a normalised [`DispatchOutcome`].
//!
//! ## Wire format
//!
//! ```text
//! File  ──▶ POST /upload        multipart: file + every config field + request_id
//! Text  ──▶ POST /convert-text  JSON:      {text, ...config, request_id}
//!                               ◀── {success, download_url?, error?}
//! ```
//!
//! The backend answers errors with a 4xx/5xx status and a `{error}` body that
//! has no `success` key, so the status code is ignored and the body decides.
//! Only a missing or undecodable body counts as a network failure.
//!
//! ## Cancellation
//!
//! [`dispatch`] races the transport call against a [`CancellationToken`].
//! Dropping the losing future aborts the HTTP request on our side; telling the
//! backend to stop is the lifecycle's job (`POST /cancel`).

use crate::config::{ClientConfig, ConversionConfig};
use crate::error::Md2PdfError;
use crate::presets::Preset;
use crate::source::Source;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How long the best-effort cancel notice may take.
pub const CANCEL_NOTICE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Body returned by `/upload` and `/convert-text`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ConvertResponse {
    pub fn ok(download_url: impl Into<String>) -> Self {
        Self {
            success: true,
            download_url: Some(download_url.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            download_url: None,
            error: Some(error.into()),
        }
    }
}

/// Normalised result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The service produced a PDF.
    Success { download_url: String },
    /// The service answered `success: false`, with its message if it gave one.
    ServerError { message: Option<String> },
    /// No usable response: unreachable, timed out, or not JSON.
    NetworkError { detail: String },
    /// The token was cancelled before the call settled.
    Cancelled,
}

impl From<ConvertResponse> for DispatchOutcome {
    fn from(resp: ConvertResponse) -> Self {
        match (resp.success, resp.download_url) {
            (true, Some(download_url)) if !download_url.is_empty() => {
                DispatchOutcome::Success { download_url }
            }
            (true, _) => DispatchOutcome::ServerError {
                message: Some("Response did not include a download URL.".to_string()),
            },
            (false, _) => DispatchOutcome::ServerError {
                message: resp.error.filter(|m| !m.trim().is_empty()),
            },
        }
    }
}

/// The backend operations the lifecycle needs.
///
/// [`HttpTransport`] is the production implementation; anything else (an
/// in-process fake, a different protocol) can drive the same controller.
pub trait Transport: Send + Sync {
    /// Send one conversion and return the decoded response body.
    fn submit<'a>(
        &'a self,
        source: &'a Source,
        config: &'a ConversionConfig,
        request_id: &'a str,
    ) -> BoxFuture<'a, Result<ConvertResponse, Md2PdfError>>;

    /// Ask the backend to stop work on `request_id`. The response is ignored.
    fn cancel_notice<'a>(&'a self, request_id: &'a str) -> BoxFuture<'a, Result<(), Md2PdfError>>;

    /// Fetch the preset map.
    fn fetch_presets(&self) -> BoxFuture<'_, Result<HashMap<String, Preset>, Md2PdfError>>;

    /// Upper bound for [`Transport::cancel_notice`].
    fn cancel_timeout(&self) -> Duration {
        CANCEL_NOTICE_TIMEOUT
    }
}

/// Submit `source` and wait for it to settle or for `token` to be cancelled.
///
/// Never returns an error: every failure mode is a [`DispatchOutcome`].
pub async fn dispatch<T: Transport + ?Sized>(
    transport: &T,
    source: &Source,
    config: &ConversionConfig,
    request_id: &str,
    token: &CancellationToken,
) -> DispatchOutcome {
    if token.is_cancelled() {
        return DispatchOutcome::Cancelled;
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!("Request {} cancelled before settling", request_id);
            DispatchOutcome::Cancelled
        }
        result = transport.submit(source, config, request_id) => match result {
            Ok(resp) => resp.into(),
            Err(e) => DispatchOutcome::NetworkError { detail: e.to_string() },
        },
    }
}

// ── HTTP transport ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct TextPayload<'a> {
    text: &'a str,
    #[serde(flatten)]
    config: &'a ConversionConfig,
    east_asian_line_breaks: bool,
    request_id: &'a str,
}

#[derive(Serialize)]
struct CancelPayload<'a> {
    request_id: &'a str,
}

/// [`Transport`] over HTTP via `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self, Md2PdfError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Md2PdfError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> Md2PdfError {
        let detail = if e.is_timeout() {
            format!("request to {url} timed out after {}s", self.config.request_timeout_secs)
        } else {
            format!("request to {url} failed: {e}")
        };
        Md2PdfError::Transport { detail }
    }

    async fn submit_file(
        &self,
        file: &crate::source::SourceFile,
        config: &ConversionConfig,
        request_id: &str,
    ) -> Result<ConvertResponse, Md2PdfError> {
        let url = self.config.url("/upload");
        let part = reqwest::multipart::Part::bytes(file.bytes().to_vec())
            .file_name(file.name().to_string());
        let mut form = reqwest::multipart::Form::new().part("file", part);
        for (name, value) in config.form_fields() {
            form = form.text(name, value);
        }
        form = form.text("request_id", request_id.to_string());

        info!("Uploading {} ({} bytes) as {}", file.name(), file.size(), request_id);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;
        self.decode(&url, response).await
    }

    async fn submit_text(
        &self,
        text: &str,
        config: &ConversionConfig,
        request_id: &str,
    ) -> Result<ConvertResponse, Md2PdfError> {
        let url = self.config.url("/convert-text");
        let payload = TextPayload {
            text,
            config,
            east_asian_line_breaks: config.east_asian_line_breaks(),
            request_id,
        };

        info!("Submitting {} chars of text as {}", text.chars().count(), request_id);
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;
        self.decode(&url, response).await
    }

    async fn decode(
        &self,
        url: &str,
        response: reqwest::Response,
    ) -> Result<ConvertResponse, Md2PdfError> {
        let status = response.status();
        debug!("{} answered HTTP {}", url, status);
        response
            .json::<ConvertResponse>()
            .await
            .map_err(|e| Md2PdfError::Transport {
                detail: format!("invalid response from {url} (HTTP {status}): {e}"),
            })
    }
}

impl Transport for HttpTransport {
    fn submit<'a>(
        &'a self,
        source: &'a Source,
        config: &'a ConversionConfig,
        request_id: &'a str,
    ) -> BoxFuture<'a, Result<ConvertResponse, Md2PdfError>> {
        Box::pin(async move {
            match source {
                Source::File(file) => self.submit_file(file, config, request_id).await,
                Source::Text(text) => self.submit_text(text, config, request_id).await,
            }
        })
    }

    fn cancel_notice<'a>(&'a self, request_id: &'a str) -> BoxFuture<'a, Result<(), Md2PdfError>> {
        Box::pin(async move {
            let url = self.config.url("/cancel");
            self.client
                .post(&url)
                .timeout(self.cancel_timeout())
                .json(&CancelPayload { request_id })
                .send()
                .await
                .map_err(|e| self.transport_error(&url, e))?;
            Ok(())
        })
    }

    fn fetch_presets(&self) -> BoxFuture<'_, Result<HashMap<String, Preset>, Md2PdfError>> {
        Box::pin(async move {
            let url = self.config.url("/api/config-presets");
            let response = self
                .client
                .get(&url)
                .timeout(Duration::from_secs(self.config.presets_timeout_secs))
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| self.transport_error(&url, e))?;
            response
                .json::<HashMap<String, Preset>>()
                .await
                .map_err(|e| Md2PdfError::Transport {
                    detail: format!("invalid presets from {url}: {e}"),
                })
        })
    }

    fn cancel_timeout(&self) -> Duration {
        Duration::from_millis(self.config.cancel_timeout_ms)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::source::SourceFile;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// What the fake does when asked to submit.
    #[derive(Debug, Clone)]
    pub(crate) enum SubmitBehavior {
        Respond(ConvertResponse),
        Fail(String),
        Hang,
    }

    /// What the fake does when asked to send a cancel notice.
    #[derive(Debug, Clone, Copy)]
    pub(crate) enum NoticeBehavior {
        Ok,
        Fail,
        Hang,
    }

    /// In-memory [`Transport`] that records every call.
    pub(crate) struct FakeTransport {
        submit: SubmitBehavior,
        notice: NoticeBehavior,
        presets: Option<HashMap<String, Preset>>,
        submits: Mutex<Vec<(String, Source)>>,
        notices: Mutex<Vec<String>>,
        preset_fetches: AtomicUsize,
    }

    impl FakeTransport {
        pub(crate) fn new() -> Self {
            Self {
                submit: SubmitBehavior::Respond(ConvertResponse::ok("/download/out.pdf")),
                notice: NoticeBehavior::Ok,
                presets: Some(HashMap::new()),
                submits: Mutex::new(Vec::new()),
                notices: Mutex::new(Vec::new()),
                preset_fetches: AtomicUsize::new(0),
            }
        }

        pub(crate) fn responding(resp: ConvertResponse) -> Self {
            Self::new().with_submit(SubmitBehavior::Respond(resp))
        }

        pub(crate) fn with_submit(mut self, behavior: SubmitBehavior) -> Self {
            self.submit = behavior;
            self
        }

        pub(crate) fn with_notice(mut self, behavior: NoticeBehavior) -> Self {
            self.notice = behavior;
            self
        }

        pub(crate) fn with_presets(mut self, presets: HashMap<String, Preset>) -> Self {
            self.presets = Some(presets);
            self
        }

        pub(crate) fn with_presets_error(mut self) -> Self {
            self.presets = None;
            self
        }

        pub(crate) fn submit_count(&self) -> usize {
            self.submits.lock().unwrap().len()
        }

        pub(crate) fn submitted(&self) -> Vec<(String, Source)> {
            self.submits.lock().unwrap().clone()
        }

        pub(crate) fn notices(&self) -> Vec<String> {
            self.notices.lock().unwrap().clone()
        }

        pub(crate) fn preset_fetches(&self) -> usize {
            self.preset_fetches.load(Ordering::SeqCst)
        }
    }

    impl Transport for FakeTransport {
        fn submit<'a>(
            &'a self,
            source: &'a Source,
            _config: &'a ConversionConfig,
            request_id: &'a str,
        ) -> BoxFuture<'a, Result<ConvertResponse, Md2PdfError>> {
            self.submits
                .lock()
                .unwrap()
                .push((request_id.to_string(), source.clone()));
            let behavior = self.submit.clone();
            Box::pin(async move {
                match behavior {
                    SubmitBehavior::Respond(resp) => Ok(resp),
                    SubmitBehavior::Fail(detail) => Err(Md2PdfError::Transport { detail }),
                    SubmitBehavior::Hang => futures::future::pending().await,
                }
            })
        }

        fn cancel_notice<'a>(
            &'a self,
            request_id: &'a str,
        ) -> BoxFuture<'a, Result<(), Md2PdfError>> {
            self.notices.lock().unwrap().push(request_id.to_string());
            let behavior = self.notice;
            Box::pin(async move {
                match behavior {
                    NoticeBehavior::Ok => Ok(()),
                    NoticeBehavior::Fail => Err(Md2PdfError::Transport {
                        detail: "connection refused".into(),
                    }),
                    NoticeBehavior::Hang => futures::future::pending().await,
                }
            })
        }

        fn fetch_presets(&self) -> BoxFuture<'_, Result<HashMap<String, Preset>, Md2PdfError>> {
            self.preset_fetches.fetch_add(1, Ordering::SeqCst);
            let presets = self.presets.clone();
            Box::pin(async move {
                presets.ok_or_else(|| Md2PdfError::Transport {
                    detail: "connection refused".into(),
                })
            })
        }
    }

    fn text_source() -> Source {
        Source::Text("# Hello".into())
    }

    #[test]
    fn response_normalisation() {
        assert_eq!(
            DispatchOutcome::from(ConvertResponse::ok("/files/x.pdf")),
            DispatchOutcome::Success {
                download_url: "/files/x.pdf".into()
            }
        );
        assert_eq!(
            DispatchOutcome::from(ConvertResponse::failed("Pandoc failed")),
            DispatchOutcome::ServerError {
                message: Some("Pandoc failed".into())
            }
        );
        // Backend error bodies carry no `success` key.
        let resp: ConvertResponse = serde_json::from_str(r#"{"error": "File too large"}"#).unwrap();
        assert!(!resp.success);
        assert_eq!(
            DispatchOutcome::from(resp),
            DispatchOutcome::ServerError {
                message: Some("File too large".into())
            }
        );
        assert_eq!(
            DispatchOutcome::from(ConvertResponse::default()),
            DispatchOutcome::ServerError { message: None }
        );
        assert!(matches!(
            DispatchOutcome::from(ConvertResponse {
                success: true,
                ..ConvertResponse::default()
            }),
            DispatchOutcome::ServerError { message: Some(_) }
        ));
    }

    #[test]
    fn text_payload_flattens_config() {
        let config = ConversionConfig {
            language: crate::config::Language::Korean,
            ..ConversionConfig::default()
        };
        let payload = TextPayload {
            text: "# hi",
            config: &config,
            east_asian_line_breaks: config.east_asian_line_breaks(),
            request_id: "abc",
        };
        let v = serde_json::to_value(&payload).unwrap();
        assert_eq!(v["text"], "# hi");
        assert_eq!(v["pdf_engine"], "xelatex");
        assert_eq!(v["language"], "ko");
        assert_eq!(v["east_asian_line_breaks"], true);
        assert_eq!(v["colorlinks"], true);
        assert_eq!(v["request_id"], "abc");
    }

    #[tokio::test]
    async fn dispatch_success_and_server_error() {
        let config = ConversionConfig::default();
        let token = CancellationToken::new();

        let ok = FakeTransport::responding(ConvertResponse::ok("/download/a.pdf"));
        let outcome = dispatch(&ok, &text_source(), &config, "r1", &token).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Success {
                download_url: "/download/a.pdf".into()
            }
        );

        let bad = FakeTransport::responding(ConvertResponse::failed("bad geometry"));
        let outcome = dispatch(&bad, &text_source(), &config, "r2", &token).await;
        assert_eq!(
            outcome,
            DispatchOutcome::ServerError {
                message: Some("bad geometry".into())
            }
        );
    }

    #[tokio::test]
    async fn dispatch_network_failure_is_distinct() {
        let t = FakeTransport::new().with_submit(SubmitBehavior::Fail("refused".into()));
        let outcome = dispatch(
            &t,
            &text_source(),
            &ConversionConfig::default(),
            "r1",
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(outcome, DispatchOutcome::NetworkError { .. }));
    }

    #[tokio::test]
    async fn dispatch_honours_cancellation() {
        let t = FakeTransport::new().with_submit(SubmitBehavior::Hang);
        let token = CancellationToken::new();
        let child = token.clone();
        let file = Source::File(SourceFile::new("a.md", b"# a".to_vec()).unwrap());
        let config = ConversionConfig::default();

        let handle = tokio::spawn(async move {
            dispatch(&t, &file, &config, "r1", &child).await
        });
        tokio::task::yield_now().await;
        token.cancel();
        assert_eq!(handle.await.unwrap(), DispatchOutcome::Cancelled);
    }

    #[tokio::test]
    async fn dispatch_skips_transport_when_already_cancelled() {
        let t = FakeTransport::new();
        let token = CancellationToken::new();
        token.cancel();
        let outcome = dispatch(&t, &text_source(), &ConversionConfig::default(), "r1", &token).await;
        assert_eq!(outcome, DispatchOutcome::Cancelled);
        assert_eq!(t.submit_count(), 0);
    }
}
