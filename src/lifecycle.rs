//! The conversion lifecycle controller.
//!
//! ## State machine
//!
//! ```text
//!            convert                 dispatch settles
//!   Idle ───────────▶ Validating ───▶ Submitting ───┬──▶ Succeeded ─┐
//!    ▲                   │                          ├──▶ Failed    ─┤
//!    │   no input        │                 cancel   └──▶ Cancelled ─┤
//!    └───────────────────┘                                          │
//!    └───────────────────────── new_conversion ◀────────────────────┘
//! ```
//!
//! A [`Controller`] owns every piece of front-end state: the form, both input
//! slots, the presets cache, the panels a UI would show, and at most one
//! in-flight request. Front-ends call its methods in response to user actions
//! and render [`Controller::view`]; none of the transition logic depends on a
//! UI toolkit.
//!
//! The dispatch itself runs on a spawned task so that [`Controller::cancel`]
//! can be called while it is in flight. The controller must therefore be used
//! from inside a tokio runtime.

use crate::dispatch::{dispatch, DispatchOutcome, Transport};
use crate::error::{Md2PdfError, ValidationError};
use crate::form::FormState;
use crate::presets::PresetsCache;
use crate::source::{Inputs, SourceFile, Tab};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Shown when the service reports failure without a message.
pub const GENERIC_FAILURE_MESSAGE: &str = "Conversion failed.";
/// Shown for any transport-level failure.
pub const NETWORK_FAILURE_MESSAGE: &str = "Network error. Please try again.";
/// Shown after the user cancels.
pub const CANCELLED_MESSAGE: &str = "Conversion cancelled by user.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
    Cancelled,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleState::Succeeded | LifecycleState::Failed | LifecycleState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Validating => "validating",
            LifecycleState::Submitting => "submitting",
            LifecycleState::Succeeded => "succeeded",
            LifecycleState::Failed => "failed",
            LifecycleState::Cancelled => "cancelled",
        }
    }
}

/// Severity of the message panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Error,
    /// User-intended outcomes such as cancellation.
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
}

impl Message {
    fn error(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Error,
            text: text.into(),
        }
    }

    fn info(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Info,
            text: text.into(),
        }
    }
}

/// Snapshot of everything a front-end renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub state: LifecycleState,
    /// Loading overlay.
    pub busy: bool,
    /// Result panel; `None` when hidden.
    pub download_url: Option<String>,
    /// Error/info panel; `None` when hidden.
    pub message: Option<Message>,
    pub tab: Tab,
    pub cjk_fonts_visible: bool,
    pub selected_preset: Option<String>,
}

/// What a convert action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertAction {
    /// A new request was dispatched.
    Started { request_id: String },
    /// A request is already in flight; nothing happened.
    AlreadyRunning,
}

/// The single in-flight conversion.
struct PendingRequest {
    request_id: String,
    token: CancellationToken,
    task: JoinHandle<DispatchOutcome>,
    /// Set once `task` has been joined; a join handle must not be polled twice.
    outcome: Option<DispatchOutcome>,
}

/// Owns the lifecycle record and applies every transition.
pub struct Controller<T: Transport + 'static> {
    transport: Arc<T>,
    form: FormState,
    inputs: Inputs,
    presets: PresetsCache,
    state: LifecycleState,
    busy: bool,
    download_url: Option<String>,
    message: Option<Message>,
    last_outcome: Option<DispatchOutcome>,
    pending: Option<PendingRequest>,
}

impl<T: Transport + 'static> Controller<T> {
    pub fn new(transport: T) -> Self {
        Self::from_arc(Arc::new(transport))
    }

    pub fn from_arc(transport: Arc<T>) -> Self {
        Self {
            transport,
            form: FormState::default(),
            inputs: Inputs::default(),
            presets: PresetsCache::new(),
            state: LifecycleState::Idle,
            busy: false,
            download_url: None,
            message: None,
            last_outcome: None,
            pending: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    /// Direct access to the inputs of the configuration form.
    pub fn form_mut(&mut self) -> &mut FormState {
        &mut self.form
    }

    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    /// Direct access to the text editor and tab selection.
    pub fn inputs_mut(&mut self) -> &mut Inputs {
        &mut self.inputs
    }

    pub fn presets(&self) -> &PresetsCache {
        &self.presets
    }

    pub fn view(&self) -> ViewState {
        ViewState {
            state: self.state,
            busy: self.busy,
            download_url: self.download_url.clone(),
            message: self.message.clone(),
            tab: self.inputs.tab(),
            cjk_fonts_visible: self.form.cjk_fonts_visible(),
            selected_preset: self.form.selected_preset.clone(),
        }
    }

    /// Id of the in-flight request, if any.
    pub fn pending_request_id(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.request_id.as_str())
    }

    /// A handle on the in-flight request's cancellation token.
    ///
    /// Cancelling it has the same effect as [`Controller::cancel`], applied
    /// when the request is next awaited with [`Controller::wait_settled`].
    pub fn cancellation_token(&self) -> Option<CancellationToken> {
        self.pending.as_ref().map(|p| p.token.clone())
    }

    // ── Presets ──────────────────────────────────────────────────────────

    /// Fill the presets cache from the backend. Failures are logged only.
    pub async fn load_presets(&mut self) {
        self.presets.load(&*self.transport).await;
    }

    /// Replace the presets cache, e.g. with presets fetched elsewhere.
    pub fn set_presets(&mut self, presets: PresetsCache) {
        self.presets = presets;
    }

    /// Apply the preset `id` to the form. Returns false if it is unknown.
    pub fn apply_preset(&mut self, id: &str) -> bool {
        let Some(preset) = self.presets.get(id).cloned() else {
            warn!("Preset {} not found", id);
            return false;
        };
        self.form.apply_preset(id, &preset);
        true
    }

    /// The "custom" preset entry.
    pub fn select_custom_preset(&mut self) {
        self.form.select_custom();
    }

    pub fn reset_configuration(&mut self) {
        self.form.reset();
    }

    // ── Inputs ───────────────────────────────────────────────────────────

    /// Validate and store an in-memory file. A rejection is shown as an
    /// error and leaves the current file untouched.
    pub fn select_file(
        &mut self,
        name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<(), ValidationError> {
        match SourceFile::new(name, bytes) {
            Ok(file) => {
                self.store_file(file);
                Ok(())
            }
            Err(e) => {
                self.reject_input(e.to_string());
                Err(e)
            }
        }
    }

    /// Read, validate and store a file from disk.
    pub async fn select_path(&mut self, path: impl AsRef<Path>) -> Result<(), Md2PdfError> {
        match SourceFile::from_path(path).await {
            Ok(file) => {
                self.store_file(file);
                Ok(())
            }
            Err(e) => {
                self.reject_input(e.to_string());
                Err(e)
            }
        }
    }

    fn store_file(&mut self, file: SourceFile) {
        debug!("Selected file {} ({} bytes)", file.name(), file.size());
        self.inputs.set_file(file);
    }

    pub fn clear_file(&mut self) {
        self.inputs.clear_file();
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.inputs.set_text(text);
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Start a conversion.
    ///
    /// A no-op while another request is in flight. Fails, without touching
    /// the network, when neither a file nor non-blank text is present.
    pub fn convert(&mut self) -> Result<ConvertAction, ValidationError> {
        if self.pending.is_some() {
            debug!("Convert ignored: a request is already in flight");
            return Ok(ConvertAction::AlreadyRunning);
        }

        self.state = LifecycleState::Validating;
        let source = match self.inputs.resolve() {
            Ok(source) => source,
            Err(e) => {
                self.reject_input(e.to_string());
                return Err(e);
            }
        };

        let request_id = Uuid::new_v4().simple().to_string();
        let config = self.form.collect();
        info!("Submitting conversion {} ({})", request_id, source.label());

        let token = CancellationToken::new();
        let task = {
            let transport = Arc::clone(&self.transport);
            let token = token.clone();
            let request_id = request_id.clone();
            tokio::spawn(async move {
                dispatch(&*transport, &source, &config, &request_id, &token).await
            })
        };

        self.pending = Some(PendingRequest {
            request_id: request_id.clone(),
            token,
            task,
            outcome: None,
        });
        self.state = LifecycleState::Submitting;
        self.busy = true;
        self.download_url = None;
        self.message = None;
        self.last_outcome = None;
        Ok(ConvertAction::Started { request_id })
    }

    /// Wait for the in-flight request to settle and apply the transition.
    ///
    /// Returns immediately when nothing is pending. Dropping the returned
    /// future leaves the request in flight.
    pub async fn wait_settled(&mut self) -> LifecycleState {
        let Some(pending) = self.pending.as_mut() else {
            return self.state;
        };
        let outcome = match pending.outcome.clone() {
            Some(outcome) => outcome,
            None => {
                let outcome = match (&mut pending.task).await {
                    Ok(outcome) => outcome,
                    Err(e) => DispatchOutcome::NetworkError {
                        detail: format!("dispatch task failed: {e}"),
                    },
                };
                pending.outcome = Some(outcome.clone());
                outcome
            }
        };

        if outcome == DispatchOutcome::Cancelled {
            self.cancel().await;
            return self.state;
        }

        let Some(pending) = self.pending.take() else {
            return self.state;
        };
        self.settle(&pending.request_id, outcome);
        self.state
    }

    /// [`Controller::convert`] followed by [`Controller::wait_settled`].
    pub async fn convert_and_wait(&mut self) -> Result<LifecycleState, ValidationError> {
        self.convert()?;
        Ok(self.wait_settled().await)
    }

    fn settle(&mut self, request_id: &str, outcome: DispatchOutcome) {
        self.busy = false;
        match &outcome {
            DispatchOutcome::Success { download_url } => {
                info!("Conversion {} succeeded: {}", request_id, download_url);
                self.state = LifecycleState::Succeeded;
                self.download_url = Some(download_url.clone());
                self.message = None;
            }
            DispatchOutcome::ServerError { message } => {
                let text = message.as_deref().unwrap_or(GENERIC_FAILURE_MESSAGE);
                warn!("Conversion {} failed: {}", request_id, text);
                self.state = LifecycleState::Failed;
                self.show_error(text);
            }
            DispatchOutcome::NetworkError { detail } => {
                error!("Conversion {} error: {}", request_id, detail);
                self.state = LifecycleState::Failed;
                self.show_error(NETWORK_FAILURE_MESSAGE);
            }
            DispatchOutcome::Cancelled => {
                info!("Conversion {} cancelled", request_id);
                self.state = LifecycleState::Cancelled;
                self.show_info(CANCELLED_MESSAGE);
            }
        }
        self.last_outcome = Some(outcome);
    }

    /// Cancel the in-flight request. Returns false if nothing was pending.
    ///
    /// Tells the backend first (best effort, bounded by the transport's
    /// cancel timeout), then stops waiting locally. The request stays pending
    /// until the notice resolves, so dropping this future mid-notice leaves
    /// it in flight and cancellable again.
    pub async fn cancel(&mut self) -> bool {
        let Some(request_id) = self.pending_request_id().map(str::to_string) else {
            return false;
        };

        let notice = self.transport.cancel_notice(&request_id);
        match tokio::time::timeout(self.transport.cancel_timeout(), notice).await {
            Ok(Ok(())) => debug!("Cancel notice for {} delivered", request_id),
            Ok(Err(e)) => info!(
                "Cancel request failed (likely already cancelled): {}",
                e
            ),
            Err(_) => info!(
                "Cancel request for {} timed out after {:?}",
                request_id,
                self.transport.cancel_timeout()
            ),
        }

        // Whatever the dispatcher reported meanwhile is discarded.
        let Some(pending) = self.pending.take() else {
            return false;
        };
        pending.token.cancel();
        self.settle(&pending.request_id, DispatchOutcome::Cancelled);
        true
    }

    /// Back to a blank slate. A no-op while a request is in flight.
    pub fn new_conversion(&mut self) -> bool {
        if self.pending.is_some() {
            debug!("New conversion ignored: a request is in flight");
            return false;
        }
        self.inputs.reset();
        self.form.reset();
        self.state = LifecycleState::Idle;
        self.busy = false;
        self.download_url = None;
        self.message = None;
        self.last_outcome = None;
        true
    }

    /// Hide the message panel.
    pub fn dismiss_message(&mut self) {
        self.message = None;
    }

    /// The settled conversion as a `Result`: the download URL, or the error.
    pub fn result(&self) -> Result<&str, Md2PdfError> {
        match &self.last_outcome {
            Some(DispatchOutcome::Success { download_url }) => Ok(download_url),
            Some(DispatchOutcome::ServerError { message }) => Err(Md2PdfError::Server {
                message: message
                    .clone()
                    .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
            }),
            Some(DispatchOutcome::NetworkError { detail }) => Err(Md2PdfError::Transport {
                detail: detail.clone(),
            }),
            Some(DispatchOutcome::Cancelled) => Err(Md2PdfError::Cancelled),
            None => Err(Md2PdfError::Internal(
                "no conversion has settled".to_string(),
            )),
        }
    }

    /// Show a local input rejection. Outside a request this also drops the
    /// previous outcome, so `view()` and `result()` agree on `Idle`.
    fn reject_input(&mut self, text: impl Into<String>) {
        self.show_error(text);
        if self.pending.is_none() {
            self.state = LifecycleState::Idle;
            self.last_outcome = None;
        }
    }

    fn show_error(&mut self, text: impl Into<String>) {
        self.message = Some(Message::error(text));
        self.download_url = None;
    }

    fn show_info(&mut self, text: impl Into<String>) {
        self.message = Some(Message::info(text));
        self.download_url = None;
    }
}
