//! # md2pdf-client
//!
//! Client library for a Markdown-to-PDF conversion service (pandoc on the
//! server side). It models the whole front-end workflow without any UI
//! toolkit: the configuration form, file/text inputs, presets, and the
//! conversion request lifecycle with cancellation.
//!
//! ## Lifecycle Overview
//!
//! ```text
//! form + inputs
//!  │
//!  ├─ 1. Validate  file type/size, non-empty input (no network on failure)
//!  ├─ 2. Collect   FormState → ConversionConfig (language exclusivity re-derived)
//!  ├─ 3. Dispatch  POST /upload (multipart) or /convert-text (JSON), cancellable
//!  ├─ 4. Settle    Succeeded(download_url) | Failed(message) | Cancelled
//!  └─ 5. Download  GET download_url → PDF on disk (optional)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2pdf_client::{ClientConfig, Controller, HttpTransport, LifecycleState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder().base_url("http://localhost:1204").build()?;
//!     let mut controller = Controller::new(HttpTransport::new(config)?);
//!     controller.load_presets().await;
//!     controller.apply_preset("academic");
//!     controller.set_text("# Hello\n\nWorld.");
//!
//!     if controller.convert_and_wait().await? == LifecycleState::Succeeded {
//!         println!("{}", controller.result()?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod dispatch;
pub mod download;
pub mod error;
pub mod form;
pub mod lifecycle;
pub mod presets;
pub mod source;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClientConfig, ClientConfigBuilder, ConversionConfig, Language};
pub use dispatch::{dispatch, ConvertResponse, DispatchOutcome, HttpTransport, Transport};
pub use download::{download_to_file, fetch_pdf};
pub use error::{Md2PdfError, ValidationError};
pub use form::FormState;
pub use lifecycle::{ConvertAction, Controller, LifecycleState, Message, MessageKind, ViewState};
pub use presets::{Preset, PresetsCache};
pub use source::{Inputs, Source, SourceFile, Tab};
