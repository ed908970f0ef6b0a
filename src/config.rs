//! Configuration types: what the service should render, and how to reach it.
//!
//! [`ConversionConfig`] is the plain record sent to the backend with every
//! conversion. It is produced by [`crate::form::FormState::collect`] and never
//! edited directly by the lifecycle.
//!
//! [`ClientConfig`] controls the HTTP side (base URL, timeouts) and is built
//! via its [`ClientConfigBuilder`].

use crate::error::Md2PdfError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default PDF engine passed to pandoc.
pub const DEFAULT_PDF_ENGINE: &str = "xelatex";
/// Default LaTeX document class.
pub const DEFAULT_DOCUMENT_CLASS: &str = "article";
/// Default page geometry.
pub const DEFAULT_GEOMETRY: &str = "margin=1in";
/// Default base font size.
pub const DEFAULT_FONTSIZE: &str = "12pt";

/// East Asian language variant selected for the document.
///
/// Serialises as the empty string, `"zh"`, `"ja"` or `"ko"`, matching the
/// backend's form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    /// No East Asian language support. (default)
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "ko")]
    Korean,
}

impl Language {
    /// All selectable languages, in checkbox order.
    pub const ALL: [Language; 3] = [Language::Chinese, Language::Japanese, Language::Korean];

    /// Wire code: `""`, `"zh"`, `"ja"` or `"ko"`.
    pub fn code(&self) -> &'static str {
        match self {
            Language::None => "",
            Language::Chinese => "zh",
            Language::Japanese => "ja",
            Language::Korean => "ko",
        }
    }

    /// Parse a wire code. Unknown codes yield `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "" | "none" => Some(Language::None),
            "zh" => Some(Language::Chinese),
            "ja" => Some(Language::Japanese),
            "ko" => Some(Language::Korean),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Language::None)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Settings for one conversion, as sent to the backend.
///
/// `east_asian_line_breaks` is not stored: it is derived from
/// [`ConversionConfig::language`] every time it is read, so a record can
/// never disagree with itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionConfig {
    pub pdf_engine: String,
    pub document_class: String,
    pub geometry: String,
    pub fontsize: String,
    pub mainfont: String,
    pub linestretch: String,
    pub colorlinks: bool,
    pub number_sections: bool,
    pub toc: bool,
    pub language: Language,
    pub cjk_mainfont: String,
    pub cjk_sansfont: String,
    pub cjk_monofont: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            pdf_engine: DEFAULT_PDF_ENGINE.to_string(),
            document_class: DEFAULT_DOCUMENT_CLASS.to_string(),
            geometry: DEFAULT_GEOMETRY.to_string(),
            fontsize: DEFAULT_FONTSIZE.to_string(),
            mainfont: String::new(),
            linestretch: String::new(),
            colorlinks: true,
            number_sections: false,
            toc: false,
            language: Language::None,
            cjk_mainfont: String::new(),
            cjk_sansfont: String::new(),
            cjk_monofont: String::new(),
        }
    }
}

impl ConversionConfig {
    /// True iff an East Asian language is selected.
    pub fn east_asian_line_breaks(&self) -> bool {
        !self.language.is_none()
    }

    /// Every field as a `(name, value)` pair, booleans as `"true"`/`"false"`.
    ///
    /// This is the multipart encoding the upload endpoint expects.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("pdf_engine", self.pdf_engine.clone()),
            ("document_class", self.document_class.clone()),
            ("geometry", self.geometry.clone()),
            ("fontsize", self.fontsize.clone()),
            ("mainfont", self.mainfont.clone()),
            ("linestretch", self.linestretch.clone()),
            ("colorlinks", self.colorlinks.to_string()),
            ("number_sections", self.number_sections.to_string()),
            ("toc", self.toc.to_string()),
            ("language", self.language.code().to_string()),
            ("cjk_mainfont", self.cjk_mainfont.clone()),
            ("cjk_sansfont", self.cjk_sansfont.clone()),
            ("cjk_monofont", self.cjk_monofont.clone()),
            (
                "east_asian_line_breaks",
                self.east_asian_line_breaks().to_string(),
            ),
        ]
    }
}

// ── Client configuration ─────────────────────────────────────────────────

/// How to reach the conversion service.
///
/// Built via [`ClientConfig::builder()`] or using [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use md2pdf_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://localhost:1204")
///     .request_timeout_secs(300)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service root, e.g. `http://127.0.0.1:1204`. Trailing slashes are trimmed.
    pub base_url: String,

    /// Timeout for `/upload` and `/convert-text` in seconds. Default: 120.
    ///
    /// The backend gives pandoc 60 s; the extra margin covers upload time.
    pub request_timeout_secs: u64,

    /// Timeout for the best-effort `/cancel` notice in milliseconds. Default: 2000.
    pub cancel_timeout_ms: u64,

    /// Timeout for the presets fetch in seconds. Default: 10.
    pub presets_timeout_secs: u64,

    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:1204".to_string(),
            request_timeout_secs: 120,
            cancel_timeout_ms: 2000,
            presets_timeout_secs: 10,
            user_agent: concat!("md2pdf-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Join `path` onto the base URL. Absolute `http(s)://` paths pass through.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn cancel_timeout_ms(mut self, ms: u64) -> Self {
        self.config.cancel_timeout_ms = ms;
        self
    }

    pub fn presets_timeout_secs(mut self, secs: u64) -> Self {
        self.config.presets_timeout_secs = secs;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, Md2PdfError> {
        let c = &self.config;
        let parsed = reqwest::Url::parse(&c.base_url).map_err(|e| {
            Md2PdfError::InvalidConfig(format!("base URL '{}' is not valid: {e}", c.base_url))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Md2PdfError::InvalidConfig(format!(
                "base URL must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if c.request_timeout_secs == 0 || c.cancel_timeout_ms == 0 || c.presets_timeout_secs == 0
        {
            return Err(Md2PdfError::InvalidConfig(
                "Timeouts must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reset_values() {
        let c = ConversionConfig::default();
        assert_eq!(c.pdf_engine, "xelatex");
        assert_eq!(c.document_class, "article");
        assert_eq!(c.geometry, "margin=1in");
        assert_eq!(c.fontsize, "12pt");
        assert!(c.colorlinks);
        assert!(!c.number_sections && !c.toc);
        assert!(c.language.is_none());
        assert!(!c.east_asian_line_breaks());
    }

    #[test]
    fn language_serialises_as_code() {
        assert_eq!(serde_json::to_string(&Language::None).unwrap(), "\"\"");
        assert_eq!(serde_json::to_string(&Language::Korean).unwrap(), "\"ko\"");
        let l: Language = serde_json::from_str("\"ja\"").unwrap();
        assert_eq!(l, Language::Japanese);
        assert_eq!(Language::from_code("ZH"), Some(Language::Chinese));
        assert_eq!(Language::from_code("fr"), None);
    }

    #[test]
    fn form_fields_coerce_booleans() {
        let c = ConversionConfig {
            language: Language::Chinese,
            toc: true,
            ..ConversionConfig::default()
        };
        let fields = c.form_fields();
        let get = |k: &str| {
            fields
                .iter()
                .find(|(name, _)| *name == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("toc"), Some("true"));
        assert_eq!(get("number_sections"), Some("false"));
        assert_eq!(get("language"), Some("zh"));
        assert_eq!(get("east_asian_line_breaks"), Some("true"));
        assert_eq!(fields.len(), 14);
    }

    #[test]
    fn client_url_join() {
        let c = ClientConfig::builder()
            .base_url("http://localhost:8080/")
            .build()
            .unwrap();
        assert_eq!(c.url("/upload"), "http://localhost:8080/upload");
        assert_eq!(c.url("download/x.pdf"), "http://localhost:8080/download/x.pdf");
        assert_eq!(c.url("https://cdn.example/x.pdf"), "https://cdn.example/x.pdf");
    }

    #[test]
    fn builder_rejects_bad_values() {
        assert!(ClientConfig::builder().base_url("ftp://host").build().is_err());
        assert!(ClientConfig::builder().base_url("not a url").build().is_err());
        assert!(ClientConfig::builder().cancel_timeout_ms(0).build().is_err());
        assert_eq!(ClientConfig::default().cancel_timeout_ms, 2000);
    }
}
