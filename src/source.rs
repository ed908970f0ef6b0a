//! Conversion inputs: an uploaded Markdown file or pasted text.
//!
//! ## Why validate here?
//!
//! The service rejects oversized or non-Markdown uploads anyway, but only
//! after the bytes have crossed the network. Checking the extension and size
//! locally gives the user an immediate, descriptive message and guarantees no
//! request is ever built for an input that cannot succeed.

use crate::error::{Md2PdfError, ValidationError};
use serde::Serialize;
use std::ops::Range;
use std::path::Path;
use tracing::debug;

/// Extensions the service accepts, lower-case.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["md", "txt", "markdown"];

/// Upload size limit: 16 MiB, inclusive.
pub const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Check a file's name and size against the upload rules.
pub fn validate_file(name: &str, size: u64) -> Result<(), ValidationError> {
    let allowed = name
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false);
    if !allowed {
        return Err(ValidationError::UnsupportedFileType {
            name: name.to_string(),
        });
    }
    if size > MAX_FILE_SIZE {
        return Err(ValidationError::FileTooLarge {
            name: name.to_string(),
            size,
        });
    }
    Ok(())
}

/// A validated Markdown file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    name: String,
    bytes: Vec<u8>,
}

impl SourceFile {
    /// Wrap in-memory bytes, validating name and size.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ValidationError> {
        let name = name.into();
        validate_file(&name, bytes.len() as u64)?;
        Ok(Self { name, bytes })
    }

    /// Read a file from disk. The size is checked before the contents are read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, Md2PdfError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| Md2PdfError::FileRead {
                path: path.to_path_buf(),
                source: e,
            })?;
        validate_file(&name, meta.len())?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Md2PdfError::FileRead {
                path: path.to_path_buf(),
                source: e,
            })?;
        debug!("Read {} ({} bytes)", path.display(), bytes.len());
        Ok(Self::new(name, bytes)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// What gets submitted. A file wins over text when both are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(SourceFile),
    Text(String),
}

impl Source {
    /// Short description for logs: `file notes.md` or `text (120 chars)`.
    pub fn label(&self) -> String {
        match self {
            Source::File(f) => format!("file {}", f.name()),
            Source::Text(t) => format!("text ({} chars)", t.chars().count()),
        }
    }
}

/// The input panel that is currently shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    /// File upload. (initial)
    #[default]
    File,
    Text,
}

/// Character and line counts for the text editor footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextStats {
    pub chars: usize,
    pub lines: usize,
}

/// Both input slots plus the active tab.
///
/// Selecting a file does not clear the text, and typing text does not clear
/// the file; [`Inputs::resolve`] decides which one is sent.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    file: Option<SourceFile>,
    text: String,
    tab: Tab,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(&self) -> Option<&SourceFile> {
        self.file.as_ref()
    }

    /// Store a validated file and switch to the file tab.
    pub fn set_file(&mut self, file: SourceFile) {
        self.file = Some(file);
        self.tab = Tab::File;
    }

    pub fn clear_file(&mut self) {
        self.file = None;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn clear_text(&mut self) {
        self.text.clear();
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn switch_tab(&mut self, tab: Tab) {
        self.tab = tab;
    }

    /// Replace the text with the built-in sample document.
    pub fn load_sample(&mut self) {
        self.text = SAMPLE_MARKDOWN.to_string();
    }

    /// Insert `pasted` over the character range `selection`, returning the
    /// cursor position (in characters) just after the inserted text.
    ///
    /// Out-of-range bounds are clamped to the end of the text.
    pub fn paste(&mut self, pasted: &str, selection: Range<usize>) -> usize {
        let total = self.text.chars().count();
        let start = selection.start.min(total);
        let end = selection.end.clamp(start, total);

        let byte_at = |idx: usize| {
            self.text
                .char_indices()
                .nth(idx)
                .map(|(b, _)| b)
                .unwrap_or(self.text.len())
        };
        let (start_b, end_b) = (byte_at(start), byte_at(end));
        self.text.replace_range(start_b..end_b, pasted);
        start + pasted.chars().count()
    }

    pub fn text_stats(&self) -> TextStats {
        TextStats {
            chars: self.text.chars().count(),
            lines: self.text.split('\n').count(),
        }
    }

    /// Pick the source to submit: the file if any, else non-blank text.
    pub fn resolve(&self) -> Result<Source, ValidationError> {
        if let Some(ref file) = self.file {
            return Ok(Source::File(file.clone()));
        }
        if !self.text.trim().is_empty() {
            return Ok(Source::Text(self.text.clone()));
        }
        Err(ValidationError::NoInput)
    }

    /// Clear both slots and return to the initial tab.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Human-readable size: `0 Bytes`, `1.5 KB`, `16 MB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

/// Sample document offered by the text editor.
pub const SAMPLE_MARKDOWN: &str = r#"# Sample Markdown Document

## Introduction

This is a sample Markdown document to demonstrate the conversion capabilities.

### Features

- **Easy to write** - Simple syntax
- *Flexible* - Supports various elements
- `Code blocks` - With syntax highlighting

## Code Example

```python
def hello_world():
    print("Hello, World!")
    return True
```

## Math (LaTeX)

Inline math: $E = mc^2$

Display math:
$$
\int_a^b f(x) dx = F(b) - F(a)
$$

## Table

| Name | Age | Role |
|------|-----|------|
| Alice | 28 | Developer |
| Bob | 32 | Designer |

> "This is a blockquote."

---

**Enjoy converting!**
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn accepts_markdown_extensions() {
        assert!(validate_file("notes.md", 10).is_ok());
        assert!(validate_file("README.MARKDOWN", 10).is_ok());
        assert!(validate_file("log.txt", MAX_FILE_SIZE).is_ok());
    }

    #[test]
    fn rejects_bad_type_and_size() {
        assert!(matches!(
            validate_file("setup.exe", 10),
            Err(ValidationError::UnsupportedFileType { .. })
        ));
        assert!(matches!(
            validate_file("md", 10),
            Err(ValidationError::UnsupportedFileType { .. })
        ));
        assert!(matches!(
            validate_file("big.md", 17 * 1024 * 1024),
            Err(ValidationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn from_path_reads_and_validates() {
        let mut tmp = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
        tmp.write_all(b"# Title\n").unwrap();
        let file = tokio_test::block_on(SourceFile::from_path(tmp.path())).unwrap();
        assert_eq!(file.bytes(), b"# Title\n");
        assert_eq!(file.size(), 8);

        let exe = tempfile::Builder::new().suffix(".exe").tempfile().unwrap();
        let err = tokio_test::block_on(SourceFile::from_path(exe.path())).unwrap_err();
        assert!(matches!(
            err,
            Md2PdfError::Validation(ValidationError::UnsupportedFileType { .. })
        ));

        let missing = tokio_test::block_on(SourceFile::from_path("/no/such/file.md"));
        assert!(matches!(missing, Err(Md2PdfError::FileRead { .. })));
    }

    #[test]
    fn resolve_prefers_file() {
        let mut inputs = Inputs::new();
        assert_eq!(inputs.resolve(), Err(ValidationError::NoInput));

        inputs.set_text("   \n\t");
        assert_eq!(inputs.resolve(), Err(ValidationError::NoInput));

        inputs.set_text("# hi");
        assert_eq!(inputs.resolve(), Ok(Source::Text("# hi".into())));

        let file = SourceFile::new("a.md", b"# file".to_vec()).unwrap();
        inputs.switch_tab(Tab::Text);
        inputs.set_file(file.clone());
        assert_eq!(inputs.tab(), Tab::File);
        assert_eq!(inputs.resolve(), Ok(Source::File(file)));
        assert_eq!(inputs.text(), "# hi", "text is kept alongside the file");
    }

    #[test]
    fn paste_replaces_selection() {
        let mut inputs = Inputs::new();
        inputs.set_text("héllo world");
        let cursor = inputs.paste("there", 6..11);
        assert_eq!(inputs.text(), "héllo there");
        assert_eq!(cursor, 11);

        let cursor = inputs.paste("!", 100..100);
        assert_eq!(inputs.text(), "héllo there!");
        assert_eq!(cursor, 12);
    }

    #[test]
    fn text_stats_count_chars_and_lines() {
        let mut inputs = Inputs::new();
        assert_eq!(inputs.text_stats(), TextStats { chars: 0, lines: 1 });
        inputs.set_text("a\nbc\n");
        assert_eq!(inputs.text_stats(), TextStats { chars: 5, lines: 3 });
        inputs.load_sample();
        assert!(inputs.text().starts_with("# Sample Markdown Document"));
    }

    #[test]
    fn file_sizes_are_human_readable() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(MAX_FILE_SIZE), "16 MB");
    }
}
