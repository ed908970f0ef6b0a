//! Fetch a converted PDF and write it to disk.
//!
//! The service hands back a relative `download_url` (`/download/<name>.pdf`).
//! It is resolved against the client's base URL, fetched, checked for the
//! `%PDF` magic bytes and written atomically (temp file + rename) so an
//! interrupted download never leaves a truncated PDF behind.

use crate::dispatch::HttpTransport;
use crate::error::Md2PdfError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Download the PDF at `download_url` into memory.
pub async fn fetch_pdf(transport: &HttpTransport, download_url: &str) -> Result<Vec<u8>, Md2PdfError> {
    let url = transport.config().url(download_url);
    info!("Downloading PDF from: {}", url);

    let response = transport
        .client()
        .get(&url)
        .send()
        .await
        .map_err(|e| Md2PdfError::DownloadFailed {
            url: url.clone(),
            reason: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(Md2PdfError::DownloadFailed {
            url,
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Md2PdfError::DownloadFailed {
            url: url.clone(),
            reason: e.to_string(),
        })?;

    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        return Err(Md2PdfError::DownloadFailed {
            url,
            reason: "response is not a PDF".to_string(),
        });
    }
    debug!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

/// Download the PDF at `download_url` and write it to `output_path`.
///
/// Returns the number of bytes written.
pub async fn download_to_file(
    transport: &HttpTransport,
    download_url: &str,
    output_path: impl AsRef<Path>,
) -> Result<u64, Md2PdfError> {
    let bytes = fetch_pdf(transport, download_url).await?;
    let path = output_path.as_ref();
    write_atomic(path, &bytes).await?;
    info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes.len() as u64)
}

/// Write `bytes` to a sibling temp file, then rename over `path`.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Md2PdfError> {
    let write_err = |source| Md2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = tmp_path_for(path);
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_path_is_a_sibling() {
        assert_eq!(
            tmp_path_for(Path::new("/out/report.pdf")),
            PathBuf::from("/out/report.pdf.tmp")
        );
    }

    #[tokio::test]
    async fn write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/deeper/out.pdf");
        write_atomic(&target, b"%PDF-1.7").await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.7");
        assert!(!tmp_path_for(&target).exists());
    }
}
