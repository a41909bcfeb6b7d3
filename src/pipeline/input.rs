//! File I/O at the edges: read a local PDF into memory, write results
//! atomically and pick output names.
//!
//! We validate the size limit and the PDF magic bytes (`%PDF`) before
//! returning so callers get a meaningful error rather than an opaque pdfium
//! failure or an out-of-memory render.

use crate::error::CompressError;
use crate::output::format_size;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Leading bytes of every PDF file.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// `true` when `bytes` starts with the PDF header.
pub fn has_pdf_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Reject a source of `len` bytes when it exceeds `max_bytes`.
pub fn check_input_size(len: u64, max_bytes: u64) -> Result<(), CompressError> {
    if len > max_bytes {
        return Err(CompressError::InvalidInput(format!(
            "source document is {} but the limit is {}",
            format_size(len),
            format_size(max_bytes)
        )));
    }
    Ok(())
}

/// Read a local PDF, validating existence, permissions, size and magic bytes.
///
/// The size check uses file metadata, so an oversized file is never loaded.
pub async fn read_pdf(path: impl AsRef<Path>, max_bytes: u64) -> Result<Vec<u8>, CompressError> {
    let path = path.as_ref().to_path_buf();

    let meta = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(CompressError::PermissionDenied { path });
        }
        Err(_) => return Err(CompressError::FileNotFound { path }),
    };
    check_input_size(meta.len(), max_bytes)?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(CompressError::PermissionDenied { path });
        }
        Err(_) => return Err(CompressError::FileNotFound { path }),
    };

    if !has_pdf_magic(&bytes) {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(CompressError::NotAPdf { path, magic });
    }

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

/// Write `bytes` to `path` via a sibling `*.pdf.tmp` file and a rename, so
/// readers never observe a partial document. Parent directories are created.
/// The temp file is removed if either step fails.
pub async fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), CompressError> {
    let path = path.as_ref();
    let write_failed = |source| CompressError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    let result = match tokio::fs::write(&tmp_path, bytes).await {
        Ok(()) => tokio::fs::rename(&tmp_path, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove {}: {cleanup}", tmp_path.display());
            }
        }
        return Err(write_failed(e));
    }

    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Default output path next to `input`: `compressed_<label>_<name>`, or
/// `compressed_<name>` without a label.
pub fn default_output_path(input: &Path, label: Option<&str>) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());
    let file_name = match label {
        Some(label) => format!("compressed_{label}_{name}"),
        None => format!("compressed_{name}"),
    };
    input.with_file_name(file_name)
}
