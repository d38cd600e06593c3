//! Artifact delivery: expose a rendered file as a byte stream.
//!
//! Output files are left in place after delivery.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tracing::debug;

use crate::error::RenderError;
use crate::render::RenderJobKind;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// An opened, ready-to-stream artifact.
#[derive(Debug)]
pub struct Artifact {
    pub file: File,
    pub path: PathBuf,
    /// Name offered to the client.
    pub download_name: String,
    pub content_type: &'static str,
    pub len: u64,
}

/// Media type of the artifact a job kind produces.
pub fn content_type(kind: RenderJobKind) -> &'static str {
    match kind {
        RenderJobKind::SinglePdf => PDF_CONTENT_TYPE,
        RenderJobKind::BulkReport => XLSX_CONTENT_TYPE,
    }
}

/// Open `path` for streaming. Failure here is `DeliveryFailed`, never a
/// renderer error.
pub async fn deliver(
    path: &Path,
    download_name: String,
    content_type: &'static str,
) -> Result<Artifact, RenderError> {
    let failed = |e: std::io::Error| RenderError::DeliveryFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let file = File::open(path).await.map_err(failed)?;
    let metadata = file.metadata().await.map_err(failed)?;
    if !metadata.is_file() {
        return Err(RenderError::DeliveryFailed {
            path: path.to_path_buf(),
            message: "not a regular file".to_string(),
        });
    }

    debug!(path = %path.display(), bytes = metadata.len(), download_name = %download_name, "artifact ready");
    Ok(Artifact {
        file,
        path: path.to_path_buf(),
        download_name,
        content_type,
        len: metadata.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn opens_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Invoice_A.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();

        let mut artifact = deliver(&path, "Invoice_A.pdf".to_string(), PDF_CONTENT_TYPE)
            .await
            .unwrap();
        assert_eq!(artifact.len, 8);
        let mut body = Vec::new();
        artifact.file.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"%PDF-1.7");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn missing_file_is_delivery_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = deliver(&dir.path().join("gone.xlsx"), "x".to_string(), XLSX_CONTENT_TYPE)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "delivery_failed");
    }

    #[tokio::test]
    async fn directory_is_delivery_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = deliver(dir.path(), "x".to_string(), XLSX_CONTENT_TYPE)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "delivery_failed");
    }

    #[test]
    fn media_types_follow_the_job_kind() {
        assert_eq!(content_type(RenderJobKind::SinglePdf), "application/pdf");
        assert_eq!(content_type(RenderJobKind::BulkReport), XLSX_CONTENT_TYPE);
    }
}
