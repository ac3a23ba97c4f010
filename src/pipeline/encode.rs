//! Document encoding: PDF bytes → base64 payload.
//!
//! The Messages API accepts a PDF as a base64 `document` block embedded in
//! the JSON request body. No local parsing happens here; the bytes are sent
//! exactly as they sit on disk.

use crate::error::FileError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// Media type sent with every document block.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// A flyer ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPayload {
    /// Standard-alphabet base64 of the file bytes.
    pub data: String,
    /// Always [`PDF_MEDIA_TYPE`] today.
    pub media_type: &'static str,
    /// Size of the raw file in bytes.
    pub byte_len: usize,
}

impl DocumentPayload {
    /// Wrap raw PDF bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let data = STANDARD.encode(bytes);
        debug!("Encoded {} bytes → {} bytes base64", bytes.len(), data.len());
        Self {
            data,
            media_type: PDF_MEDIA_TYPE,
            byte_len: bytes.len(),
        }
    }
}

/// Read a PDF from disk and encode it.
pub async fn encode_pdf(path: &Path) -> Result<DocumentPayload, FileError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| FileError::ReadFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    Ok(DocumentPayload::from_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_small_document() {
        let payload = DocumentPayload::from_bytes(b"%PDF-1.7\n%%EOF");
        assert_eq!(payload.media_type, "application/pdf");
        assert_eq!(payload.byte_len, 14);
        let decoded = STANDARD.decode(&payload.data).expect("valid base64");
        assert_eq!(decoded, b"%PDF-1.7\n%%EOF");
    }

    #[test]
    fn encode_pdf_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flyer.pdf");
        std::fs::write(&path, b"%PDF-1.4 test").unwrap();

        let payload = tokio_test::block_on(encode_pdf(&path)).expect("encode should succeed");
        assert_eq!(payload.byte_len, 13);
    }

    #[test]
    fn encode_pdf_missing_file_is_read_error() {
        let err = tokio_test::block_on(encode_pdf(Path::new("/definitely/not/here.pdf")))
            .unwrap_err();
        assert!(matches!(err, FileError::ReadFailed { .. }));
    }
}
