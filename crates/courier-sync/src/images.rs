//! # Image Preparation
//!
//! Resolves captured page references to bytes and inlines them as base64.
//!
//! ```text
//!  ImageRef { uri: "file:///captures/p1.jpg" } ──► ImageSource::read ──► bytes
//!                                                                         │
//!                                      STANDARD base64 ◄──────────────────┘
//!                                            │
//!                                            ▼
//!  Some(InvoiceImage { encodedBytes, pageNumber: 1, mimeType: "image/jpeg" })
//!
//!  unreadable page ──► warn! + None (the transaction still goes out)
//! ```

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use courier_core::{ImageRef, InvoiceImage};
use std::path::PathBuf;
use tracing::warn;
use url::Url;

use crate::error::{SyncError, SyncResult};

const DEFAULT_MIME: &str = "image/jpeg";

/// Resolves an image URI to raw bytes.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn read(&self, uri: &str) -> SyncResult<Vec<u8>>;
}

/// Reads plain paths, `file://` URIs and base64 `data:` URIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsImageSource;

#[async_trait]
impl ImageSource for FsImageSource {
    async fn read(&self, uri: &str) -> SyncResult<Vec<u8>> {
        let unreadable = |reason: String| SyncError::ImageUnreadable {
            uri: uri.to_string(),
            reason,
        };

        if let Some(rest) = uri.strip_prefix("data:") {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| unreadable("data URI has no payload".into()))?;
            if !header.ends_with(";base64") {
                return Err(unreadable("only base64 data URIs are supported".into()));
            }
            return STANDARD
                .decode(payload.trim())
                .map_err(|e| unreadable(e.to_string()));
        }

        let path = if uri.starts_with("file://") {
            Url::parse(uri)
                .map_err(|e| unreadable(e.to_string()))?
                .to_file_path()
                .map_err(|_| unreadable("not a local file URI".into()))?
        } else {
            PathBuf::from(uri)
        };

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| unreadable(e.to_string()))?;
        if bytes.is_empty() {
            return Err(unreadable("file is empty".into()));
        }
        Ok(bytes)
    }
}

/// MIME type for a URI: the `data:` header if present, else by extension.
pub fn infer_mime_type(uri: &str) -> String {
    if let Some(rest) = uri.strip_prefix("data:") {
        let mime = rest.split([';', ',']).next().unwrap_or_default();
        if !mime.is_empty() {
            return mime.to_string();
        }
        return DEFAULT_MIME.to_string();
    }

    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        _ => DEFAULT_MIME,
    }
    .to_string()
}

/// Encodes every page, one output slot per input reference.
///
/// A page that cannot be read becomes `None`; the others are unaffected.
pub async fn encode_images(source: &dyn ImageSource, refs: &[ImageRef]) -> Vec<Option<InvoiceImage>> {
    let mut slots = Vec::with_capacity(refs.len());

    for (index, image) in refs.iter().enumerate() {
        let page_number = image.page_number.unwrap_or(index as u32 + 1);

        match source.read(&image.uri).await {
            Ok(bytes) => slots.push(Some(InvoiceImage {
                encoded_bytes: STANDARD.encode(&bytes),
                page_number,
                mime_type: image
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| infer_mime_type(&image.uri)),
            })),
            Err(e) => {
                warn!(page = page_number, error = %e, "Skipping unreadable invoice page");
                slots.push(None);
            }
        }
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_mime_type() {
        assert_eq!(infer_mime_type("/tmp/page1.PNG"), "image/png");
        assert_eq!(infer_mime_type("file:///a/b.webp?v=2"), "image/webp");
        assert_eq!(infer_mime_type("/tmp/noext"), "image/jpeg");
        assert_eq!(infer_mime_type("data:image/gif;base64,R0lG"), "image/gif");
    }

    #[tokio::test]
    async fn test_reads_path_file_uri_and_data_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.jpg");
        std::fs::write(&path, b"\xff\xd8\xff").unwrap();

        let source = FsImageSource;
        assert_eq!(source.read(path.to_str().unwrap()).await.unwrap(), b"\xff\xd8\xff");

        let uri = Url::from_file_path(&path).unwrap().to_string();
        assert_eq!(source.read(&uri).await.unwrap(), b"\xff\xd8\xff");

        let data_uri = format!("data:image/jpeg;base64,{}", STANDARD.encode(b"abc"));
        assert_eq!(source.read(&data_uri).await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_unreadable_inputs() {
        let source = FsImageSource;
        assert!(source.read("/definitely/not/here.jpg").await.is_err());
        assert!(source.read("data:image/png,rawtext").await.is_err());
        assert!(source.read("data:image/png;base64,@@@").await.is_err());
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_slots() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("p1.png");
        std::fs::write(&good, b"png-bytes").unwrap();

        let refs = vec![
            ImageRef::new(good.to_str().unwrap()),
            ImageRef::new("/missing/p2.png"),
            ImageRef {
                uri: format!("data:;base64,{}", STANDARD.encode(b"x")),
                page_number: Some(7),
                mime_type: Some("image/heic".into()),
            },
        ];

        let slots = encode_images(&FsImageSource, &refs).await;
        assert_eq!(slots.len(), 3);

        let first = slots[0].as_ref().unwrap();
        assert_eq!(first.page_number, 1);
        assert_eq!(first.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&first.encoded_bytes).unwrap(), b"png-bytes");

        assert!(slots[1].is_none());

        let third = slots[2].as_ref().unwrap();
        assert_eq!(third.page_number, 7);
        assert_eq!(third.mime_type, "image/heic");
    }
}
