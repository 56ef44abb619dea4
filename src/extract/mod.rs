//! Resume text extraction.
//!
//! Defines the [`TextExtractor`] capability and the [`OcrEngine`] it relies on
//! for images, so both can be swapped for deterministic fakes in tests.

pub mod pdf;
pub mod tesseract;

use std::path::Path;
use std::sync::Arc;

use image::GrayImage;
use tracing::{debug, info};

use crate::error::ExtractionError;

/// Kinds of resume documents accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    /// Detect the kind from the upload's content type, falling back to the
    /// file extension when the content type is missing or generic.
    pub fn detect(filename: &str, content_type: Option<&str>) -> Option<Self> {
        let from_mime = content_type.and_then(|mime| {
            match mime.split(';').next().unwrap_or_default().trim() {
                "application/pdf" => Some(Self::Pdf),
                "image/png" | "image/jpeg" | "image/jpg" => Some(Self::Image),
                _ => None,
            }
        });

        from_mime.or_else(|| {
            let ext = Path::new(filename)
                .extension()?
                .to_str()?
                .to_ascii_lowercase();
            match ext.as_str() {
                "pdf" => Some(Self::Pdf),
                "png" | "jpg" | "jpeg" => Some(Self::Image),
                _ => None,
            }
        })
    }
}

/// An uploaded resume.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub kind: DocumentKind,
    pub data: Vec<u8>,
}

impl Document {
    /// Build a document from an upload, rejecting unsupported types.
    pub fn from_upload(
        filename: impl Into<String>,
        content_type: Option<&str>,
        data: Vec<u8>,
    ) -> Result<Self, ExtractionError> {
        let filename = filename.into();
        let kind = DocumentKind::detect(&filename, content_type).ok_or_else(|| {
            ExtractionError::UnsupportedType(
                content_type
                    .map(str::to_string)
                    .unwrap_or_else(|| filename.clone()),
            )
        })?;
        Ok(Self {
            filename,
            kind,
            data,
        })
    }
}

/// Turns an uploaded document into plain text.
#[async_trait::async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, document: &Document) -> Result<String, ExtractionError>;
}

/// Recognizes text in a preprocessed (binarized) bitmap.
#[async_trait::async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;
    async fn recognize(&self, bitmap: &GrayImage) -> Result<String, ExtractionError>;
}

/// PDF text via `lopdf`, images via preprocessing plus an OCR engine.
pub struct DocumentExtractor {
    ocr: Arc<dyn OcrEngine>,
}

impl DocumentExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }
}

#[async_trait::async_trait]
impl TextExtractor for DocumentExtractor {
    async fn extract(&self, document: &Document) -> Result<String, ExtractionError> {
        info!(
            "Extracting text from {} ({:?}, {} bytes)",
            document.filename,
            document.kind,
            document.data.len()
        );

        let data = document.data.clone();
        let text = match document.kind {
            DocumentKind::Pdf => {
                tokio::task::spawn_blocking(move || pdf::extract_text(&data)).await??
            }
            DocumentKind::Image => {
                let bitmap =
                    tokio::task::spawn_blocking(move || tesseract::preprocess(&data)).await??;
                debug!("Running {} OCR on {}", self.ocr.name(), document.filename);
                self.ocr.recognize(&bitmap).await?
            }
        };

        info!("Extracted {} chars from {}", text.chars().count(), document.filename);
        Ok(text)
    }
}
