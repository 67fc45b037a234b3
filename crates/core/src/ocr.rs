//! OCR boundary for the image extraction pass.

use tesseract::Tesseract;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("ocr failed: {0}")]
pub struct OcrError(pub String);

/// Recognizes text in an encoded raster image (PNG/JPEG bytes).
///
/// Injected into the extractor so tests can substitute a fake; an OCR
/// failure causes the image block to be dropped, never to abort the page.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;
}

/// Tesseract-backed engine. Each call initializes a fresh handle; the
/// underlying API is not Sync, so no handle is cached across calls.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    language: String,
}

impl TesseractOcr {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("eng")
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        let mut handle = Tesseract::new(None, Some(&self.language))
            .map_err(|error| OcrError(error.to_string()))?
            .set_image_from_mem(image_bytes)
            .map_err(|error| OcrError(error.to_string()))?;

        handle
            .get_text()
            .map_err(|error| OcrError(error.to_string()))
    }
}
