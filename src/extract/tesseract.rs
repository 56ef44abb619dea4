//! Image preprocessing and the tesseract CLI OCR engine.

use std::process::Stdio;
use std::time::Duration;

use image::{GrayImage, ImageFormat, Luma};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use super::OcrEngine;
use crate::config::OcrConfig;
use crate::error::ExtractionError;

/// Pixels brighter than this become white, the rest black.
pub const BINARY_THRESHOLD: u8 = 150;

/// Decode image bytes, convert to grayscale and binarize.
pub fn preprocess(data: &[u8]) -> Result<GrayImage, ExtractionError> {
    let image = image::load_from_memory(data)?;
    Ok(binarize(image.to_luma8(), BINARY_THRESHOLD))
}

pub fn binarize(mut gray: GrayImage, threshold: u8) -> GrayImage {
    for Luma([value]) in gray.pixels_mut() {
        *value = if *value > threshold { 255 } else { 0 };
    }
    gray
}

/// Runs the `tesseract` executable on a temporary PNG.
pub struct TesseractEngine {
    executable: String,
    language: String,
    timeout: Duration,
}

impl TesseractEngine {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            executable: config.tesseract_path.clone(),
            language: config.language.clone(),
            timeout: config.timeout,
        }
    }
}

#[async_trait::async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, bitmap: &GrayImage) -> Result<String, ExtractionError> {
        let input = tempfile::Builder::new()
            .prefix("interview-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| ExtractionError::Ocr(format!("failed to create temp file: {e}")))?;

        bitmap
            .save_with_format(input.path(), ImageFormat::Png)
            .map_err(|e| ExtractionError::Ocr(format!("failed to write bitmap: {e}")))?;

        let (width, height) = bitmap.dimensions();
        info!("TesseractEngine: recognizing {}x{} bitmap", width, height);

        let mut command = Command::new(&self.executable);
        command
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.timeout, command.output()).await {
            Ok(result) => result.map_err(|e| {
                ExtractionError::Ocr(format!("failed to run {}: {e}", self.executable))
            })?,
            Err(_) => {
                return Err(ExtractionError::Ocr(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Ocr(format!(
                "{} exited with {}: {}",
                self.executable,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).to_string();
        debug!("TesseractEngine: {} chars recognized", text.len());
        Ok(text)
    }
}
