//! Optional text recognition
//!
//! Text amount is one of the replacement signals. Recognition itself is an
//! external capability: the engine only sees the `TextRecognizer` trait, with
//! a no-op default for builds or hosts without an OCR engine.

use std::process::Command;
use anyhow::{bail, Context};
use opencv::{core::{Mat, Vector}, imgcodecs};
use tracing::{debug, instrument};

/// Result of running OCR over one frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recognition {
    /// Count of recognized text units (non-whitespace characters)
    pub text_units: u32,
    pub text: String,
}

impl Recognition {
    /// Build a recognition from raw OCR output
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into().trim().to_string();
        let text_units = text.chars().filter(|c| !c.is_whitespace()).count() as u32;
        Self { text_units, text }
    }
}

/// Capability that turns a frame into recognized text
pub trait TextRecognizer {
    fn recognize(&self, frame: &Mat) -> anyhow::Result<Recognition>;
}

/// Recognizer used when no OCR engine is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTextRecognizer;

impl TextRecognizer for NoTextRecognizer {
    fn recognize(&self, _frame: &Mat) -> anyhow::Result<Recognition> {
        Ok(Recognition::default())
    }
}

/// Runs the `tesseract` command-line tool on a scratch PNG
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: String,
    language: String,
}

impl TesseractCli {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: language.into(),
        }
    }

    /// Use a specific tesseract executable instead of the one on PATH
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Check whether the binary can be launched at all
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("eng")
    }
}

impl TextRecognizer for TesseractCli {
    #[instrument(skip(self, frame))]
    fn recognize(&self, frame: &Mat) -> anyhow::Result<Recognition> {
        let scratch = tempfile::Builder::new()
            .prefix("ocr_frame_")
            .suffix(".png")
            .tempfile()
            .context("creating OCR scratch file")?;
        let scratch_path = scratch.path().to_string_lossy().to_string();

        let written = imgcodecs::imwrite(&scratch_path, frame, &Vector::<i32>::new())
            .context("encoding frame for OCR")?;
        if !written {
            bail!("OpenCV refused to write {}", scratch_path);
        }

        let output = Command::new(&self.binary)
            .arg(&scratch_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .with_context(|| format!("launching {}", self.binary))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let recognition = Recognition::from_text(String::from_utf8_lossy(&output.stdout));
        debug!("OCR recognized {} text units", recognition.text_units);
        Ok(recognition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};
    use opencv::prelude::*;

    #[test]
    fn test_recognition_counts_non_whitespace() {
        let recognition = Recognition::from_text("  Hello world\n\tslide 2 \n");
        assert_eq!(recognition.text, "Hello world\n\tslide 2");
        assert_eq!(recognition.text_units, 16);

        assert_eq!(Recognition::from_text("   \n"), Recognition::default());
    }

    #[test]
    fn test_no_text_recognizer() {
        let frame = Mat::new_rows_cols_with_default(8, 8, CV_8UC3, Scalar::all(255.0)).unwrap();
        let recognition = NoTextRecognizer.recognize(&frame).unwrap();
        assert_eq!(recognition.text_units, 0);
        assert!(recognition.text.is_empty());
    }

    #[test]
    fn test_missing_tesseract_binary_errors() {
        let ocr = TesseractCli::default().with_binary("definitely-not-a-tesseract-binary");
        assert!(!ocr.is_available());

        let frame = Mat::new_rows_cols_with_default(8, 8, CV_8UC3, Scalar::all(255.0)).unwrap();
        assert!(ocr.recognize(&frame).is_err());
    }
}
