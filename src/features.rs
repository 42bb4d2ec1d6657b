//! Per-frame feature extraction
//!
//! Computes the signals the selector decides on: Laplacian-variance
//! sharpness, Canny edge density, OCR text amount and an HSV hue/saturation
//! histogram used as a color fingerprint.

use opencv::{core::{self, Mat, Vector}, imgproc, prelude::*};
use tracing::{instrument, debug, trace};
use crate::{
    common::{KeyframeError, Result},
    ocr::{NoTextRecognizer, Recognition, TextRecognizer},
};

/// Hue bins of the color fingerprint (OpenCV hue spans 0..180)
pub const HUE_BINS: i32 = 50;
/// Saturation bins of the color fingerprint
pub const SAT_BINS: i32 = 60;

const CANNY_LOW: f64 = 100.0;
const CANNY_HIGH: f64 = 200.0;

/// Normalized hue/saturation histogram, flattened row-major
#[derive(Debug, Clone, PartialEq)]
pub struct ColorFingerprint(Vec<f32>);

impl ColorFingerprint {
    pub fn from_bins(bins: Vec<f32>) -> Self {
        Self(bins)
    }

    pub fn bins(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything the selector knows about a sample besides its pixels
#[derive(Debug, Clone, PartialEq)]
pub struct FrameFeatures {
    pub sharpness: f64,
    pub edge_density: f64,
    pub text_amount: u32,
    pub text_content: String,
    pub color_fingerprint: ColorFingerprint,
}

/// A decoded sample together with its position and features
pub struct ScoredFrame {
    pub image: Mat,
    pub timestamp_seconds: f64,
    pub features: FrameFeatures,
}

impl std::fmt::Debug for ScoredFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoredFrame")
            .field("timestamp_seconds", &self.timestamp_seconds)
            .field("sharpness", &self.features.sharpness)
            .field("edge_density", &self.features.edge_density)
            .field("text_amount", &self.features.text_amount)
            .finish()
    }
}

/// Scores frames for the selector and the fallback sampler
///
/// Sharpness is split out so callers can reject blurry frames before paying
/// for OCR and histograms.
pub trait FrameScorer {
    /// Focus measure of the frame; higher is sharper
    fn sharpness(&self, frame: &Mat) -> Result<f64>;

    /// Remaining features, given an already measured sharpness
    fn features(&self, frame: &Mat, sharpness: f64) -> Result<FrameFeatures>;

    /// All features in one call
    fn extract(&self, frame: &Mat) -> Result<FrameFeatures> {
        let sharpness = self.sharpness(frame)?;
        self.features(frame, sharpness)
    }
}

/// OpenCV-backed feature extractor with an injected OCR capability
pub struct FeatureExtractor {
    recognizer: Box<dyn TextRecognizer>,
}

impl FeatureExtractor {
    /// Extractor without OCR; text amount is always zero
    pub fn new() -> Self {
        Self::with_recognizer(Box::new(NoTextRecognizer))
    }

    pub fn with_recognizer(recognizer: Box<dyn TextRecognizer>) -> Self {
        Self { recognizer }
    }

    /// Edge pixel fraction of the frame, in [0, 1]
    #[instrument(skip(self, frame))]
    pub fn edge_density(&self, frame: &Mat) -> Result<f64> {
        let gray = to_gray(frame)?;
        let mut edges = Mat::default();
        imgproc::canny(&gray, &mut edges, CANNY_LOW, CANNY_HIGH, 3, false)?;

        let total = (edges.rows() as f64) * (edges.cols() as f64);
        if total == 0.0 {
            return Ok(0.0);
        }
        let edge_pixels = core::count_non_zero(&edges)? as f64;
        Ok(edge_pixels / total)
    }

    /// Hue/saturation histogram of the frame, L2-normalized
    #[instrument(skip(self, frame))]
    pub fn color_fingerprint(&self, frame: &Mat) -> Result<ColorFingerprint> {
        let bgr = to_bgr(frame)?;
        let mut hsv = Mat::default();
        imgproc::cvt_color_def(&bgr, &mut hsv, imgproc::COLOR_BGR2HSV)?;

        let mut images = Vector::<Mat>::new();
        images.push(hsv);
        let channels = Vector::<i32>::from_slice(&[0, 1]);
        let hist_size = Vector::<i32>::from_slice(&[HUE_BINS, SAT_BINS]);
        let ranges = Vector::<f32>::from_slice(&[0.0, 180.0, 0.0, 256.0]);

        let mut hist = Mat::default();
        imgproc::calc_hist(&images, &channels, &core::no_array(), &mut hist, &hist_size, &ranges, false)?;

        let mut normalized = Mat::default();
        core::normalize(&hist, &mut normalized, 1.0, 0.0, core::NORM_L2, -1, &core::no_array())?;

        let bins = normalized.data_typed::<f32>()?.to_vec();
        trace!("Computed {}-bin color fingerprint", bins.len());
        Ok(ColorFingerprint(bins))
    }

    /// OCR text of the frame; recognizer failures degrade to no text
    pub fn text(&self, frame: &Mat) -> Recognition {
        match self.recognizer.recognize(frame) {
            Ok(recognition) => recognition,
            Err(e) => {
                debug!("Text recognition failed, treating frame as textless: {:#}", e);
                Recognition::default()
            }
        }
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScorer for FeatureExtractor {
    #[instrument(skip(self, frame))]
    fn sharpness(&self, frame: &Mat) -> Result<f64> {
        let gray = to_gray(frame)?;
        let mut laplacian = Mat::default();
        imgproc::laplacian(&gray, &mut laplacian, core::CV_64F, 1, 1.0, 0.0, core::BORDER_DEFAULT)?;

        let mut mean = Mat::default();
        let mut stddev = Mat::default();
        core::mean_std_dev(&laplacian, &mut mean, &mut stddev, &core::no_array())?;
        let sigma = *stddev.at::<f64>(0)?;

        Ok(sigma * sigma)
    }

    fn features(&self, frame: &Mat, sharpness: f64) -> Result<FrameFeatures> {
        let edge_density = self.edge_density(frame)?;
        let color_fingerprint = self.color_fingerprint(frame)?;
        let recognition = self.text(frame);

        Ok(FrameFeatures {
            sharpness,
            edge_density,
            text_amount: recognition.text_units,
            text_content: recognition.text,
            color_fingerprint,
        })
    }
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor").finish_non_exhaustive()
    }
}

fn to_gray(frame: &Mat) -> Result<Mat> {
    let code = match frame.channels() {
        1 => return Ok(frame.try_clone()?),
        3 => imgproc::COLOR_BGR2GRAY,
        4 => imgproc::COLOR_BGRA2GRAY,
        n => return Err(KeyframeError::frame_error(0, format!("Unsupported channel count: {}", n))),
    };
    let mut gray = Mat::default();
    imgproc::cvt_color_def(frame, &mut gray, code)?;
    Ok(gray)
}

fn to_bgr(frame: &Mat) -> Result<Mat> {
    let code = match frame.channels() {
        3 => return Ok(frame.try_clone()?),
        1 => imgproc::COLOR_GRAY2BGR,
        4 => imgproc::COLOR_BGRA2BGR,
        n => return Err(KeyframeError::frame_error(0, format!("Unsupported channel count: {}", n))),
    };
    let mut bgr = Mat::default();
    imgproc::cvt_color_def(frame, &mut bgr, code)?;
    Ok(bgr)
}
