//! Common types, utilities, and error handling for the keyframe engine.
//!
//! This module provides the foundational types used throughout the codebase:
//! frame timecodes for sample positions and the error taxonomy shared by the
//! selector, the fallback sampler and the pipeline.

use std::path::{Path, PathBuf};
use tracing::trace;

/// Framerate assumed when the container does not report a usable one
pub const DEFAULT_FPS: f64 = 25.0;

/// `fps` if it is a finite positive rate, otherwise `DEFAULT_FPS`
pub fn usable_fps(fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 {
        fps
    } else {
        DEFAULT_FPS
    }
}

/// Represents a specific sample position within a video
///
/// This type encapsulates both the frame index and framerate information,
/// so that sample positions can be converted to timestamps consistently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTimecode {
    frame_number: u32,
    fps: f64,
}

impl FrameTimecode {
    /// Create a new FrameTimecode
    ///
    /// # Arguments
    /// * `frame_number` - The frame index (0-indexed)
    /// * `fps` - Frames per second of the video
    ///
    /// # Panics
    /// Panics if fps is not positive; pass rates through `usable_fps` first
    pub fn new(frame_number: u32, fps: f64) -> Self {
        assert!(fps > 0.0, "FPS must be positive, got: {}", fps);
        trace!("Created FrameTimecode: frame={}, fps={}", frame_number, fps);

        Self { frame_number, fps }
    }

    /// Get the frame index
    pub fn frame_number(&self) -> u32 {
        self.frame_number
    }

    /// Get the framerate
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Convert to seconds since start of video
    pub fn seconds(&self) -> f64 {
        self.frame_number as f64 / self.fps
    }

    /// Convert to milliseconds since start of video
    pub fn milliseconds(&self) -> f64 {
        self.seconds() * 1000.0
    }
}

/// All possible errors from the keyframe extraction system
///
/// Only the open failures abort an extraction pass. Frame, persistence and
/// OCR failures are absorbed where they happen and surface in the run
/// statistics instead.
#[derive(Debug, thiserror::Error)]
pub enum KeyframeError {
    #[error("Failed to open video file: {path}")]
    VideoOpenFailed { path: String },

    #[error("Video file not found: {path}")]
    VideoNotFound { path: String },

    #[error("OpenCV error: {0}")]
    OpenCvError(#[from] opencv::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Frame processing failed at frame {frame}: {reason}")]
    FrameProcessingFailed { frame: u32, reason: String },

    #[error("Failed to persist keyframe {}: {reason}", path.display())]
    PersistFailed { path: PathBuf, reason: String },

    #[error("Failed to fetch video from {locator}: {reason}")]
    FetchFailed { locator: String, reason: String },

    #[error("No keyframes extracted from {path}")]
    NoKeyframes { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KeyframeError {
    /// Create a configuration error with a descriptive message
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    /// Create a frame processing error
    pub fn frame_error(frame: u32, reason: impl Into<String>) -> Self {
        Self::FrameProcessingFailed {
            frame,
            reason: reason.into()
        }
    }

    /// Create a persistence error for the given target path
    pub fn persist_error(path: &Path, reason: impl Into<String>) -> Self {
        Self::PersistFailed {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Convenient Result type for keyframe operations
pub type Result<T> = std::result::Result<T, KeyframeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_timecode_creation() {
        let tc = FrameTimecode::new(100, 25.0);
        assert_eq!(tc.frame_number(), 100);
        assert_eq!(tc.fps(), 25.0);
        assert_eq!(tc.seconds(), 4.0);
        assert_eq!(tc.milliseconds(), 4000.0);
    }

    #[test]
    #[should_panic(expected = "FPS must be positive")]
    fn test_frame_timecode_invalid_fps_zero() {
        FrameTimecode::new(100, 0.0);
    }

    #[test]
    fn test_frame_timecode_fractional_fps() {
        let tc = FrameTimecode::new(0, 30.0);
        assert_eq!(tc.seconds(), 0.0);

        let tc = FrameTimecode::new(100, 29.97);
        assert!((tc.seconds() - 3.336_670_003_336_670).abs() < 1e-10);
    }

    #[test]
    fn test_usable_fps() {
        assert_eq!(usable_fps(29.97), 29.97);
        assert_eq!(usable_fps(0.0), DEFAULT_FPS);
        assert_eq!(usable_fps(-5.0), DEFAULT_FPS);
        assert_eq!(usable_fps(f64::NAN), DEFAULT_FPS);
        assert_eq!(usable_fps(f64::INFINITY), DEFAULT_FPS);
    }

    #[test]
    fn test_error_constructors() {
        let error = KeyframeError::config_error("Invalid threshold");
        assert!(matches!(error, KeyframeError::InvalidConfig { .. }));

        let error = KeyframeError::frame_error(42, "Decode failed");
        assert!(matches!(error, KeyframeError::FrameProcessingFailed { frame: 42, .. }));

        let error = KeyframeError::persist_error(Path::new("out/slide_001.png"), "disk full");
        assert!(matches!(error, KeyframeError::PersistFailed { .. }));
    }

    #[test]
    fn test_error_display() {
        let error = KeyframeError::VideoNotFound {
            path: "lecture.mp4".to_string()
        };
        assert_eq!(error.to_string(), "Video file not found: lecture.mp4");

        let error = KeyframeError::persist_error(Path::new("a/slide_002.png"), "read-only");
        assert_eq!(error.to_string(), "Failed to persist keyframe a/slide_002.png: read-only");
    }
}
