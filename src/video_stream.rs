//! Seekable video access using the OpenCV backend
//!
//! This module provides a wrapper around OpenCV's VideoCapture that supports
//! random access by frame index, plus the `FrameSource` trait the selector and
//! fallback sampler are written against.

use opencv::{videoio, core::Mat, prelude::*};
use tracing::{instrument, debug, warn, info};
use std::path::Path;
use crate::common::{usable_fps, Result, KeyframeError, DEFAULT_FPS};

/// Random-access source of decoded frames
///
/// Implementations report metadata once and decode single frames on demand.
/// A `None` from `read_at` means the position could not be decoded; callers
/// skip it rather than aborting.
pub trait FrameSource {
    /// Frames per second, already defaulted when the container lacks it
    fn fps(&self) -> f64;

    /// Total number of frames, 0 when unknown
    fn frame_count(&self) -> u32;

    /// Seek to `index` and decode the frame there
    fn read_at(&mut self, index: u32) -> Result<Option<Mat>>;

    /// Duration in seconds derived from the metadata
    fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / usable_fps(self.fps())
    }
}

/// Wrapper around OpenCV VideoCapture for seek-and-decode access
///
/// The capture handle is released when the stream is dropped, so every exit
/// path of an extraction pass frees it.
pub struct VideoStream {
    cap: videoio::VideoCapture,
    fps: f64,
    frame_count: u32,
    width: i32,
    height: i32,
    path: String,
}

impl VideoStream {
    /// Open a video file for reading
    ///
    /// # Errors
    /// * `VideoNotFound` - If the file doesn't exist
    /// * `VideoOpenFailed` - If OpenCV can't open the file
    #[instrument(skip(path))]
    pub fn open(path: &str) -> Result<Self> {
        info!("Opening video stream: {}", path);

        if !Path::new(path).is_file() {
            return Err(KeyframeError::VideoNotFound {
                path: path.to_string()
            });
        }

        let cap = videoio::VideoCapture::from_file(path, videoio::CAP_ANY)
            .map_err(|e| {
                warn!("Failed to create VideoCapture: {}", e);
                KeyframeError::VideoOpenFailed {
                    path: path.to_string()
                }
            })?;

        let is_opened = cap.is_opened().map_err(|e| {
            warn!("Failed to check if VideoCapture is opened: {}", e);
            KeyframeError::VideoOpenFailed {
                path: path.to_string()
            }
        })?;

        if !is_opened {
            return Err(KeyframeError::VideoOpenFailed {
                path: path.to_string()
            });
        }

        // Containers without usable metadata fall back instead of failing
        let fps = match cap.get(videoio::CAP_PROP_FPS) {
            Ok(fps) if fps > 0.0 && fps.is_finite() => fps,
            other => {
                warn!("No usable FPS reported ({:?}), assuming {}", other.ok(), DEFAULT_FPS);
                DEFAULT_FPS
            }
        };

        let frame_count = match cap.get(videoio::CAP_PROP_FRAME_COUNT) {
            Ok(count) if count > 0.0 && count.is_finite() => count as u32,
            other => {
                warn!("No usable frame count reported ({:?}), assuming 0", other.ok());
                0
            }
        };

        let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as i32;
        let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as i32;

        info!("Video opened - FPS: {:.2}, Frames: {}, Size: {}x{}",
              fps, frame_count, width, height);

        Ok(Self {
            cap,
            fps,
            frame_count,
            width,
            height,
            path: path.to_string(),
        })
    }

    /// Get the frame width in pixels (0 when unknown)
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Get the frame height in pixels (0 when unknown)
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Get the video file path
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl FrameSource for VideoStream {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> u32 {
        self.frame_count
    }

    fn read_at(&mut self, index: u32) -> Result<Option<Mat>> {
        let seeked = self.cap.set(videoio::CAP_PROP_POS_FRAMES, index as f64)
            .map_err(|e| KeyframeError::frame_error(index, format!("OpenCV seek failed: {}", e)))?;
        if !seeked {
            debug!("Backend refused seek to frame {}", index);
        }

        let mut frame = Mat::default();
        let success = self.cap.read(&mut frame)
            .map_err(|e| KeyframeError::frame_error(index, format!("OpenCV read failed: {}", e)))?;

        if success && !frame.empty() {
            debug!("Decoded frame {}/{}", index, self.frame_count);
            Ok(Some(frame))
        } else {
            debug!("No frame decoded at position {}", index);
            Ok(None)
        }
    }
}

// Implement Debug manually to avoid showing internal OpenCV state
impl std::fmt::Debug for VideoStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoStream")
            .field("path", &self.path)
            .field("fps", &self.fps)
            .field("frame_count", &self.frame_count)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Drop for VideoStream {
    fn drop(&mut self) {
        if let Err(e) = self.cap.release() {
            warn!("Failed to release video capture for {}: {}", self.path, e);
        } else {
            debug!("Released video capture for {}", self.path);
        }
    }
}
