//! Slide keyframe extraction for lecture and presentation videos
//!
//! Samples a video at a fixed cadence, drops blurry frames, collapses
//! consecutive samples of the same slide into one keyframe (keeping the
//! sharpest or most text-rich take), and falls back to uniform sampling when
//! too little content is found. The resulting images can be bundled into a
//! PDF.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use rust_keyframes::{extract_slides, extract_keyframes, DirectoryStore, ExtractionConfig, FeatureExtractor};
//!
//! // Default settings, PNGs land in ./out/lecture_slides/
//! let outcome = extract_slides("lecture.mp4", "lecture", Path::new("out"))?;
//! println!("Kept {} keyframes", outcome.keyframes.len());
//!
//! // Custom thresholds and collaborators
//! let config = ExtractionConfig { capture_interval_seconds: 2.0, ..Default::default() };
//! let scorer = FeatureExtractor::new();
//! let mut store = DirectoryStore::create(Path::new("out"), "talk")?;
//! let outcome = extract_keyframes("talk.mp4", &config, &scorer, &mut store)?;
//! for record in &outcome.keyframes {
//!     println!("{} at {:.1}s", record.storage_reference.display(), record.timestamp_seconds);
//! }
//! # Ok::<(), rust_keyframes::KeyframeError>(())
//! ```

mod common;
mod compare;
mod config;
mod export;
mod fallback;
mod features;
mod fetch;
mod keyframe;
mod ocr;
mod pipeline;
mod selector;
mod store;
mod video_stream;

// Re-export main types for public API
pub use common::{usable_fps, FrameTimecode, KeyframeError, Result, DEFAULT_FPS};
pub use compare::{is_improvement, similarity};
pub use config::{ExtractionConfig, ReplacePolicy};
pub use export::{DocumentExporter, PdfExporter};
pub use fallback::{uniform_positions, FallbackSampler};
pub use features::{ColorFingerprint, FeatureExtractor, FrameFeatures, FrameScorer, ScoredFrame, HUE_BINS, SAT_BINS};
pub use fetch::{cleanup, is_remote, FetchedVideo, LocalFile, VideoFetcher, YtDlp};
pub use keyframe::{KeyframeOrigin, KeyframeRecord, KeyframeSet, RunStats, SelectionOutcome};
pub use ocr::{NoTextRecognizer, Recognition, TesseractCli, TextRecognizer};
pub use pipeline::{Pipeline, PipelineReport};
pub use selector::{sample_positions, KeyframeSelector, SampleOutcome};
pub use store::{slide_file_name, DirectoryStore, KeyframeStore};
pub use video_stream::{FrameSource, VideoStream};

use std::path::Path;
use serde::Serialize;
use tracing::{instrument, info};

/// Run one extraction pass over a video file
///
/// Opens the video, samples it every `capture_interval_seconds`, and writes
/// each kept keyframe through `store`. Per-frame problems (undecodable
/// frames, failed writes) are absorbed and counted in the returned stats.
///
/// # Arguments
/// * `video_path` - Path to the video file to analyze
/// * `config` - Sampling and deduplication thresholds
/// * `scorer` - Computes sharpness, text and colour features per frame
/// * `store` - Destination for keyframe images
///
/// # Errors
/// * `InvalidConfig` - If `config` fails validation
/// * `VideoNotFound` - If the video file doesn't exist
/// * `VideoOpenFailed` - If OpenCV can't open the video
#[instrument(skip(config, scorer, store))]
pub fn extract_keyframes(
    video_path: &str,
    config: &ExtractionConfig,
    scorer: &dyn FrameScorer,
    store: &mut dyn KeyframeStore,
) -> Result<SelectionOutcome> {
    config.validate()?;

    let mut video_stream = VideoStream::open(video_path)?;
    info!("Video properties: {}x{} at {:.2}fps, {} frames total",
          video_stream.width(), video_stream.height(),
          video_stream.fps(), video_stream.frame_count());

    let selector = KeyframeSelector::new(config.clone(), scorer, store);
    let outcome = selector.run(&mut video_stream);

    info!("Extracted {} keyframes from {}", outcome.keyframes.len(), video_path);
    Ok(outcome)
}

/// Extract keyframes with default settings into `<output_dir>/<content_name>_slides/`
///
/// # Example
/// ```rust,no_run
/// use std::path::Path;
/// use rust_keyframes::extract_slides;
///
/// let outcome = extract_slides("lecture.mp4", "lecture", Path::new("out"))?;
/// println!("Slides: {:?}", outcome.keyframes.sorted_references());
/// # Ok::<(), rust_keyframes::KeyframeError>(())
/// ```
#[instrument]
pub fn extract_slides(video_path: &str, content_name: &str, output_dir: &Path) -> Result<SelectionOutcome> {
    let config = ExtractionConfig::default();
    let scorer = FeatureExtractor::new();
    let mut store = DirectoryStore::create(output_dir, content_name)?;
    extract_keyframes(video_path, &config, &scorer, &mut store)
}

/// Get video information without extracting anything
///
/// # Arguments
/// * `video_path` - Path to the video file to analyze
///
/// # Returns
/// * `Result<VideoInfo>` - Video metadata including FPS, frame count, and dimensions
#[instrument]
pub fn get_video_info(video_path: &str) -> Result<VideoInfo> {
    let video_stream = VideoStream::open(video_path)?;

    Ok(VideoInfo {
        path: video_path.to_string(),
        fps: video_stream.fps(),
        frame_count: video_stream.frame_count(),
        width: video_stream.width().max(0) as u32,
        height: video_stream.height().max(0) as u32,
        duration_seconds: video_stream.duration_seconds(),
    })
}

/// Video metadata information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInfo {
    pub path: String,
    pub fps: f64,
    pub frame_count: u32,
    pub width: u32,
    pub height: u32,
    pub duration_seconds: f64,
}

impl VideoInfo {
    /// Get a human-readable description of the video
    pub fn description(&self) -> String {
        format!(
            "{}x{} at {:.2}fps, {} frames ({:.1}s duration)",
            self.width, self.height, self.fps, self.frame_count, self.duration_seconds
        )
    }

    /// Check if this appears to be a valid video configuration
    pub fn is_valid(&self) -> bool {
        self.fps > 0.0
            && self.frame_count > 0
            && self.width > 0
            && self.height > 0
            && self.duration_seconds > 0.0
    }

    /// Number of content-aware samples a pass with `config` would take
    pub fn sample_count(&self, config: &ExtractionConfig) -> usize {
        sample_positions(self.frame_count, config.interval_frames(self.fps)).count()
    }
}

/// Initialize tracing for the library
///
/// Call this once at the start of your application. `RUST_LOG` overrides
/// `level` when set.
///
/// # Arguments
/// * `level` - Tracing level filter (e.g., "debug", "info", "warn", "error")
pub fn init_tracing(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Keyframe extraction initialized with tracing level: {}", level);
}
