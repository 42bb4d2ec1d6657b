//! End-to-end processing: fetch, extract, export, clean up.
//!
//! The pipeline only sequences collaborators. Selection logic lives in the
//! selector; fetching and exporting sit behind their traits.

use std::path::PathBuf;
use std::time::Instant;
use serde::Serialize;
use tracing::{instrument, info, warn};
use crate::{
    common::{KeyframeError, Result},
    config::ExtractionConfig,
    export::DocumentExporter,
    extract_keyframes,
    features::{FeatureExtractor, FrameScorer},
    fetch::{self, VideoFetcher},
    keyframe::{KeyframeSet, RunStats},
    store::DirectoryStore,
};

/// What one pipeline run produced
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub content_name: String,
    pub keyframes: KeyframeSet,
    pub stats: RunStats,
    /// The exported document; `None` when export was skipped or failed
    pub document: Option<PathBuf>,
    /// Why the run did not fully succeed
    pub diagnostic: Option<String>,
    pub elapsed_ms: u64,
}

impl PipelineReport {
    pub fn succeeded(&self) -> bool {
        self.diagnostic.is_none()
    }
}

/// Sequences fetch → keyframe selection → document export → cleanup
pub struct Pipeline {
    config: ExtractionConfig,
    output_dir: PathBuf,
    fetcher: Box<dyn VideoFetcher>,
    scorer: Box<dyn FrameScorer>,
    exporter: Option<Box<dyn DocumentExporter>>,
}

impl Pipeline {
    pub fn new(
        config: ExtractionConfig,
        output_dir: impl Into<PathBuf>,
        fetcher: Box<dyn VideoFetcher>,
        exporter: Option<Box<dyn DocumentExporter>>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            output_dir: output_dir.into(),
            fetcher,
            scorer: Box::new(FeatureExtractor::new()),
            exporter,
        })
    }

    /// Score frames with a different extractor (for example one with OCR)
    pub fn with_scorer(mut self, scorer: Box<dyn FrameScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Run the whole chain for one video
    ///
    /// Fetch and open failures, and passes that keep no keyframes at all,
    /// are errors. A failed export still returns the keyframes, with the
    /// failure in `diagnostic`.
    #[instrument(skip(self))]
    pub fn process(&self, locator: &str, content_name: &str) -> Result<PipelineReport> {
        info!("Starting video processing");
        let started = Instant::now();

        let video = self.fetcher.fetch(locator, content_name).map_err(|e| KeyframeError::FetchFailed {
            locator: locator.to_string(),
            reason: format!("{:#}", e),
        })?;

        let extracted = self.extract(&video.path, content_name);

        match fetch::cleanup(&video) {
            Ok(true) => info!("Cleaned up: {}", video.path.display()),
            Ok(false) => {}
            Err(e) => warn!("Could not remove {}: {}", video.path.display(), e),
        }

        let outcome = extracted?;
        if outcome.keyframes.is_empty() {
            return Err(KeyframeError::NoKeyframes {
                path: video.path.display().to_string(),
            });
        }

        let (document, diagnostic) = match &self.exporter {
            Some(exporter) => match exporter.export(&outcome.keyframes.sorted_references(), content_name) {
                Ok(document) => (Some(document), None),
                Err(e) => {
                    warn!("Document export failed: {:#}", e);
                    (None, Some(format!("no document produced: {:#}", e)))
                }
            },
            None => (None, None),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!("Total processing time: {:.1} seconds", elapsed_ms as f64 / 1000.0);

        Ok(PipelineReport {
            content_name: content_name.to_string(),
            keyframes: outcome.keyframes,
            stats: outcome.stats,
            document,
            diagnostic,
            elapsed_ms,
        })
    }

    fn extract(&self, video: &std::path::Path, content_name: &str) -> Result<crate::keyframe::SelectionOutcome> {
        let video = video.to_str().ok_or_else(|| KeyframeError::VideoOpenFailed {
            path: video.display().to_string(),
        })?;
        let mut store = DirectoryStore::create(&self.output_dir, content_name)?;
        extract_keyframes(video, &self.config, self.scorer.as_ref(), &mut store)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("output_dir", &self.output_dir)
            .field("exports", &self.exporter.is_some())
            .finish()
    }
}
