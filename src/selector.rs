//! Keyframe selection state machine
//!
//! Walks the video at a fixed cadence and, per sample, decides to accept it
//! as a new keyframe, replace the current incumbent in place, or discard it.
//! When the pass under-produces, the fallback sampler tops the set up.

use std::path::PathBuf;
use opencv::core::Mat;
use tracing::{instrument, debug, info, warn};
use crate::{
    common::{usable_fps, FrameTimecode},
    compare::{is_improvement, similarity},
    config::ExtractionConfig,
    fallback::FallbackSampler,
    features::{FrameFeatures, FrameScorer, ScoredFrame},
    keyframe::{KeyframeOrigin, KeyframeRecord, KeyframeSet, RunStats, SelectionOutcome},
    store::KeyframeStore,
    video_stream::FrameSource,
};

/// What happened to one sample position
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// Frame could not be decoded or scored; nothing changed
    DecodeSkipped,
    /// Sharpness under the minimum; discarded
    RejectedBlur,
    /// First keyframe of the pass
    AcceptedInitial,
    /// Different enough from the incumbent to start a new keyframe
    AcceptedDistinct { similarity: f64 },
    /// Same slide as the incumbent but better; overwrote it in place
    Replaced { similarity: f64 },
    /// Same slide as the incumbent and not better; discarded
    RejectedSimilar { similarity: f64 },
    /// Persisting the accept or replacement failed; nothing changed
    WriteFailed,
}

/// Positions sampled by the content-aware pass
pub fn sample_positions(total_frame_count: u32, interval_frames: u32) -> impl Iterator<Item = u32> {
    (0..total_frame_count).step_by(interval_frames.max(1) as usize)
}

/// The keyframe the next sample is compared against
#[derive(Debug)]
struct Incumbent {
    record_index: usize,
    reference: PathBuf,
    features: FrameFeatures,
}

/// Drives one extraction pass over a frame source
///
/// Owns the in-progress keyframe set and the incumbent slot for the
/// lifetime of the pass.
pub struct KeyframeSelector<'a> {
    config: ExtractionConfig,
    scorer: &'a dyn FrameScorer,
    store: &'a mut dyn KeyframeStore,
    keyframes: KeyframeSet,
    incumbent: Option<Incumbent>,
    stats: RunStats,
}

impl<'a> KeyframeSelector<'a> {
    pub fn new(config: ExtractionConfig, scorer: &'a dyn FrameScorer, store: &'a mut dyn KeyframeStore) -> Self {
        Self {
            config,
            scorer,
            store,
            keyframes: KeyframeSet::new(),
            incumbent: None,
            stats: RunStats::default(),
        }
    }

    /// Keyframes accepted so far
    pub fn keyframes(&self) -> &KeyframeSet {
        &self.keyframes
    }

    /// Sample all positions of `source`, then run the fallback pass if needed
    #[instrument(skip_all)]
    pub fn run(mut self, source: &mut dyn FrameSource) -> SelectionOutcome {
        let fps = usable_fps(source.fps());
        let total_frames = source.frame_count();
        let duration = total_frames as f64 / fps;

        self.stats.total_frame_count = total_frames;
        self.stats.fps = fps;
        self.stats.video_duration_seconds = duration;

        info!("Video info: {:.1}s, {} frames, {:.1} FPS", duration, total_frames, fps);

        let interval_frames = self.config.interval_frames(fps);
        debug!("Sampling every {} frames", interval_frames);

        for position in sample_positions(total_frames, interval_frames) {
            let outcome = match source.read_at(position) {
                Ok(Some(image)) => self.observe(position, fps, image),
                Ok(None) => SampleOutcome::DecodeSkipped,
                Err(e) => {
                    debug!("Skipping frame {}: {}", position, e);
                    SampleOutcome::DecodeSkipped
                }
            };
            debug!("Frame {}: {:?}", position, outcome);
            self.tally(outcome);
        }

        if self.keyframes.len() < self.config.min_keyframes {
            info!("Only {} keyframes selected, using fallback capture", self.keyframes.len());

            let sampler = FallbackSampler::new(&self.config, self.scorer);
            let fallback = sampler.sample_uniform(source, &mut *self.store, total_frames, fps);
            self.stats.fallback_used = true;
            self.stats.fallback_added = self.keyframes.merge_new(fallback);
        }

        self.stats.keyframe_count = self.keyframes.len();
        info!("Selection finished with {} keyframes ({} replacements, {} blurry, {} similar)",
              self.stats.keyframe_count, self.stats.replacements,
              self.stats.blur_rejects, self.stats.similar_rejects);

        SelectionOutcome {
            keyframes: self.keyframes,
            stats: self.stats,
        }
    }

    /// Decide what to do with the decoded frame at `position`
    pub fn observe(&mut self, position: u32, fps: f64, image: Mat) -> SampleOutcome {
        let fps = usable_fps(fps);
        let sharpness = match self.scorer.sharpness(&image) {
            Ok(sharpness) => sharpness,
            Err(e) => {
                warn!("Could not score frame {}: {}", position, e);
                return SampleOutcome::DecodeSkipped;
            }
        };

        if sharpness < self.config.min_sharpness {
            return SampleOutcome::RejectedBlur;
        }

        let features = match self.scorer.features(&image, sharpness) {
            Ok(features) => features,
            Err(e) => {
                warn!("Could not extract features of frame {}: {}", position, e);
                return SampleOutcome::DecodeSkipped;
            }
        };

        let frame = ScoredFrame {
            image,
            timestamp_seconds: FrameTimecode::new(position, fps).seconds(),
            features,
        };

        let (similarity, improves) = match &self.incumbent {
            None => return self.accept(frame, SampleOutcome::AcceptedInitial),
            Some(incumbent) => {
                let similarity = match similarity(&frame.features.color_fingerprint, &incumbent.features.color_fingerprint) {
                    Ok(similarity) => similarity,
                    Err(e) => {
                        warn!("Could not compare frame {}: {}", position, e);
                        return SampleOutcome::DecodeSkipped;
                    }
                };
                (similarity, is_improvement(&frame.features, &incumbent.features, &self.config))
            }
        };

        if similarity < self.config.similarity_threshold {
            return self.accept(frame, SampleOutcome::AcceptedDistinct { similarity });
        }

        if improves {
            self.replace(frame, similarity)
        } else {
            SampleOutcome::RejectedSimilar { similarity }
        }
    }

    fn accept(&mut self, frame: ScoredFrame, outcome: SampleOutcome) -> SampleOutcome {
        let sequence_index = self.keyframes.len() as u32 + 1;
        let reference = self.store.reference_for(KeyframeOrigin::ContentAware, sequence_index);

        if let Err(e) = self.store.write(&reference, &frame.image) {
            warn!("Keeping previous keyframe, could not save new one: {}", e);
            return SampleOutcome::WriteFailed;
        }

        let record = KeyframeRecord::new(reference.clone(), sequence_index, KeyframeOrigin::ContentAware, &frame);
        let record_index = self.keyframes.push(record);
        self.incumbent = Some(Incumbent {
            record_index,
            reference,
            features: frame.features,
        });

        match outcome {
            SampleOutcome::AcceptedDistinct { similarity } => {
                info!("Saved distinct frame at {:.1}s (corr={:.3})", frame.timestamp_seconds, similarity)
            }
            _ => info!("Saved initial frame at {:.1}s", frame.timestamp_seconds),
        }
        outcome
    }

    fn replace(&mut self, frame: ScoredFrame, similarity: f64) -> SampleOutcome {
        let Some(incumbent) = self.incumbent.as_mut() else {
            return SampleOutcome::RejectedSimilar { similarity };
        };

        if let Err(e) = self.store.write(&incumbent.reference, &frame.image) {
            warn!("Replacement failed, keeping incumbent: {}", e);
            return SampleOutcome::WriteFailed;
        }

        if let Some(record) = self.keyframes.get_mut(incumbent.record_index) {
            record.refresh_from(&frame);
        }
        incumbent.features = frame.features;

        info!("Replaced with better frame at {:.1}s", frame.timestamp_seconds);
        SampleOutcome::Replaced { similarity }
    }

    fn tally(&mut self, outcome: SampleOutcome) {
        self.stats.samples_taken += 1;
        match outcome {
            SampleOutcome::DecodeSkipped => self.stats.decode_skips += 1,
            SampleOutcome::RejectedBlur => self.stats.blur_rejects += 1,
            SampleOutcome::RejectedSimilar { .. } => self.stats.similar_rejects += 1,
            SampleOutcome::Replaced { .. } => self.stats.replacements += 1,
            SampleOutcome::WriteFailed => self.stats.write_failures += 1,
            SampleOutcome::AcceptedInitial | SampleOutcome::AcceptedDistinct { .. } => {}
        }
    }
}

impl std::fmt::Debug for KeyframeSelector<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyframeSelector")
            .field("config", &self.config)
            .field("keyframes", &self.keyframes.len())
            .field("has_incumbent", &self.incumbent.is_some())
            .finish()
    }
}
