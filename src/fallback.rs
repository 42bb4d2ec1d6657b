//! Uniform fallback sampling
//!
//! Used when content-aware selection keeps too few frames (static or mostly
//! blurry videos). Positions are spread evenly across the whole video and
//! every sharp frame is kept, trading selectivity for coverage.

use tracing::{instrument, debug, info, warn};
use crate::{
    common::{usable_fps, FrameTimecode},
    config::ExtractionConfig,
    features::{FrameScorer, ScoredFrame},
    keyframe::{KeyframeOrigin, KeyframeRecord},
    store::KeyframeStore,
    video_stream::FrameSource,
};

/// Evenly spaced positions over `total_frame_count` frames
pub fn uniform_positions(count: u32, total_frame_count: u32) -> Vec<u32> {
    let count = count.max(1);
    (0..count)
        .map(|i| (i as u64 * total_frame_count as u64 / count as u64) as u32)
        .collect()
}

/// Samples a video uniformly, keeping every frame that is not blurry
pub struct FallbackSampler<'a> {
    config: &'a ExtractionConfig,
    scorer: &'a dyn FrameScorer,
}

impl<'a> FallbackSampler<'a> {
    pub fn new(config: &'a ExtractionConfig, scorer: &'a dyn FrameScorer) -> Self {
        Self { config, scorer }
    }

    /// Persist sharp frames at uniform positions as `slide_fb_NNN` keyframes
    ///
    /// Undecodable positions and failed writes are skipped, so the result may
    /// hold fewer records than positions visited.
    #[instrument(skip(self, source, store))]
    pub fn sample_uniform(
        &self,
        source: &mut dyn FrameSource,
        store: &mut dyn KeyframeStore,
        total_frame_count: u32,
        fps: f64,
    ) -> Vec<KeyframeRecord> {
        let fps = usable_fps(fps);
        let count = self.config.fallback_count(total_frame_count);
        let mut records = Vec::new();

        for position in uniform_positions(count, total_frame_count) {
            let image = match source.read_at(position) {
                Ok(Some(image)) => image,
                Ok(None) => {
                    debug!("Fallback: no frame at {}", position);
                    continue;
                }
                Err(e) => {
                    debug!("Fallback: skipping frame {}: {}", position, e);
                    continue;
                }
            };

            let features = match self.scorer.sharpness(&image) {
                Ok(sharpness) if sharpness < self.config.min_sharpness => {
                    debug!("Fallback: frame {} too blurry ({:.1})", position, sharpness);
                    continue;
                }
                Ok(sharpness) => self.scorer.features(&image, sharpness),
                Err(e) => Err(e),
            };
            let features = match features {
                Ok(features) => features,
                Err(e) => {
                    warn!("Fallback: could not score frame {}: {}", position, e);
                    continue;
                }
            };

            let frame = ScoredFrame {
                image,
                timestamp_seconds: FrameTimecode::new(position, fps).seconds(),
                features,
            };

            let sequence_index = records.len() as u32 + 1;
            let reference = store.reference_for(KeyframeOrigin::Fallback, sequence_index);
            if let Err(e) = store.write(&reference, &frame.image) {
                warn!("Fallback: {}", e);
                continue;
            }

            records.push(KeyframeRecord::new(reference, sequence_index, KeyframeOrigin::Fallback, &frame));
        }

        info!("Fallback capture kept {} of {} positions", records.len(), count);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use crate::{
        selector::tests::{features, scene, ScriptedScorer, TaggedSource},
        store::tests::MemoryStore,
    };

    #[test]
    fn test_uniform_positions() {
        assert_eq!(uniform_positions(4, 1000), vec![0, 250, 500, 750]);
        assert_eq!(uniform_positions(3, 10), vec![0, 3, 6]);
        assert_eq!(uniform_positions(1, 0), vec![0]);
        assert_eq!(uniform_positions(0, 500), vec![0]);
    }

    #[test]
    fn test_keeps_sharp_frames_only() {
        let scorer = ScriptedScorer::default()
            .with(1, features(120.0, 0, scene(0)))
            .with(2, features(5.0, 0, scene(0)));
        let config = ExtractionConfig::default();
        let mut store = MemoryStore::default();
        // 600 frames -> 6 positions, every other one blurry
        let mut source = TaggedSource::new(30.0, 600, |i| Some(if (i / 100) % 2 == 0 { 1 } else { 2 }));

        let records = FallbackSampler::new(&config, &scorer).sample_uniform(&mut source, &mut store, 600, 30.0);

        assert_eq!(source.reads, vec![0, 100, 200, 300, 400, 500]);
        assert_eq!(records.len(), 3);
        let indices: Vec<u32> = records.iter().map(|r| r.sequence_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(records[1].storage_reference, PathBuf::from("mem/slide_fb_002.png"));
        assert!((records[1].timestamp_seconds - 200.0 / 30.0).abs() < 1e-9);
        assert!(records.iter().all(|r| r.origin == KeyframeOrigin::Fallback));
    }

    #[test]
    fn test_no_similarity_filtering() {
        let scorer = ScriptedScorer::default().with(1, features(120.0, 0, scene(0)));
        let config = ExtractionConfig::default();
        let mut store = MemoryStore::default();
        let mut source = TaggedSource::new(25.0, 5000, |_| Some(1));

        let records = FallbackSampler::new(&config, &scorer).sample_uniform(&mut source, &mut store, 5000, 25.0);
        assert_eq!(records.len(), 20);
    }

    #[test]
    fn test_skips_decode_and_write_failures() {
        let scorer = ScriptedScorer::default().with(1, features(120.0, 0, scene(0)));
        let config = ExtractionConfig::default();
        let mut store = MemoryStore::default();
        store.failing.insert(PathBuf::from("mem/slide_fb_002.png"));
        let mut source = TaggedSource::new(25.0, 400, |i| if i == 100 { None } else { Some(1) });

        let records = FallbackSampler::new(&config, &scorer).sample_uniform(&mut source, &mut store, 400, 25.0);

        // positions 0, 100 (undecodable), 200, 300 (slide_fb_002 unwritable twice)
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].storage_reference, PathBuf::from("mem/slide_fb_001.png"));
    }

    #[test]
    fn test_zero_frame_rate_timestamps() {
        let scorer = ScriptedScorer::default().with(1, features(120.0, 0, scene(0)));
        let config = ExtractionConfig::default();
        let mut store = MemoryStore::default();
        let mut source = TaggedSource::new(0.0, 400, |_| Some(1));

        let records = FallbackSampler::new(&config, &scorer).sample_uniform(&mut source, &mut store, 400, 0.0);

        assert_eq!(records.len(), 4);
        assert_eq!(records[1].timestamp_seconds, 4.0);
    }
}
