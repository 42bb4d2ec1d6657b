//! Frame comparison: fingerprint similarity and the replacement decision.

use opencv::{core::Mat, imgproc, prelude::*};
use tracing::warn;
use crate::{
    common::Result,
    config::{ExtractionConfig, ReplacePolicy},
    features::{ColorFingerprint, FrameFeatures},
};

/// Correlation of two color fingerprints, in [-1, 1]
///
/// OpenCV's `HISTCMP_CORREL`, which yields 1.0 when either histogram is
/// flat. Fingerprints of different sizes cannot describe the same slide and
/// compare as 0.0.
pub fn similarity(a: &ColorFingerprint, b: &ColorFingerprint) -> Result<f64> {
    if a.len() != b.len() || a.is_empty() {
        warn!("Comparing fingerprints of {} and {} bins", a.len(), b.len());
        return Ok(0.0);
    }

    let hist_a = Mat::from_slice(a.bins())?;
    let hist_b = Mat::from_slice(b.bins())?;
    Ok(imgproc::compare_hist(&*hist_a, &*hist_b, imgproc::HISTCMP_CORREL)?)
}

/// Whether `candidate` should replace `incumbent` as the image of one slide
///
/// Sharpness must beat the incumbent by `replace_sharpness_factor`; text must
/// beat it by more than `replace_text_extra` units. The configured policy
/// decides whether one or both must hold. Edge density is not consulted.
pub fn is_improvement(candidate: &FrameFeatures, incumbent: &FrameFeatures, config: &ExtractionConfig) -> bool {
    let sharper = candidate.sharpness > incumbent.sharpness * config.replace_sharpness_factor;
    let wordier = candidate.text_amount as u64 > incumbent.text_amount as u64 + config.replace_text_extra as u64;

    match config.replace_policy {
        ReplacePolicy::Either => sharper || wordier,
        ReplacePolicy::Both => sharper && wordier,
    }
}
