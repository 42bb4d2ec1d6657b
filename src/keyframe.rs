//! Keyframe records, the ordered keyframe set and per-pass statistics.

use std::path::{Path, PathBuf};
use serde::Serialize;
use crate::features::ScoredFrame;

/// Which pass created a record; each pass numbers its records independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyframeOrigin {
    ContentAware,
    Fallback,
}

/// One persisted keyframe
///
/// `sequence_index` and `storage_reference` are fixed at creation. The scalar
/// fields always describe the frame currently stored at the reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyframeRecord {
    pub storage_reference: PathBuf,
    pub sequence_index: u32,
    pub origin: KeyframeOrigin,
    pub timestamp_seconds: f64,
    pub sharpness: f64,
    pub edge_density: f64,
    pub text_amount: u32,
}

impl KeyframeRecord {
    pub fn new(storage_reference: PathBuf, sequence_index: u32, origin: KeyframeOrigin, frame: &ScoredFrame) -> Self {
        Self {
            storage_reference,
            sequence_index,
            origin,
            timestamp_seconds: frame.timestamp_seconds,
            sharpness: frame.features.sharpness,
            edge_density: frame.features.edge_density,
            text_amount: frame.features.text_amount,
        }
    }

    /// Take over the scalar snapshot of a replacement frame
    pub fn refresh_from(&mut self, frame: &ScoredFrame) {
        self.timestamp_seconds = frame.timestamp_seconds;
        self.sharpness = frame.features.sharpness;
        self.edge_density = frame.features.edge_density;
        self.text_amount = frame.features.text_amount;
    }
}

/// Ordered keyframes of one extraction, in selection order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct KeyframeSet {
    records: Vec<KeyframeRecord>,
}

impl KeyframeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[KeyframeRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyframeRecord> {
        self.records.iter()
    }

    pub fn get(&self, index: usize) -> Option<&KeyframeRecord> {
        self.records.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut KeyframeRecord> {
        self.records.get_mut(index)
    }

    pub fn contains_reference(&self, reference: &Path) -> bool {
        self.records.iter().any(|r| r.storage_reference == reference)
    }

    /// Append a record, returning its position in the set
    pub(crate) fn push(&mut self, record: KeyframeRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    /// Append the records whose references are not present yet; returns how many were added
    pub(crate) fn merge_new(&mut self, records: Vec<KeyframeRecord>) -> usize {
        let mut added = 0;
        for record in records {
            if !self.contains_reference(&record.storage_reference) {
                self.records.push(record);
                added += 1;
            }
        }
        added
    }

    /// Storage references sorted lexicographically, the order the exporter pages them in
    pub fn sorted_references(&self) -> Vec<PathBuf> {
        let mut refs: Vec<PathBuf> = self.records.iter().map(|r| r.storage_reference.clone()).collect();
        refs.sort();
        refs
    }
}

impl<'a> IntoIterator for &'a KeyframeSet {
    type Item = &'a KeyframeRecord;
    type IntoIter = std::slice::Iter<'a, KeyframeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Counters describing one finished extraction pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub total_frame_count: u32,
    pub fps: f64,
    pub video_duration_seconds: f64,
    pub keyframe_count: usize,
    pub samples_taken: u32,
    pub decode_skips: u32,
    pub blur_rejects: u32,
    pub similar_rejects: u32,
    pub replacements: u32,
    pub write_failures: u32,
    pub fallback_used: bool,
    pub fallback_added: usize,
}

/// Result of an extraction pass: the keyframes plus how they came about
#[derive(Debug, Clone, Serialize)]
pub struct SelectionOutcome {
    pub keyframes: KeyframeSet,
    pub stats: RunStats,
}
