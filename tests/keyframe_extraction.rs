//! End-to-end extraction over synthetic videos through the public API

use std::collections::HashSet;
use std::path::PathBuf;
use opencv::{
    core::{Mat, Rect, Scalar, Size, CV_8UC3},
    imgproc,
    prelude::*,
    videoio,
};
use rust_keyframes::{
    extract_keyframes, DirectoryStore, DocumentExporter, ExtractionConfig, FeatureExtractor,
    FrameSource, KeyframeError, KeyframeOrigin, KeyframeSelector, LocalFile, PdfExporter, Pipeline,
};

const WIDTH: i32 = 160;
const HEIGHT: i32 = 120;

/// Coloured background with a block of 4px black/white bars on the left
fn slide(background: (u8, u8, u8)) -> Mat {
    let mut frame = Mat::new_rows_cols_with_default(
        HEIGHT, WIDTH, CV_8UC3,
        Scalar::new(background.0 as f64, background.1 as f64, background.2 as f64, 0.0),
    ).unwrap();
    let mut x = 0;
    while x < WIDTH / 4 {
        let color = if (x / 4) % 2 == 0 { Scalar::all(0.0) } else { Scalar::all(255.0) };
        imgproc::rectangle(&mut frame, Rect::new(x, 0, 4, HEIGHT), color, -1, imgproc::LINE_8, 0).unwrap();
        x += 4;
    }
    frame
}

fn flat(background: (u8, u8, u8)) -> Mat {
    Mat::new_rows_cols_with_default(
        HEIGHT, WIDTH, CV_8UC3,
        Scalar::new(background.0 as f64, background.1 as f64, background.2 as f64, 0.0),
    ).unwrap()
}

/// Generates every frame on demand from its index
struct SyntheticVideo<F: Fn(u32) -> Mat> {
    fps: f64,
    frames: u32,
    render: F,
}

impl<F: Fn(u32) -> Mat> FrameSource for SyntheticVideo<F> {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> u32 {
        self.frames
    }

    fn read_at(&mut self, index: u32) -> rust_keyframes::Result<Option<Mat>> {
        if index >= self.frames {
            return Ok(None);
        }
        Ok(Some((self.render)(index)))
    }
}

const RED: (u8, u8, u8) = (0, 0, 200);
const GREEN: (u8, u8, u8) = (0, 200, 0);

#[test]
fn two_slide_lecture_keeps_one_frame_per_slide() {
    let dir = tempfile::tempdir().unwrap();
    let config = ExtractionConfig { min_keyframes: 2, ..Default::default() };
    let scorer = FeatureExtractor::new();
    let mut store = DirectoryStore::create(dir.path(), "lecture").unwrap();

    // 100 s at 25 fps, slide changes at 50 s
    let mut video = SyntheticVideo {
        fps: 25.0,
        frames: 2500,
        render: |i: u32| slide(if i < 1250 { RED } else { GREEN }),
    };

    let outcome = KeyframeSelector::new(config, &scorer, &mut store).run(&mut video);

    assert_eq!(outcome.stats.samples_taken, 20);
    assert_eq!(outcome.keyframes.len(), 2);
    assert!(!outcome.stats.fallback_used);

    let first = outcome.keyframes.get(0).unwrap();
    let second = outcome.keyframes.get(1).unwrap();
    assert_eq!(first.sequence_index, 1);
    assert_eq!(second.sequence_index, 2);
    assert_eq!(first.timestamp_seconds, 0.0);
    assert_eq!(second.timestamp_seconds, 50.0);
    assert!(first.storage_reference.ends_with("lecture_slides/slide_001.png"));
    assert!(second.storage_reference.is_file());
}

#[test]
fn sparse_lecture_is_topped_up_and_exported() {
    let dir = tempfile::tempdir().unwrap();
    let config = ExtractionConfig::default();
    let scorer = FeatureExtractor::new();
    let mut store = DirectoryStore::create(dir.path(), "lecture").unwrap();

    let mut video = SyntheticVideo {
        fps: 25.0,
        frames: 2500,
        render: |i: u32| slide(if i < 1250 { RED } else { GREEN }),
    };

    let outcome = KeyframeSelector::new(config, &scorer, &mut store).run(&mut video);

    assert!(outcome.stats.fallback_used);
    assert_eq!(outcome.stats.fallback_added, 20);
    assert_eq!(outcome.keyframes.len(), 22);

    let content_aware = outcome.keyframes.iter().filter(|r| r.origin == KeyframeOrigin::ContentAware).count();
    assert_eq!(content_aware, 2);

    let unique: HashSet<&PathBuf> = outcome.keyframes.iter().map(|r| &r.storage_reference).collect();
    assert_eq!(unique.len(), 22);

    let references = outcome.keyframes.sorted_references();
    assert!(references[0].ends_with("slide_001.png"));
    assert!(references[2].ends_with("slide_fb_001.png"));

    let pdf = PdfExporter::new(dir.path()).export(&references, "lecture").unwrap();
    let doc = lopdf::Document::load(&pdf).unwrap();
    assert_eq!(doc.get_pages().len(), 22);
}

#[test]
fn blurry_video_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let scorer = FeatureExtractor::new();
    let mut store = DirectoryStore::create(dir.path(), "fog").unwrap();

    let mut video = SyntheticVideo {
        fps: 25.0,
        frames: 2500,
        render: |i: u32| flat(if i < 1250 { RED } else { GREEN }),
    };

    let outcome = KeyframeSelector::new(ExtractionConfig::default(), &scorer, &mut store).run(&mut video);

    assert!(outcome.keyframes.is_empty());
    assert_eq!(outcome.stats.blur_rejects, 20);
    assert!(outcome.stats.fallback_used);
    assert_eq!(outcome.stats.fallback_added, 0);
    assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 0);
}

#[test]
fn missing_video_aborts_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let scorer = FeatureExtractor::new();
    let mut store = DirectoryStore::create(dir.path(), "ghost").unwrap();

    let err = extract_keyframes("/no/such/video.mp4", &ExtractionConfig::default(), &scorer, &mut store).unwrap_err();
    assert!(matches!(err, KeyframeError::VideoNotFound { .. }));
}

/// Writes an MJPG AVI; `None` when this OpenCV build cannot encode one
fn write_avi(path: &std::path::Path, frames: u32, render: impl Fn(u32) -> Mat) -> Option<()> {
    let fourcc = videoio::VideoWriter::fourcc('M', 'J', 'P', 'G').ok()?;
    let mut writer = videoio::VideoWriter::new(
        path.to_str()?, fourcc, 10.0, Size::new(WIDTH, HEIGHT), true,
    ).ok()?;
    if !writer.is_opened().ok()? {
        return None;
    }
    for i in 0..frames {
        writer.write(&render(i)).ok()?;
    }
    writer.release().ok()?;
    Some(())
}

#[test]
fn pipeline_processes_a_video_file() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("talk.avi");
    // 12 s at 10 fps, slide changes at 6 s
    if write_avi(&video, 120, |i| slide(if i < 60 { RED } else { GREEN })).is_none() {
        eprintln!("MJPG encoder unavailable, skipping");
        return;
    }

    let out = dir.path().join("out");
    let pipeline = Pipeline::new(
        ExtractionConfig { capture_interval_seconds: 1.0, min_keyframes: 1, ..Default::default() },
        &out,
        Box::new(LocalFile),
        Some(Box::new(PdfExporter::new(&out))),
    ).unwrap();

    let report = pipeline.process(video.to_str().unwrap(), "talk").unwrap();

    assert!(report.succeeded());
    assert!(!report.keyframes.is_empty());
    assert!(report.stats.samples_taken > 0);
    assert_eq!(report.document, Some(out.join("talk_notes.pdf")));
    assert!(out.join("talk_notes.pdf").is_file());
    assert!(out.join("talk_slides").join("slide_001.png").is_file());
    // local inputs are never removed
    assert!(video.is_file());
}
