//! Keyframe persistence
//!
//! Every run writes into `<output_root>/<content_name>_slides/`. Content-aware
//! keyframes are `slide_NNN.png`, fallback additions `slide_fb_NNN.png`, so a
//! lexicographic sort of the file names restores selection order.

use std::path::{Path, PathBuf};
use opencv::{core::{Mat, Vector}, imgcodecs};
use tracing::{debug, instrument};
use crate::{
    common::{KeyframeError, Result},
    keyframe::KeyframeOrigin,
};

/// File name of the keyframe with the given numbering
pub fn slide_file_name(origin: KeyframeOrigin, sequence_index: u32) -> String {
    match origin {
        KeyframeOrigin::ContentAware => format!("slide_{:03}.png", sequence_index),
        KeyframeOrigin::Fallback => format!("slide_fb_{:03}.png", sequence_index),
    }
}

/// Where keyframe images end up
pub trait KeyframeStore {
    /// Stable reference for the keyframe with the given numbering
    fn reference_for(&self, origin: KeyframeOrigin, sequence_index: u32) -> PathBuf;

    /// Write (or overwrite) the image stored at `reference`
    fn write(&mut self, reference: &Path, image: &Mat) -> Result<()>;
}

/// Writes PNG files into a per-run slides directory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    /// Create (if needed) `<output_root>/<content_name>_slides`
    #[instrument]
    pub fn create(output_root: &Path, content_name: &str) -> Result<Self> {
        let dir = output_root.join(format!("{}_slides", content_name));
        std::fs::create_dir_all(&dir)?;
        debug!("Keyframes will be written to {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl KeyframeStore for DirectoryStore {
    fn reference_for(&self, origin: KeyframeOrigin, sequence_index: u32) -> PathBuf {
        self.dir.join(slide_file_name(origin, sequence_index))
    }

    fn write(&mut self, reference: &Path, image: &Mat) -> Result<()> {
        let path = reference.to_str()
            .ok_or_else(|| KeyframeError::persist_error(reference, "path is not valid UTF-8"))?;

        let written = imgcodecs::imwrite(path, image, &Vector::<i32>::new())
            .map_err(|e| KeyframeError::persist_error(reference, e.to_string()))?;
        if !written {
            return Err(KeyframeError::persist_error(reference, "image encoder reported failure"));
        }

        debug!("Wrote keyframe {}", reference.display());
        Ok(())
    }
}
