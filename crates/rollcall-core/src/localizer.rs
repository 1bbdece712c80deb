//! Face localizer abstraction.
//!
//! Detection internals are deliberately behind a trait so sessions can run
//! against a deterministic stub in tests instead of a live camera and model.

use crate::types::BoundingBox;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocalizerError {
    #[error("detector model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Detection sensitivity knobs, recognized across localizer implementations.
/// Defaults follow the classroom tool this replaces.
#[derive(Debug, Clone, Copy)]
pub struct LocalizerConfig {
    /// Downsampling step between detection passes, for implementations that
    /// scan an image pyramid.
    pub scale_factor: f32,
    /// Corroborating raw candidates required to accept a box.
    pub min_neighbors: u32,
    /// Smallest acceptable face box edge, in pixels.
    pub min_size: u32,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_size: 100,
        }
    }
}

/// Returns zero or more face bounding boxes for a grayscale frame, all lying
/// within the frame bounds.
pub trait FaceLocalizer {
    fn detect(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, LocalizerError>;
}

/// Scripted localizer for tests: returns one prepared box list per call.
pub struct StaticLocalizer {
    frames: Vec<Vec<BoundingBox>>,
    cursor: usize,
    repeat_last: bool,
}

impl StaticLocalizer {
    /// Return the same boxes on every call.
    pub fn fixed(boxes: Vec<BoundingBox>) -> Self {
        Self {
            frames: vec![boxes],
            cursor: 0,
            repeat_last: true,
        }
    }

    /// Return each prepared list once, in order, then empty lists.
    pub fn script(frames: Vec<Vec<BoundingBox>>) -> Self {
        Self {
            frames,
            cursor: 0,
            repeat_last: false,
        }
    }
}

impl FaceLocalizer for StaticLocalizer {
    fn detect(
        &mut self,
        _frame: &[u8],
        _width: u32,
        _height: u32,
    ) -> Result<Vec<BoundingBox>, LocalizerError> {
        if self.cursor >= self.frames.len() {
            if self.repeat_last {
                self.cursor = self.frames.len().saturating_sub(1);
            } else {
                return Ok(Vec::new());
            }
        }
        let boxes = self.frames[self.cursor].clone();
        self.cursor += 1;
        Ok(boxes)
    }
}
