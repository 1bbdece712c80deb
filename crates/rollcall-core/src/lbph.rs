//! LBPH appearance model: local binary pattern histograms with
//! nearest-neighbor chi-square classification.
//!
//! Each sample is encoded as a grid of normalized 256-bin LBP histograms
//! (radius 1, 8 neighbors, 8×8 grid). Classification scans every training
//! entry and returns the label of the nearest histogram under chi-square
//! distance. Lower distance = stronger match; the scale is unbounded above.

use crate::types::{Classification, FaceSample, LabelId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const LBP_GRID_X: usize = 8;
const LBP_GRID_Y: usize = 8;
const LBP_BINS: usize = 256;

/// 8-neighbor offsets at radius 1, clockwise from the top-left. The bit order
/// is fixed so encodings stay comparable across training runs.
const LBP_NEIGHBORS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
];

/// One training sample's spatial histogram, tagged with its label.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelEntry {
    label: LabelId,
    histogram: Vec<f32>,
}

/// Trained appearance model. Opaque beyond [`classify`](Self::classify);
/// always produced and persisted together with the identity registry of the
/// same training generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppearanceModel {
    generation: Uuid,
    entries: Vec<ModelEntry>,
}

impl AppearanceModel {
    /// Fit the model on the full labeled sample set. Batch-only: any change
    /// to the sample set requires a full retrain.
    pub(crate) fn fit(samples: &[(LabelId, FaceSample)], generation: Uuid) -> Self {
        let entries = samples
            .iter()
            .map(|(label, sample)| ModelEntry {
                label: *label,
                histogram: spatial_histogram(sample),
            })
            .collect::<Vec<_>>();
        tracing::info!(samples = entries.len(), %generation, "fitted LBPH model");
        Self {
            generation,
            entries,
        }
    }

    /// Training-generation token shared with the matching identity registry.
    pub fn generation(&self) -> Uuid {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nearest-match classification.
    ///
    /// Deterministic: the full entry list is scanned in storage order and the
    /// first strict minimum wins, so an unchanged model always returns the
    /// identical `(label, distance)` pair for the same input.
    pub fn classify(&self, sample: &FaceSample) -> Classification {
        let probe = spatial_histogram(sample);

        let mut best_label: LabelId = 0;
        let mut best_distance = f32::INFINITY;
        for entry in &self.entries {
            let d = chi_square(&probe, &entry.histogram);
            if d < best_distance {
                best_distance = d;
                best_label = entry.label;
            }
        }

        Classification {
            label: best_label,
            distance: best_distance,
        }
    }
}

/// Encode the interior pixels of a sample as LBP codes.
///
/// Each interior pixel becomes an 8-bit code: one bit per neighbor, set when
/// the neighbor is at least as bright as the center. Border pixels have no
/// full neighborhood and are skipped, so the code image is (w-2)×(h-2).
fn lbp_codes(sample: &FaceSample) -> (Vec<u8>, usize, usize) {
    let w = sample.width as usize;
    let h = sample.height as usize;
    if w < 3 || h < 3 {
        return (Vec::new(), 0, 0);
    }

    let cw = w - 2;
    let ch = h - 2;
    let mut codes = vec![0u8; cw * ch];

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = sample.pixels[y * w + x];
            let mut code = 0u8;
            for (bit, (dy, dx)) in LBP_NEIGHBORS.iter().enumerate() {
                let ny = (y as i32 + dy) as usize;
                let nx = (x as i32 + dx) as usize;
                if sample.pixels[ny * w + nx] >= center {
                    code |= 1 << bit;
                }
            }
            codes[(y - 1) * cw + (x - 1)] = code;
        }
    }

    (codes, cw, ch)
}

/// Concatenated per-cell LBP histograms over an 8×8 grid, each cell
/// normalized to sum 1 so samples of differing legacy sizes stay comparable.
fn spatial_histogram(sample: &FaceSample) -> Vec<f32> {
    let (codes, cw, ch) = lbp_codes(sample);
    let mut feature = vec![0f32; LBP_GRID_X * LBP_GRID_Y * LBP_BINS];

    let cell_w = cw / LBP_GRID_X;
    let cell_h = ch / LBP_GRID_Y;
    if cell_w == 0 || cell_h == 0 {
        return feature;
    }
    let cell_pixels = (cell_w * cell_h) as f32;

    for gy in 0..LBP_GRID_Y {
        for gx in 0..LBP_GRID_X {
            let base = (gy * LBP_GRID_X + gx) * LBP_BINS;
            let y0 = gy * cell_h;
            let x0 = gx * cell_w;
            for y in y0..y0 + cell_h {
                for x in x0..x0 + cell_w {
                    feature[base + codes[y * cw + x] as usize] += 1.0;
                }
            }
            for bin in &mut feature[base..base + LBP_BINS] {
                *bin /= cell_pixels;
            }
        }
    }

    feature
}

/// Chi-square distance between two histograms of equal length.
pub(crate) fn chi_square(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&p, &q)| {
            let sum = p + q;
            if sum > 0.0 {
                (p - q) * (p - q) / sum
            } else {
                0.0
            }
        })
        .sum()
}
