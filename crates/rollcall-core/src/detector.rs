//! SCRFD anchor-free face detection via ONNX Runtime, exposed through the
//! [`FaceLocalizer`] trait.

use crate::localizer::{FaceLocalizer, LocalizerConfig, LocalizerError};
use crate::normalize;
use crate::types::BoundingBox;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const DET_INPUT_SIZE: usize = 640;
const DET_MEAN: f32 = 127.5;
const DET_STD: f32 = 128.0;
const DET_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DET_NMS_THRESHOLD: f32 = 0.4;
const DET_STRIDES: [usize; 3] = [8, 16, 32];
const DET_ANCHORS_PER_CELL: usize = 2;

/// Metadata for coordinate de-mapping after letterbox resize.
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// A raw anchor decode carrying its corroboration count after NMS merging.
struct Candidate {
    bbox: BoundingBox,
    corroborators: u32,
}

/// Per-stride output tensor indices: (score_idx, bbox_idx).
type StrideOutputIndices = (usize, usize);

/// SCRFD-based face localizer.
pub struct OnnxFaceLocalizer {
    session: Session,
    config: LocalizerConfig,
    /// Per-stride output indices [(score, bbox)] for strides [8, 16, 32].
    /// Discovered by name at load time; falls back to positional ordering.
    stride_indices: [StrideOutputIndices; 3],
}

impl OnnxFaceLocalizer {
    /// Load the detection model from the given path.
    pub fn load(model_path: &str, config: LocalizerConfig) -> Result<Self, LocalizerError> {
        if !Path::new(model_path).exists() {
            return Err(LocalizerError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = model_path,
            outputs = ?output_names,
            min_size = config.min_size,
            min_neighbors = config.min_neighbors,
            "loaded face detection model"
        );

        if config.scale_factor != 1.0 {
            // Anchor-free detection covers all face scales in one pass over
            // three strides; there is no pyramid for this knob to step.
            tracing::debug!(
                scale_factor = config.scale_factor,
                "scale_factor is not used by the single-pass ONNX localizer"
            );
        }

        if output_names.len() < 6 {
            return Err(LocalizerError::InferenceFailed(format!(
                "detection model requires 6 outputs (3 strides × score/bbox), got {}",
                output_names.len()
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "detection output tensor mapping");

        Ok(Self {
            session,
            config,
            stride_indices,
        })
    }

    /// Preprocess a grayscale frame into a NCHW float tensor with letterbox
    /// padding, reusing the normalizer's bilinear resampler.
    fn preprocess(&self, frame: &[u8], width: usize, height: usize) -> (Array4<f32>, LetterboxInfo) {
        let scale_w = DET_INPUT_SIZE as f32 / width as f32;
        let scale_h = DET_INPUT_SIZE as f32 / height as f32;
        let scale = scale_w.min(scale_h);

        let new_w = (width as f32 * scale).round() as usize;
        let new_h = (height as f32 * scale).round() as usize;
        let pad_x = (DET_INPUT_SIZE - new_w) as f32 / 2.0;
        let pad_y = (DET_INPUT_SIZE - new_h) as f32 / 2.0;

        let resized = normalize::bilinear_resize(frame, width, height, new_w, new_h);

        let pad_x_start = pad_x.floor() as usize;
        let pad_y_start = pad_y.floor() as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, DET_INPUT_SIZE, DET_INPUT_SIZE));

        for y in 0..DET_INPUT_SIZE {
            for x in 0..DET_INPUT_SIZE {
                let pixel = if y >= pad_y_start
                    && y < pad_y_start + new_h
                    && x >= pad_x_start
                    && x < pad_x_start + new_w
                {
                    resized[(y - pad_y_start) * new_w + (x - pad_x_start)] as f32
                } else {
                    DET_MEAN // pad value normalizes to 0.0
                };

                let normalized = (pixel - DET_MEAN) / DET_STD;
                // Grayscale → 3-channel: replicate Y across R, G, B.
                tensor[[0, 0, y, x]] = normalized;
                tensor[[0, 1, y, x]] = normalized;
                tensor[[0, 2, y, x]] = normalized;
            }
        }

        (tensor, LetterboxInfo { scale, pad_x, pad_y })
    }
}

impl FaceLocalizer for OnnxFaceLocalizer {
    /// Detect faces in a grayscale frame.
    ///
    /// Raw anchor decodes are merged by NMS; a merged box survives only if
    /// at least `min_neighbors` raw candidates corroborated it and both its
    /// edges reach `min_size`. Returned boxes are clamped to the frame and
    /// sorted by confidence.
    fn detect(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, LocalizerError> {
        let (input, letterbox) = self.preprocess(frame, width as usize, height as usize);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut raw = Vec::new();
        for (stride_pos, &stride) in DET_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx) = self.stride_indices[stride_pos];

            let (_, scores) = outputs[score_idx].try_extract_tensor::<f32>().map_err(|e| {
                LocalizerError::InferenceFailed(format!("scores stride {stride}: {e}"))
            })?;
            let (_, bboxes) = outputs[bbox_idx].try_extract_tensor::<f32>().map_err(|e| {
                LocalizerError::InferenceFailed(format!("bboxes stride {stride}: {e}"))
            })?;

            raw.extend(decode_stride(scores, bboxes, stride, &letterbox));
        }

        let merged = nms(raw, DET_NMS_THRESHOLD);
        let min_size = self.config.min_size as f32;

        let mut result: Vec<BoundingBox> = merged
            .into_iter()
            .filter(|c| c.corroborators >= self.config.min_neighbors)
            .map(|c| clamp_to_frame(c.bbox, width as f32, height as f32))
            .filter(|b| b.width >= min_size && b.height >= min_size)
            .collect();

        result.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(result)
    }
}

/// Discover output tensor ordering by name.
///
/// SCRFD exports may name tensors "score_8", "bbox_16", ... or use generic
/// numeric names. When names are not recognized, falls back to the standard
/// positional ordering: [0-2] = scores, [3-5] = bboxes (strides 8, 16, 32).
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let named = DET_STRIDES
        .iter()
        .all(|&stride| find("score", stride).is_some() && find("bbox", stride).is_some());

    if named {
        std::array::from_fn(|i| {
            let stride = DET_STRIDES[i];
            // `named` checked every lookup above.
            (
                find("score", stride).unwrap_or(i),
                find("bbox", stride).unwrap_or(i + 3),
            )
        })
    } else {
        tracing::info!(
            ?names,
            "detection output names not recognized, using positional mapping [0-2]=scores, [3-5]=bboxes"
        );
        [(0, 3), (1, 4), (2, 5)]
    }
}

/// Decode detections for a single stride level and map them back from the
/// letterboxed space into original frame coordinates.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    stride: usize,
    letterbox: &LetterboxInfo,
) -> Vec<BoundingBox> {
    let grid = DET_INPUT_SIZE / stride;
    let num_anchors = grid * grid * DET_ANCHORS_PER_CELL;

    let mut detections = Vec::new();
    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= DET_CONFIDENCE_THRESHOLD {
            continue;
        }

        let anchor_idx = idx / DET_ANCHORS_PER_CELL;
        let anchor_cx = (anchor_idx % grid) as f32 * stride as f32;
        let anchor_cy = (anchor_idx / grid) as f32 * stride as f32;

        let off = idx * 4;
        if off + 3 >= bboxes.len() {
            continue;
        }
        let x1 = anchor_cx - bboxes[off] * stride as f32;
        let y1 = anchor_cy - bboxes[off + 1] * stride as f32;
        let x2 = anchor_cx + bboxes[off + 2] * stride as f32;
        let y2 = anchor_cy + bboxes[off + 3] * stride as f32;

        let orig_x1 = (x1 - letterbox.pad_x) / letterbox.scale;
        let orig_y1 = (y1 - letterbox.pad_y) / letterbox.scale;
        let orig_x2 = (x2 - letterbox.pad_x) / letterbox.scale;
        let orig_y2 = (y2 - letterbox.pad_y) / letterbox.scale;

        detections.push(BoundingBox {
            x: orig_x1,
            y: orig_y1,
            width: orig_x2 - orig_x1,
            height: orig_y2 - orig_y1,
            confidence: score,
        });
    }

    detections
}

/// Non-maximum suppression that also counts, for each kept box, how many raw
/// candidates (itself included) merged into it. The count feeds the
/// `min_neighbors` corroboration filter.
fn nms(mut detections: Vec<BoundingBox>, iou_threshold: f32) -> Vec<Candidate> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        let mut corroborators = 1u32;
        for j in (i + 1)..detections.len() {
            if suppressed[j] {
                continue;
            }
            if iou(&detections[i], &detections[j]) > iou_threshold {
                suppressed[j] = true;
                corroborators += 1;
            }
        }
        keep.push(Candidate {
            bbox: detections[i],
            corroborators,
        });
    }

    keep
}

fn clamp_to_frame(bbox: BoundingBox, width: f32, height: f32) -> BoundingBox {
    let x0 = bbox.x.clamp(0.0, width);
    let y0 = bbox.y.clamp(0.0, height);
    let x1 = (bbox.x + bbox.width).clamp(0.0, width);
    let y1 = (bbox.y + bbox.height).clamp(0.0, height);
    BoundingBox {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
        confidence: bbox.confidence,
    }
}

/// Intersection-over-union of two boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bbox(x: f32, y: f32, w: f32, h: f32, conf: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: w,
            height: h,
            confidence: conf,
        }
    }

    #[test]
    fn test_iou_identical() {
        let a = make_bbox(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = make_bbox(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = make_bbox(20.0, 20.0, 10.0, 10.0, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_nms_counts_corroborators() {
        let detections = vec![
            make_bbox(0.0, 0.0, 100.0, 100.0, 0.9),
            make_bbox(5.0, 5.0, 100.0, 100.0, 0.8),
            make_bbox(2.0, 2.0, 100.0, 100.0, 0.7),
            make_bbox(300.0, 300.0, 50.0, 50.0, 0.6),
        ];
        let kept = nms(detections, 0.4);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].corroborators, 3);
        assert_eq!(kept[1].corroborators, 1);
    }

    #[test]
    fn test_clamp_to_frame() {
        let b = clamp_to_frame(make_bbox(-10.0, 20.0, 100.0, 700.0, 0.9), 640.0, 480.0);
        assert_eq!(b.x, 0.0);
        assert_eq!(b.width, 90.0);
        assert_eq!(b.y + b.height, 480.0);
    }

    #[test]
    fn test_discover_output_indices_named() {
        let names: Vec<String> = [
            "score_8", "score_16", "score_32", "bbox_8", "bbox_16", "bbox_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let indices = discover_output_indices(&names);
        assert_eq!(indices, [(0, 3), (1, 4), (2, 5)]);
    }

    #[test]
    fn test_discover_output_indices_shuffled_named() {
        let names: Vec<String> = [
            "bbox_8", "score_8", "bbox_16", "score_16", "bbox_32", "score_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let indices = discover_output_indices(&names);
        assert_eq!(indices, [(1, 0), (3, 2), (5, 4)]);
    }

    #[test]
    fn test_discover_output_indices_positional_fallback() {
        let names: Vec<String> = (0..9).map(|i: usize| i.to_string()).collect();
        let indices = discover_output_indices(&names);
        assert_eq!(indices, [(0, 3), (1, 4), (2, 5)]);
    }

    #[test]
    fn test_decode_stride_maps_back_to_frame_space() {
        // One anchor above threshold at stride 32, grid position (1, 1),
        // letterboxed at half scale with no padding.
        let grid = DET_INPUT_SIZE / 32;
        let anchors = grid * grid * DET_ANCHORS_PER_CELL;
        let mut scores = vec![0.0f32; anchors];
        let mut bboxes = vec![0.0f32; anchors * 4];

        let idx = (grid + 1) * DET_ANCHORS_PER_CELL;
        scores[idx] = 0.9;
        // Offsets of one stride in every direction: a 64x64 box centered at
        // the anchor point (32, 32) in letterbox space.
        bboxes[idx * 4..idx * 4 + 4].copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);

        let letterbox = LetterboxInfo {
            scale: 0.5,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        let dets = decode_stride(&scores, &bboxes, 32, &letterbox);
        assert_eq!(dets.len(), 1);
        let d = &dets[0];
        assert!((d.x - 0.0).abs() < 1e-3);
        assert!((d.y - 0.0).abs() < 1e-3);
        assert!((d.width - 128.0).abs() < 1e-3);
        assert!((d.height - 128.0).abs() < 1e-3);
    }
}
