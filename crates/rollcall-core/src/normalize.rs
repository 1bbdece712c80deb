//! Sample normalization: crop a detected face region and resize it to the
//! canonical resolution so every stored or classified sample is comparable.

use crate::types::{BoundingBox, FaceSample, CANONICAL_HEIGHT, CANONICAL_WIDTH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("bounding box covers no pixels of the frame")]
    EmptyRegion,
}

/// Crop `bbox` out of a grayscale frame and resize the crop to the canonical
/// resolution.
///
/// The box is clamped to the frame bounds before cropping; a box that clamps
/// to zero area fails with [`NormalizeError::EmptyRegion`]. A crop already at
/// canonical size is returned bit-identically (no resampling pass).
pub fn normalize(
    frame: &[u8],
    width: u32,
    height: u32,
    bbox: &BoundingBox,
) -> Result<FaceSample, NormalizeError> {
    let x0 = (bbox.x.round() as i64).clamp(0, width as i64) as u32;
    let y0 = (bbox.y.round() as i64).clamp(0, height as i64) as u32;
    let x1 = ((bbox.x + bbox.width).round() as i64).clamp(0, width as i64) as u32;
    let y1 = ((bbox.y + bbox.height).round() as i64).clamp(0, height as i64) as u32;

    if x1 <= x0 || y1 <= y0 {
        return Err(NormalizeError::EmptyRegion);
    }

    let crop_w = x1 - x0;
    let crop_h = y1 - y0;
    let mut crop = Vec::with_capacity((crop_w * crop_h) as usize);
    for y in y0..y1 {
        let row = (y * width + x0) as usize;
        crop.extend_from_slice(&frame[row..row + crop_w as usize]);
    }

    Ok(to_canonical(FaceSample::new(crop_w, crop_h, crop)))
}

/// Resize a sample to the canonical resolution. Idempotent: a sample already
/// at canonical size passes through untouched.
pub fn to_canonical(sample: FaceSample) -> FaceSample {
    if sample.is_canonical() {
        return sample;
    }
    let pixels = bilinear_resize(
        &sample.pixels,
        sample.width as usize,
        sample.height as usize,
        CANONICAL_WIDTH as usize,
        CANONICAL_HEIGHT as usize,
    );
    FaceSample::new(CANONICAL_WIDTH, CANONICAL_HEIGHT, pixels)
}

/// Bilinear grayscale resize with pixel-center sampling.
pub(crate) fn bilinear_resize(
    src: &[u8],
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
) -> Vec<u8> {
    let scale_x = src_w as f32 / dst_w as f32;
    let scale_y = src_h as f32 / dst_h as f32;

    let mut dst = vec![0u8; dst_w * dst_h];
    for y in 0..dst_h {
        let src_y = (y as f32 + 0.5) * scale_y - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, src_h as i32 - 1) as usize;
        let y1 = (y0 + 1).min(src_h - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..dst_w {
            let src_x = (x as f32 + 0.5) * scale_x - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, src_w as i32 - 1) as usize;
            let x1 = (x0 + 1).min(src_w - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            let tl = src[y0 * src_w + x0] as f32;
            let tr = src[y0 * src_w + x1] as f32;
            let bl = src[y1 * src_w + x0] as f32;
            let br = src[y1 * src_w + x1] as f32;

            let val = tl * (1.0 - fx) * (1.0 - fy)
                + tr * fx * (1.0 - fy)
                + bl * (1.0 - fx) * fy
                + br * fx * fy;

            dst[y * dst_w + x] = val.round().clamp(0.0, 255.0) as u8;
        }
    }
    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(w: u32, h: u32) -> Vec<u8> {
        (0..w * h).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_normalize_outputs_canonical_size() {
        let frame = gradient_frame(640, 480);
        let bbox = BoundingBox {
            x: 100.0,
            y: 80.0,
            width: 120.0,
            height: 150.0,
            confidence: 0.9,
        };
        let sample = normalize(&frame, 640, 480, &bbox).unwrap();
        assert!(sample.is_canonical());
        assert_eq!(sample.pixels.len(), (CANONICAL_WIDTH * CANONICAL_HEIGHT) as usize);
    }

    #[test]
    fn test_normalize_canonical_crop_is_bit_identical() {
        // A 200x200 crop must come back untouched, not resampled.
        let frame = gradient_frame(400, 400);
        let bbox = BoundingBox {
            x: 50.0,
            y: 50.0,
            width: CANONICAL_WIDTH as f32,
            height: CANONICAL_HEIGHT as f32,
            confidence: 1.0,
        };
        let sample = normalize(&frame, 400, 400, &bbox).unwrap();

        let mut expected = Vec::new();
        for y in 50..50 + CANONICAL_HEIGHT as usize {
            expected.extend_from_slice(&frame[y * 400 + 50..y * 400 + 50 + CANONICAL_WIDTH as usize]);
        }
        assert_eq!(sample.pixels, expected);
    }

    #[test]
    fn test_to_canonical_idempotent() {
        let frame = gradient_frame(300, 300);
        let bbox = BoundingBox {
            x: 10.0,
            y: 10.0,
            width: 90.0,
            height: 90.0,
            confidence: 1.0,
        };
        let once = normalize(&frame, 300, 300, &bbox).unwrap();
        let twice = to_canonical(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_region() {
        let frame = gradient_frame(100, 100);
        let bbox = BoundingBox {
            x: 40.0,
            y: 40.0,
            width: 0.0,
            height: 20.0,
            confidence: 1.0,
        };
        assert!(matches!(
            normalize(&frame, 100, 100, &bbox),
            Err(NormalizeError::EmptyRegion)
        ));
    }

    #[test]
    fn test_box_fully_outside_frame_is_empty() {
        let frame = gradient_frame(100, 100);
        let bbox = BoundingBox {
            x: 150.0,
            y: 150.0,
            width: 50.0,
            height: 50.0,
            confidence: 1.0,
        };
        assert!(matches!(
            normalize(&frame, 100, 100, &bbox),
            Err(NormalizeError::EmptyRegion)
        ));
    }

    #[test]
    fn test_bilinear_uniform_stays_uniform() {
        let src = vec![128u8; 50 * 50];
        let dst = bilinear_resize(&src, 50, 50, 200, 200);
        assert!(dst.iter().all(|&p| p == 128));
    }
}
