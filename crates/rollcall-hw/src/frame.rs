//! Frame type and raw-buffer conversions: YUYV/Y16 to grayscale, plus
//! dark-frame screening.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("buffer too short: expected {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },
}

/// A captured grayscale camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data, `width * height` bytes.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
    /// Set when the frame failed the dark screen and should be skipped.
    pub is_dark: bool,
}

/// Convert packed YUYV (4:2:2) to grayscale by extracting the Y channel.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; grayscale is every
/// even-indexed byte.
pub fn yuyv_to_grayscale(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::BufferTooShort {
            expected,
            actual: yuyv.len(),
        });
    }
    Ok(yuyv[..expected].iter().step_by(2).copied().collect())
}

/// Convert 16-bit little-endian grayscale to 8-bit by keeping the high byte.
pub fn y16_to_grayscale(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = (width * height) as usize;
    let expected = pixels * 2;
    if buf.len() < expected {
        return Err(FrameError::BufferTooShort {
            expected,
            actual: buf.len(),
        });
    }
    Ok((0..pixels).map(|i| buf[i * 2 + 1]).collect())
}

/// True when more than `threshold_pct` of pixels fall in the darkest bucket
/// (0–31). Such frames carry no usable face texture.
pub fn is_dark_frame(gray: &[u8], threshold_pct: f32) -> bool {
    if gray.is_empty() {
        return true;
    }
    let dark_count = gray.iter().filter(|&&p| p < 32).count();
    (dark_count as f32 / gray.len() as f32) > threshold_pct
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_grayscale() {
        // 2x1 image: [Y0=100, U=128, Y1=200, V=128]
        let yuyv = vec![100, 128, 200, 128];
        let gray = yuyv_to_grayscale(&yuyv, 2, 1).unwrap();
        assert_eq!(gray, vec![100, 200]);
    }

    #[test]
    fn test_yuyv_too_short() {
        assert!(yuyv_to_grayscale(&[100, 128], 2, 1).is_err());
    }

    #[test]
    fn test_y16_keeps_high_byte() {
        // Two pixels, little-endian: 0x1234 and 0xFF00.
        let buf = vec![0x34, 0x12, 0x00, 0xFF];
        let gray = y16_to_grayscale(&buf, 2, 1).unwrap();
        assert_eq!(gray, vec![0x12, 0xFF]);
    }

    #[test]
    fn test_dark_frame_all_black() {
        assert!(is_dark_frame(&vec![0u8; 1000], 0.95));
    }

    #[test]
    fn test_dark_frame_normal() {
        assert!(!is_dark_frame(&vec![128u8; 1000], 0.95));
    }

    #[test]
    fn test_dark_frame_empty() {
        assert!(is_dark_frame(&[], 0.95));
    }

    #[test]
    fn test_dark_frame_borderline() {
        // 96% dark is dark, 94% dark is not.
        let mut mostly = vec![10u8; 960];
        mostly.extend(vec![128u8; 40]);
        assert!(is_dark_frame(&mostly, 0.95));

        let mut borderline = vec![10u8; 940];
        borderline.extend(vec![128u8; 60]);
        assert!(!is_dark_frame(&borderline, 0.95));
    }
}
