use serde::{Deserialize, Serialize};

/// Canonical width all face samples are normalized to before storage or
/// classification.
pub const CANONICAL_WIDTH: u32 = 200;
/// Canonical height all face samples are normalized to.
pub const CANONICAL_HEIGHT: u32 = 200;

/// Integer handle assigned to an identity for the lifetime of one trained
/// model generation. Dense and zero-based; recomputed on every training run.
pub type LabelId = u32;

/// Axis-aligned bounding box for a detected face.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// A registered student. Created at enrollment start, immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub roll_number: String,
    pub name: String,
}

impl IdentityRecord {
    pub fn new(roll_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            roll_number: roll_number.into(),
            name: name.into(),
        }
    }

    /// Sentinel for a label that cannot be resolved against the registry.
    pub fn unknown() -> Self {
        Self {
            roll_number: String::new(),
            name: "Unknown".to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.roll_number.is_empty()
    }

    /// Sample-group key for this identity: `"{rollNumber}_{name}"`.
    pub fn group_key(&self) -> String {
        format!("{}_{}", self.roll_number, self.name)
    }

    /// Parse a group key back into an identity. Keys are split at the first
    /// underscore; a key without one yields the unknown sentinel.
    pub fn from_group_key(key: &str) -> Self {
        match key.split_once('_') {
            Some((roll, name)) => Self::new(roll, name),
            None => Self::unknown(),
        }
    }
}

/// A normalized grayscale face crop at a known resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceSample {
    pub width: u32,
    pub height: u32,
    /// Row-major grayscale pixels, `width * height` bytes.
    pub pixels: Vec<u8>,
}

impl FaceSample {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn is_canonical(&self) -> bool {
        self.width == CANONICAL_WIDTH && self.height == CANONICAL_HEIGHT
    }
}

/// Result of classifying a face sample against a trained appearance model.
///
/// `distance` is a non-negative dissimilarity: lower means a stronger match.
/// The algorithm guarantees no fixed upper bound; accept/reject thresholding
/// is the caller's concern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: LabelId,
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_key_roundtrip() {
        let id = IdentityRecord::new("042", "Dana");
        assert_eq!(id.group_key(), "042_Dana");
        assert_eq!(IdentityRecord::from_group_key("042_Dana"), id);
    }

    #[test]
    fn test_group_key_name_with_underscore() {
        // Only the first underscore separates roll from name.
        let id = IdentityRecord::from_group_key("007_Mary_Jane");
        assert_eq!(id.roll_number, "007");
        assert_eq!(id.name, "Mary_Jane");
    }

    #[test]
    fn test_group_key_without_separator_is_unknown() {
        assert!(IdentityRecord::from_group_key("garbage").is_unknown());
    }

    #[test]
    fn test_unknown_sentinel() {
        let u = IdentityRecord::unknown();
        assert!(u.is_unknown());
        assert_eq!(u.name, "Unknown");
        assert!(!IdentityRecord::new("001", "Alice").is_unknown());
    }

    #[test]
    fn test_bbox_area_clamps_negative() {
        let b = BoundingBox {
            x: 0.0,
            y: 0.0,
            width: -5.0,
            height: 10.0,
            confidence: 1.0,
        };
        assert_eq!(b.area(), 0.0);
    }
}
