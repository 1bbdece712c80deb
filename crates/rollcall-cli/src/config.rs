use rollcall_core::{CapturePolicy, LocalizerConfig, SessionConfig};
use std::path::PathBuf;

/// Tool configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Root directory for samples and trained artifacts.
    pub data_dir: PathBuf,
    /// Path to the ONNX face detection model.
    pub detector_model: PathBuf,
    /// Classification distance below which a face marks attendance.
    pub confidence_threshold: f32,
    /// Detection sensitivity knobs.
    pub scale_factor: f32,
    pub min_neighbors: u32,
    pub min_size: u32,
    /// Enrollment sample counts.
    pub target_samples: u32,
    pub min_samples: u32,
    /// What to store when one capture trigger finds several faces.
    pub capture_policy: CapturePolicy,
    /// Frames between automatic enrollment capture triggers.
    pub capture_interval: u32,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("ROLLCALL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| {
                        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                        PathBuf::from(home).join(".local/share")
                    })
                    .join("rollcall")
            });

        let detector_model = std::env::var("ROLLCALL_DETECTOR_MODEL")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("models/det_10g.onnx"));

        Self {
            camera_device: std::env::var("ROLLCALL_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            data_dir,
            detector_model,
            confidence_threshold: env_f32("ROLLCALL_CONFIDENCE_THRESHOLD", 80.0),
            scale_factor: env_f32("ROLLCALL_SCALE_FACTOR", 1.1),
            min_neighbors: env_u32("ROLLCALL_MIN_NEIGHBORS", 5),
            min_size: env_u32("ROLLCALL_MIN_SIZE", 100),
            target_samples: env_u32("ROLLCALL_TARGET_SAMPLES", 10),
            min_samples: env_u32("ROLLCALL_MIN_SAMPLES", 5),
            capture_policy: match std::env::var("ROLLCALL_CAPTURE_POLICY").as_deref() {
                Ok("largest") => CapturePolicy::LargestFace,
                _ => CapturePolicy::AllFaces,
            },
            capture_interval: env_u32("ROLLCALL_CAPTURE_INTERVAL", 15),
        }
    }

    pub fn samples_dir(&self) -> PathBuf {
        self.data_dir.join("samples")
    }

    pub fn model_path(&self) -> PathBuf {
        self.data_dir.join("model.json")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join("registry.json")
    }

    pub fn localizer_config(&self) -> LocalizerConfig {
        LocalizerConfig {
            scale_factor: self.scale_factor,
            min_neighbors: self.min_neighbors,
            min_size: self.min_size,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            confidence_threshold: self.confidence_threshold,
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
