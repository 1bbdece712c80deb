//! The synchronous enrollment and recognition session loops.
//!
//! Both loops are single-threaded and blocking: one frame is acquired,
//! processed inline, and only then is the next frame requested. Cancellation
//! is an injectable predicate polled once per iteration, so tests can run a
//! bounded number of iterations without hardware and an iteration in
//! progress always completes before the loop exits.

use crate::aggregator::AttendanceAggregator;
use crate::localizer::FaceLocalizer;
use crate::normalize::{self, NormalizeError};
use crate::store::{SampleStore, StoreError};
use crate::trainer::TrainedPair;
use crate::types::{BoundingBox, Classification, IdentityRecord};
use thiserror::Error;

/// A grayscale frame handed to the session loops.
#[derive(Debug, Clone)]
pub struct FrameBuf {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("frame capture failed: {0}")]
    Failed(String),
}

/// Blocking frame supplier. A failed read is transient: the session logs it
/// and retries on the next iteration, it is never fatal.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<FrameBuf, CaptureError>;
}

/// Recognition-session tunables.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Accept boundary on the classification distance. Lower thresholds
    /// trade missed marks for fewer false positives.
    pub confidence_threshold: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 80.0,
        }
    }
}

impl SessionConfig {
    /// Strict comparison: a distance exactly at the threshold is rejected.
    pub fn accepts(&self, distance: f32) -> bool {
        distance < self.confidence_threshold
    }
}

/// One classified face detection, accepted into attendance or not.
#[derive(Debug, Clone)]
pub struct Sighting {
    pub identity: IdentityRecord,
    pub classification: Classification,
    pub accepted: bool,
    pub bbox: BoundingBox,
}

/// Run a recognition session until the cancellation predicate fires.
///
/// Per frame: detect, normalize, classify, resolve, and aggregate. All
/// per-frame errors are recovered locally with a console-visible notice;
/// the loop only ends through cancellation. Returns the session's
/// attendance set.
pub fn run_attendance(
    source: &mut dyn FrameSource,
    localizer: &mut dyn FaceLocalizer,
    pair: &TrainedPair,
    config: &SessionConfig,
    mut cancel: impl FnMut() -> bool,
    mut observer: impl FnMut(&Sighting),
) -> AttendanceAggregator {
    tracing::debug!(
        identities = pair.registry().len(),
        threshold = config.confidence_threshold,
        "recognition session entering capture loop"
    );
    let mut attendance = AttendanceAggregator::new();

    loop {
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "frame capture failed, retrying");
                if cancel() {
                    break;
                }
                continue;
            }
        };

        match localizer.detect(&frame.data, frame.width, frame.height) {
            Err(e) => tracing::warn!(error = %e, "face detection failed for this frame"),
            Ok(boxes) => {
                for bbox in &boxes {
                    let sample =
                        match normalize::normalize(&frame.data, frame.width, frame.height, bbox) {
                            Ok(sample) => sample,
                            Err(NormalizeError::EmptyRegion) => {
                                tracing::debug!("skipping degenerate face box");
                                continue;
                            }
                        };

                    let classification = pair.model().classify(&sample);
                    let identity = pair.registry().resolve(classification.label);
                    // An unknown sentinel carries no roll number to mark.
                    let accepted = config.accepts(classification.distance) && !identity.is_unknown();
                    if accepted {
                        attendance.record(identity.clone());
                    }

                    observer(&Sighting {
                        identity,
                        classification,
                        accepted,
                        bbox: *bbox,
                    });
                }
            }
        }

        if cancel() {
            break;
        }
    }

    tracing::info!(present = attendance.len(), "recognition session terminated");
    attendance
}

/// What to store when one capture trigger finds several faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePolicy {
    /// Store every detected face as a sample of the enrolling identity.
    /// Matches the tool this replaces; can mix in bystanders, so operators
    /// are warned on each multi-face capture.
    AllFaces,
    /// Store only the largest detected face.
    LargestFace,
}

#[derive(Debug, Clone, Copy)]
pub struct EnrollConfig {
    /// Stop once the identity's group reaches this many samples.
    pub target_samples: u32,
    /// Below this the identity is not considered trainable yet.
    pub min_samples: u32,
    pub capture_policy: CapturePolicy,
}

impl Default for EnrollConfig {
    fn default() -> Self {
        Self {
            target_samples: 10,
            min_samples: 5,
            capture_policy: CapturePolicy::AllFaces,
        }
    }
}

/// Operator-facing enrollment progress events.
#[derive(Debug, Clone)]
pub enum EnrollEvent {
    /// A capture trigger fired but the frame held no detectable face;
    /// nothing was stored.
    NoFaceDetected,
    /// One trigger stored more than one face (AllFaces policy).
    MultiFaceCapture { faces: usize },
    /// A sample was stored at `index`; the group now holds `total`.
    Stored { index: u32, total: u32 },
}

/// Run an enrollment session for one identity.
///
/// Frames flow continuously; `trigger` decides which ones are capture
/// attempts. The loop ends when the group reaches the target count or the
/// cancellation predicate fires. Returns the group's final sample count.
/// Store failures are fatal: enrollment cannot proceed without the disk.
pub fn run_enrollment(
    source: &mut dyn FrameSource,
    localizer: &mut dyn FaceLocalizer,
    store: &SampleStore,
    identity: &IdentityRecord,
    config: &EnrollConfig,
    mut trigger: impl FnMut(&FrameBuf) -> bool,
    mut cancel: impl FnMut() -> bool,
    mut observer: impl FnMut(&EnrollEvent),
) -> Result<u32, StoreError> {
    let mut total = store.sample_count(identity)?;
    tracing::info!(
        group = %identity.group_key(),
        existing = total,
        target = config.target_samples,
        "enrollment session started"
    );

    while total < config.target_samples && !cancel() {
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "frame capture failed, retrying");
                continue;
            }
        };

        if !trigger(&frame) {
            continue;
        }

        let boxes = match localizer.detect(&frame.data, frame.width, frame.height) {
            Ok(boxes) => boxes,
            Err(e) => {
                tracing::warn!(error = %e, "face detection failed for this capture");
                continue;
            }
        };

        if boxes.is_empty() {
            observer(&EnrollEvent::NoFaceDetected);
            continue;
        }

        let chosen: Vec<BoundingBox> = match config.capture_policy {
            CapturePolicy::AllFaces => boxes,
            CapturePolicy::LargestFace => boxes
                .into_iter()
                .max_by(|a, b| {
                    a.area()
                        .partial_cmp(&b.area())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .into_iter()
                .collect(),
        };

        if chosen.len() > 1 {
            observer(&EnrollEvent::MultiFaceCapture {
                faces: chosen.len(),
            });
        }

        for bbox in &chosen {
            let sample = match normalize::normalize(&frame.data, frame.width, frame.height, bbox) {
                Ok(sample) => sample,
                Err(NormalizeError::EmptyRegion) => {
                    tracing::debug!("skipping degenerate face box");
                    continue;
                }
            };
            let index = store.add_sample(identity, &sample)?;
            total += 1;
            observer(&EnrollEvent::Stored { index, total });
        }
    }

    if total < config.min_samples {
        tracing::warn!(
            group = %identity.group_key(),
            samples = total,
            minimum = config.min_samples,
            "identity is below the minimum trainable sample count"
        );
    }
    Ok(total)
}
