//! The attendance recognition pipeline.
//!
//! Enrollment captures normalized face samples into the sample store, the
//! trainer builds an LBPH appearance model plus identity registry as a
//! matched pair, and the recognition session classifies live frames against
//! that pair into a deduplicated attendance set.

pub mod aggregator;
pub mod detector;
pub mod lbph;
pub mod localizer;
pub mod normalize;
pub mod registry;
pub mod session;
pub mod store;
pub mod trainer;
pub mod types;

pub use aggregator::{AttendanceAggregator, AttendanceEntry};
pub use detector::OnnxFaceLocalizer;
pub use lbph::AppearanceModel;
pub use localizer::{FaceLocalizer, LocalizerConfig, LocalizerError, StaticLocalizer};
pub use registry::IdentityRegistry;
pub use session::{
    CaptureError, CapturePolicy, EnrollConfig, EnrollEvent, FrameBuf, FrameSource, SessionConfig,
    Sighting,
};
pub use store::SampleStore;
pub use trainer::{TrainError, TrainedPair};
pub use types::{
    BoundingBox, Classification, FaceSample, IdentityRecord, LabelId, CANONICAL_HEIGHT,
    CANONICAL_WIDTH,
};
