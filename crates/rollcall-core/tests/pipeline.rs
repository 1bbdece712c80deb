//! End-to-end pipeline: enroll an identity from synthetic frames, train a
//! matched model/registry pair, persist and reload it, then run a
//! recognition session and check the attendance set.

use rollcall_core::{
    session, trainer, BoundingBox, CaptureError, EnrollConfig, FrameBuf, FrameSource,
    IdentityRecord, SampleStore, SessionConfig, StaticLocalizer, CANONICAL_HEIGHT, CANONICAL_WIDTH,
};

struct ScriptedCamera {
    frames: Vec<FrameBuf>,
    cursor: usize,
}

impl FrameSource for ScriptedCamera {
    fn next_frame(&mut self) -> Result<FrameBuf, CaptureError> {
        let frame = self
            .frames
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| CaptureError::Failed("no more frames".to_string()))?;
        self.cursor += 1;
        Ok(frame)
    }
}

/// A 400x300 frame with Dana's striped texture painted into a known region.
fn classroom_frame(phase: u32) -> FrameBuf {
    let (w, h) = (400u32, 300u32);
    let mut data = vec![128u8; (w * h) as usize];
    for y in 50..250u32 {
        for x in 100..300u32 {
            data[(y * w + x) as usize] = if (y - 50 + phase) % 8 < 4 { 220 } else { 30 };
        }
    }
    FrameBuf {
        data,
        width: w,
        height: h,
    }
}

fn dana_box() -> BoundingBox {
    BoundingBox {
        x: 100.0,
        y: 50.0,
        width: 200.0,
        height: 200.0,
        confidence: 0.97,
    }
}

fn frame_budget(mut iterations: u32) -> impl FnMut() -> bool {
    move || {
        iterations = iterations.saturating_sub(1);
        iterations == 0
    }
}

#[test]
fn enroll_train_recognize() {
    let dir = tempfile::tempdir().unwrap();
    let store = SampleStore::open(dir.path().join("samples")).unwrap();
    let dana = IdentityRecord::new("042", "Dana");

    // Enroll: ten captures of Dana from scripted camera frames.
    let mut camera = ScriptedCamera {
        frames: (0..10).map(classroom_frame).collect(),
        cursor: 0,
    };
    let mut localizer = StaticLocalizer::fixed(vec![dana_box()]);
    let mut stored = 0;
    let total = session::run_enrollment(
        &mut camera,
        &mut localizer,
        &store,
        &dana,
        &EnrollConfig::default(),
        |_| true,
        || false,
        |event| {
            if matches!(event, rollcall_core::EnrollEvent::Stored { .. }) {
                stored += 1;
            }
        },
    )
    .unwrap();
    assert_eq!(total, 10);
    assert_eq!(stored, 10);

    // Train and persist the matched pair, then reload it.
    let model_path = dir.path().join("model.json");
    let registry_path = dir.path().join("registry.json");
    let pair = trainer::train(&store).unwrap();
    trainer::persist(&pair, &model_path, &registry_path).unwrap();
    let pair = trainer::load_pair(&model_path, &registry_path).unwrap();

    assert_eq!(pair.registry().len(), 1);
    assert_eq!(pair.registry().group_key(0), Some("042_Dana"));

    // Recognize: three frames with Dana, one frame with no detectable face.
    let mut camera = ScriptedCamera {
        frames: vec![
            classroom_frame(1),
            classroom_frame(3),
            classroom_frame(5),
            classroom_frame(0),
        ],
        cursor: 0,
    };
    let mut localizer = StaticLocalizer::script(vec![
        vec![dana_box()],
        vec![dana_box()],
        vec![dana_box()],
        vec![],
    ]);

    let mut accepted_sightings = 0;
    let attendance = session::run_attendance(
        &mut camera,
        &mut localizer,
        &pair,
        &SessionConfig::default(),
        frame_budget(4),
        |sighting| {
            if sighting.accepted {
                accepted_sightings += 1;
                assert!(sighting.classification.distance < 80.0);
            }
        },
    );

    // Dana was sighted three times but marked present exactly once, and the
    // faceless frame did not halt the loop.
    assert!(accepted_sightings >= 1);
    let snapshot = attendance.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].identity.name, "Dana");
    assert_eq!(snapshot[0].identity.roll_number, "042");
}

#[test]
fn retraining_after_new_identity_reassigns_labels() {
    let dir = tempfile::tempdir().unwrap();
    let store = SampleStore::open(dir.path().join("samples")).unwrap();

    let flat = |v: u8| {
        rollcall_core::FaceSample::new(
            CANONICAL_WIDTH,
            CANONICAL_HEIGHT,
            vec![v; (CANONICAL_WIDTH * CANONICAL_HEIGHT) as usize],
        )
    };

    store
        .add_sample(&IdentityRecord::new("002", "Bob"), &flat(100))
        .unwrap();
    let first = trainer::train(&store).unwrap();
    assert_eq!(first.registry().group_key(0), Some("002_Bob"));

    // Adding a lexicographically earlier identity shifts Bob's label on the
    // next run: labels are ordinals, not stable handles.
    store
        .add_sample(&IdentityRecord::new("001", "Alice"), &flat(200))
        .unwrap();
    let second = trainer::train(&store).unwrap();
    assert_eq!(second.registry().group_key(0), Some("001_Alice"));
    assert_eq!(second.registry().group_key(1), Some("002_Bob"));
    assert_ne!(
        first.model().generation(),
        second.model().generation()
    );
}
