use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use rollcall_core::{
    session, trainer, CaptureError, EnrollConfig, EnrollEvent, FrameBuf, FrameSource,
    IdentityRecord, OnnxFaceLocalizer, SampleStore,
};
use rollcall_hw::{Camera, CameraStream};
use std::sync::atomic::{AtomicBool, Ordering};

mod config;
use config::Config;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[derive(Parser)]
#[command(name = "rollcall", about = "Face-recognition attendance for the classroom")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a student: capture face samples from the camera
    Enroll {
        /// Roll number (e.g., "042")
        roll: String,
        /// Student name
        name: String,
    },
    /// Train the appearance model on all enrolled samples
    Train,
    /// Run a live attendance session until interrupted
    Attend {
        /// Stop after this many frames (0 = run until Ctrl-C)
        #[arg(long, default_value_t = 0)]
        max_frames: u64,
    },
    /// List enrolled identities and their sample counts
    List,
    /// List available camera devices
    Devices,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    install_sigint_handler()?;

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Enroll { roll, name } => cmd_enroll(&config, &roll, &name),
        Commands::Train => cmd_train(&config),
        Commands::Attend { max_frames } => cmd_attend(&config, max_frames),
        Commands::List => cmd_list(&config),
        Commands::Devices => cmd_devices(),
    }
}

extern "C" fn on_sigint(_: i32) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

fn install_sigint_handler() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_sigint),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe { signal::sigaction(Signal::SIGINT, &action) }
        .context("failed to install SIGINT handler")?;
    Ok(())
}

fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Adapts the camera stream to the session's frame source. Dark frames are
/// reported as transient capture failures so the session retries.
struct CameraSource<'a> {
    stream: CameraStream<'a>,
}

impl FrameSource for CameraSource<'_> {
    fn next_frame(&mut self) -> Result<FrameBuf, CaptureError> {
        let frame = self
            .stream
            .next_frame()
            .map_err(|e| CaptureError::Failed(e.to_string()))?;
        if frame.is_dark {
            return Err(CaptureError::Failed("dark frame, no usable texture".into()));
        }
        Ok(FrameBuf {
            data: frame.data,
            width: frame.width,
            height: frame.height,
        })
    }
}

fn cmd_enroll(config: &Config, roll: &str, name: &str) -> Result<()> {
    let identity = IdentityRecord::new(roll, name);
    let store = SampleStore::open(config.samples_dir())?;

    let camera = Camera::open(&config.camera_device)
        .with_context(|| format!("cannot open camera {}", config.camera_device))?;
    let mut source = CameraSource {
        stream: camera.start()?,
    };
    let mut localizer = OnnxFaceLocalizer::load(
        &config.detector_model.to_string_lossy(),
        config.localizer_config(),
    )?;

    let enroll_config = EnrollConfig {
        target_samples: config.target_samples,
        min_samples: config.min_samples,
        capture_policy: config.capture_policy,
    };

    println!(
        "Enrolling {} ({}). Capturing every {} frames, target {} samples. Ctrl-C to stop.",
        name, roll, config.capture_interval, config.target_samples
    );

    let interval = config.capture_interval.max(1);
    let mut frame_counter = 0u32;
    let total = session::run_enrollment(
        &mut source,
        &mut localizer,
        &store,
        &identity,
        &enroll_config,
        |_| {
            frame_counter += 1;
            frame_counter % interval == 0
        },
        interrupted,
        |event| match event {
            EnrollEvent::NoFaceDetected => println!("No face detected. Try again."),
            EnrollEvent::MultiFaceCapture { faces } => println!(
                "Warning: {faces} faces in this capture. Make sure only the student is in frame."
            ),
            EnrollEvent::Stored { index, total } => {
                println!("Saved sample {index} ({total}/{})", config.target_samples)
            }
        },
    )?;

    if total < config.min_samples {
        println!(
            "{name} has only {total} samples; capture at least {} before training.",
            config.min_samples
        );
    } else {
        println!("Student {name} registered with {total} samples.");
    }
    Ok(())
}

fn cmd_train(config: &Config) -> Result<()> {
    let store = SampleStore::open(config.samples_dir())?;
    let pair = trainer::train(&store).context("training failed")?;
    trainer::persist(&pair, &config.model_path(), &config.registry_path())?;

    println!(
        "Trained on {} samples across {} identities:",
        pair.model().len(),
        pair.registry().len()
    );
    for (label, group) in pair.registry().iter() {
        println!("  [{label}] {group}");
    }
    println!("Model saved to {}", config.model_path().display());
    Ok(())
}

fn cmd_attend(config: &Config, max_frames: u64) -> Result<()> {
    let pair = trainer::load_pair(&config.model_path(), &config.registry_path())
        .context("cannot load trained artifacts; run `rollcall train` first")?;

    let camera = Camera::open(&config.camera_device)
        .with_context(|| format!("cannot open camera {}", config.camera_device))?;
    let mut source = CameraSource {
        stream: camera.start()?,
    };
    let mut localizer = OnnxFaceLocalizer::load(
        &config.detector_model.to_string_lossy(),
        config.localizer_config(),
    )?;

    println!("Starting recognition. Press Ctrl-C to finish the session.");

    let mut frames_seen = 0u64;
    let attendance = session::run_attendance(
        &mut source,
        &mut localizer,
        &pair,
        &config.session_config(),
        || {
            frames_seen += 1;
            interrupted() || (max_frames > 0 && frames_seen >= max_frames)
        },
        |sighting| {
            let mark = if sighting.accepted { "present" } else { "below threshold" };
            println!(
                "{} ({:.0}) [{mark}]",
                sighting.identity.name, sighting.classification.distance
            );
        },
    );

    println!("\nAttendance:");
    if attendance.is_empty() {
        println!("  (nobody recognized)");
    }
    for entry in attendance.snapshot() {
        println!(
            "  {} {} - {}",
            entry.identity.roll_number,
            entry.identity.name,
            entry.marked_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

fn cmd_list(config: &Config) -> Result<()> {
    let store = SampleStore::open(config.samples_dir())?;
    let groups = store.groups()?;
    if groups.is_empty() {
        println!("No students enrolled.");
        return Ok(());
    }
    for group in groups {
        let identity = IdentityRecord::from_group_key(&group);
        let count = store.sample_count(&identity)?;
        let note = if count < config.min_samples {
            " (below trainable minimum)"
        } else {
            ""
        };
        println!("{group}: {count} samples{note}");
    }
    Ok(())
}

fn cmd_devices() -> Result<()> {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No video capture devices found.");
        return Ok(());
    }
    for dev in devices {
        println!("{}: {} ({})", dev.path, dev.name, dev.driver);
    }
    Ok(())
}
