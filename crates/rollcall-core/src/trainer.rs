//! Builds the appearance model and identity registry from the sample store
//! as one batch operation, and persists them as a matched pair.

use crate::lbph::AppearanceModel;
use crate::normalize;
use crate::registry::IdentityRegistry;
use crate::store::{SampleStore, StoreError};
use crate::types::LabelId;
use std::fs;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("sample store holds no samples to train on")]
    EmptySampleStore,
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("artifact io: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact encoding: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("model generation {model} does not match registry generation {registry}; retrain to produce a matched pair")]
    RegistryModelMismatch { model: Uuid, registry: Uuid },
}

/// An appearance model and the identity registry from the same training run.
///
/// The fields are private so a pair can only come from [`train`] or
/// [`load_pair`], both of which guarantee the generations match.
#[derive(Debug)]
pub struct TrainedPair {
    model: AppearanceModel,
    registry: IdentityRegistry,
}

impl TrainedPair {
    pub fn model(&self) -> &AppearanceModel {
        &self.model
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }
}

/// Train on everything the store holds.
///
/// Groups are enumerated lexicographically and assigned dense labels
/// 0..N-1. Samples stored at a legacy resolution are re-normalized before
/// feature extraction. A store with no samples fails with
/// [`TrainError::EmptySampleStore`] and writes nothing.
pub fn train(store: &SampleStore) -> Result<TrainedPair, TrainError> {
    let groups = store.groups()?;
    if groups.is_empty() {
        return Err(TrainError::EmptySampleStore);
    }

    let generation = Uuid::new_v4();
    let mut labeled = Vec::new();
    for (label, group) in groups.iter().enumerate() {
        let samples = store.samples(group)?;
        tracing::info!(group = %group, label, samples = samples.len(), "training group");
        for sample in samples {
            labeled.push((label as LabelId, normalize::to_canonical(sample)));
        }
    }

    let model = AppearanceModel::fit(&labeled, generation);
    let registry = IdentityRegistry::from_groups(&groups, generation);
    Ok(TrainedPair { model, registry })
}

/// Persist both artifacts of a pair.
///
/// Each artifact is written to a temporary sibling file and renamed into
/// place only after both writes succeed, so a failure partway leaves any
/// previously persisted generation untouched.
pub fn persist(
    pair: &TrainedPair,
    model_path: &Path,
    registry_path: &Path,
) -> Result<(), TrainError> {
    let model_tmp = tmp_sibling(model_path);
    let registry_tmp = tmp_sibling(registry_path);

    write_json(&model_tmp, &pair.model)?;
    if let Err(e) = write_json(&registry_tmp, &pair.registry) {
        let _ = fs::remove_file(&model_tmp);
        return Err(e);
    }

    fs::rename(&model_tmp, model_path)?;
    fs::rename(&registry_tmp, registry_path)?;
    tracing::info!(
        model = %model_path.display(),
        registry = %registry_path.display(),
        generation = %pair.model.generation(),
        "persisted trained pair"
    );
    Ok(())
}

/// Load a persisted pair, verifying the two artifacts come from the same
/// training generation before any recognition can begin.
pub fn load_pair(model_path: &Path, registry_path: &Path) -> Result<TrainedPair, TrainError> {
    let model: AppearanceModel = read_json(model_path)?;
    let registry: IdentityRegistry = read_json(registry_path)?;

    if model.generation() != registry.generation() {
        return Err(TrainError::RegistryModelMismatch {
            model: model.generation(),
            registry: registry.generation(),
        });
    }

    tracing::info!(
        generation = %model.generation(),
        identities = registry.len(),
        samples = model.len(),
        "loaded trained pair"
    );
    Ok(TrainedPair { model, registry })
}

fn tmp_sibling(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), TrainError> {
    let file = fs::File::create(path)?;
    serde_json::to_writer(std::io::BufWriter::new(file), value)?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, TrainError> {
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}
