//! On-disk sample store: one directory per identity, sequentially numbered
//! grayscale PNGs at canonical resolution. Append-only: indices continue
//! across enrollment sessions and prior samples are never overwritten.

use crate::types::{FaceSample, IdentityRecord};
use image::GrayImage;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sample image: {0}")]
    Image(#[from] image::ImageError),
    #[error("sample buffer does not match its dimensions")]
    MalformedSample,
}

/// Handle on the sample directory tree.
pub struct SampleStore {
    root: PathBuf,
}

impl SampleStore {
    /// Open (creating if needed) the store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn group_dir(&self, group_key: &str) -> PathBuf {
        self.root.join(group_key)
    }

    /// Append a sample to the identity's group, returning its index.
    ///
    /// The index continues from the highest existing one, so repeated
    /// enrollment sessions for the same identity never clobber old samples.
    pub fn add_sample(
        &self,
        identity: &IdentityRecord,
        sample: &FaceSample,
    ) -> Result<u32, StoreError> {
        let dir = self.group_dir(&identity.group_key());
        fs::create_dir_all(&dir)?;

        let index = next_index(&dir)?;
        let img = GrayImage::from_raw(sample.width, sample.height, sample.pixels.clone())
            .ok_or(StoreError::MalformedSample)?;
        let path = dir.join(format!("{index}.png"));
        img.save(&path)?;
        tracing::debug!(path = %path.display(), "stored face sample");
        Ok(index)
    }

    /// Number of samples stored for an identity. Zero when the group does
    /// not exist yet.
    pub fn sample_count(&self, identity: &IdentityRecord) -> Result<u32, StoreError> {
        let dir = self.group_dir(&identity.group_key());
        if !dir.exists() {
            return Ok(0);
        }
        Ok(sample_files(&dir)?.len() as u32)
    }

    /// Enumerate identity groups in lexicographic order, skipping groups
    /// that hold no samples (an empty group must never earn a label).
    pub fn groups(&self) -> Result<Vec<String>, StoreError> {
        let mut groups = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            if sample_files(&entry.path())?.is_empty() {
                tracing::warn!(group = %name, "skipping identity group with no samples");
                continue;
            }
            groups.push(name);
        }
        groups.sort();
        Ok(groups)
    }

    /// Load every sample of a group, ordered by index.
    pub fn samples(&self, group_key: &str) -> Result<Vec<FaceSample>, StoreError> {
        let mut files = sample_files(&self.group_dir(group_key))?;
        files.sort_by_key(|(index, _)| *index);

        let mut samples = Vec::with_capacity(files.len());
        for (_, path) in files {
            let img = image::open(&path)?.to_luma8();
            samples.push(FaceSample::new(img.width(), img.height(), img.into_raw()));
        }
        Ok(samples)
    }
}

/// Numbered `<index>.png` files within a group directory.
fn sample_files(dir: &Path) -> Result<Vec<(u32, PathBuf)>, StoreError> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("png") {
            continue;
        }
        let Some(index) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u32>().ok())
        else {
            continue;
        };
        files.push((index, path));
    }
    Ok(files)
}

fn next_index(dir: &Path) -> Result<u32, StoreError> {
    Ok(sample_files(dir)?
        .iter()
        .map(|(index, _)| index + 1)
        .max()
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CANONICAL_HEIGHT, CANONICAL_WIDTH};

    fn flat_sample(value: u8) -> FaceSample {
        FaceSample::new(
            CANONICAL_WIDTH,
            CANONICAL_HEIGHT,
            vec![value; (CANONICAL_WIDTH * CANONICAL_HEIGHT) as usize],
        )
    }

    #[test]
    fn test_add_sample_sequential_indices() {
        let dir = tempfile::tempdir().unwrap();
        let store = SampleStore::open(dir.path()).unwrap();
        let dana = IdentityRecord::new("042", "Dana");

        assert_eq!(store.add_sample(&dana, &flat_sample(10)).unwrap(), 0);
        assert_eq!(store.add_sample(&dana, &flat_sample(20)).unwrap(), 1);
        assert_eq!(store.sample_count(&dana).unwrap(), 2);
    }

    #[test]
    fn test_indices_continue_across_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let dana = IdentityRecord::new("042", "Dana");
        {
            let store = SampleStore::open(dir.path()).unwrap();
            store.add_sample(&dana, &flat_sample(10)).unwrap();
            store.add_sample(&dana, &flat_sample(20)).unwrap();
        }
        // Re-open: the next enrollment session must append, not reset.
        let store = SampleStore::open(dir.path()).unwrap();
        assert_eq!(store.add_sample(&dana, &flat_sample(30)).unwrap(), 2);
        assert_eq!(store.sample_count(&dana).unwrap(), 3);
    }

    #[test]
    fn test_groups_sorted_and_skip_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SampleStore::open(dir.path()).unwrap();
        store
            .add_sample(&IdentityRecord::new("002", "Bob"), &flat_sample(1))
            .unwrap();
        store
            .add_sample(&IdentityRecord::new("001", "Alice"), &flat_sample(2))
            .unwrap();
        // A directory with no samples must not become a group.
        std::fs::create_dir(dir.path().join("000_Ghost")).unwrap();

        assert_eq!(store.groups().unwrap(), vec!["001_Alice", "002_Bob"]);
    }

    #[test]
    fn test_sample_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SampleStore::open(dir.path()).unwrap();
        let alice = IdentityRecord::new("001", "Alice");

        let original = FaceSample::new(
            CANONICAL_WIDTH,
            CANONICAL_HEIGHT,
            (0..CANONICAL_WIDTH * CANONICAL_HEIGHT)
                .map(|i| (i % 256) as u8)
                .collect(),
        );
        store.add_sample(&alice, &original).unwrap();

        let loaded = store.samples("001_Alice").unwrap();
        assert_eq!(loaded.len(), 1);
        // PNG is lossless: pixels survive exactly.
        assert_eq!(loaded[0], original);
    }

    #[test]
    fn test_missing_group_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SampleStore::open(dir.path()).unwrap();
        assert!(store.samples("999_Nobody").unwrap().is_empty());
        assert_eq!(
            store
                .sample_count(&IdentityRecord::new("999", "Nobody"))
                .unwrap(),
            0
        );
    }
}
