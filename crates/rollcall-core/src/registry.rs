//! The label-to-identity mapping produced by a training run. Versioned
//! together with the appearance model of the same generation; the two must
//! never be mixed across training runs.

use crate::types::{IdentityRecord, LabelId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRegistry {
    generation: Uuid,
    entries: BTreeMap<LabelId, String>,
}

impl IdentityRegistry {
    /// Build the registry for one training run: dense zero-based labels in
    /// the given (already sorted) group order.
    pub(crate) fn from_groups(groups: &[String], generation: Uuid) -> Self {
        let entries = groups
            .iter()
            .enumerate()
            .map(|(label, key)| (label as LabelId, key.clone()))
            .collect();
        Self {
            generation,
            entries,
        }
    }

    /// Training-generation token shared with the matching appearance model.
    pub fn generation(&self) -> Uuid {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn group_key(&self, label: LabelId) -> Option<&str> {
        self.entries.get(&label).map(String::as_str)
    }

    /// Resolve a label to its identity. A label absent from the registry
    /// resolves to the `Unknown` sentinel, never an error.
    pub fn resolve(&self, label: LabelId) -> IdentityRecord {
        match self.entries.get(&label) {
            Some(key) => IdentityRecord::from_group_key(key),
            None => IdentityRecord::unknown(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (LabelId, &str)> {
        self.entries.iter().map(|(label, key)| (*label, key.as_str()))
    }
}
