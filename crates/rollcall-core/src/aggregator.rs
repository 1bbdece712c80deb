//! The session-scoped set of identities confirmed present. At most one mark
//! per identity per session, no matter how many detections confirmed it.

use crate::types::IdentityRecord;
use chrono::{DateTime, Local};
use std::collections::BTreeMap;

/// One attendance mark: who, and when they were first accepted.
#[derive(Debug, Clone)]
pub struct AttendanceEntry {
    pub identity: IdentityRecord,
    pub marked_at: DateTime<Local>,
}

/// In-memory attendance set keyed by roll number.
#[derive(Debug, Default)]
pub struct AttendanceAggregator {
    entries: BTreeMap<String, AttendanceEntry>,
}

impl AttendanceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an identity present. Idempotent: repeat marks keep the first
    /// timestamp and return false.
    pub fn record(&mut self, identity: IdentityRecord) -> bool {
        if self.entries.contains_key(&identity.roll_number) {
            return false;
        }
        tracing::info!(roll = %identity.roll_number, name = %identity.name, "marked present");
        self.entries.insert(
            identity.roll_number.clone(),
            AttendanceEntry {
                identity,
                marked_at: Local::now(),
            },
        );
        true
    }

    pub fn contains(&self, roll_number: &str) -> bool {
        self.entries.contains_key(roll_number)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Final attendance set, ordered by roll number.
    pub fn snapshot(&self) -> Vec<AttendanceEntry> {
        self.entries.values().cloned().collect()
    }
}
