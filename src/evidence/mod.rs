//! Evidence events and the violation log.
//!
//! The log is the only durable memory of pipeline activity: an in-memory,
//! newest-first record of successfully uploaded violation evidence. It does
//! not survive a restart.

pub mod dispatch;
pub mod sink;

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

pub use dispatch::EvidenceDispatcher;
pub use sink::{EvidenceSink, HttpEvidenceSink, MemoryEvidenceSink};

/// Default number of events returned by a log query.
pub const DEFAULT_LOG_LIMIT: usize = 10;

/// One persisted violation record. Created only after the evidence image was
/// uploaded; immutable afterwards.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvidenceEvent {
    pub id: u64,
    /// Capture time of the offending frame, seconds since the Unix epoch.
    pub captured_at_epoch_s: u64,
    /// Evidence name, also used as the upload object name.
    pub name: String,
    /// Storage URL returned by the evidence sink.
    pub url: String,
}

/// Ordered, bounded-query, in-memory store of evidence events.
///
/// Append and delete are mutually exclusive under one mutex; readers get
/// snapshots. Newest entries first.
#[derive(Default)]
pub struct ViolationLog {
    entries: Mutex<Vec<EvidenceEvent>>,
}

impl ViolationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful upload. Ids grow monotonically from 1.
    pub fn append_uploaded(
        &self,
        name: String,
        captured_at_epoch_s: u64,
        url: String,
    ) -> EvidenceEvent {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let event = EvidenceEvent {
            id: entries.len() as u64 + 1,
            captured_at_epoch_s,
            name,
            url,
        };
        entries.insert(0, event.clone());
        event
    }

    /// The most recent `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<EvidenceEvent> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().take(limit).cloned().collect()
    }

    /// Remove the event with `id` if present. Deleting an absent id is a
    /// silent success.
    pub fn delete(&self, id: u64) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|event| event.id != id);
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
