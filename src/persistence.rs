//! State persistence.
//!
//! The engine talks to storage through a narrow port so the algorithmic
//! core has zero I/O dependencies. Snapshots carry an explicit schema
//! version; anything unreadable, unversioned, or carrying unknown topic
//! values is discarded in favor of a fresh state — corrupt storage must
//! never block startup.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::types::{EngineState, TopicId, TopicPerformance};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub state: EngineState,
}

impl StateSnapshot {
    pub fn capture(state: &EngineState, now: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: now,
            state: state.clone(),
        }
    }

    /// Turn a loaded snapshot back into engine state, or `None` when the
    /// schema version is not ours. Topics missing from older saves are
    /// backfilled with empty entries.
    pub fn restore(self) -> Option<EngineState> {
        if self.version != SNAPSHOT_VERSION {
            warn!(
                found = self.version,
                expected = SNAPSHOT_VERSION,
                "discarding state snapshot with unsupported version"
            );
            return None;
        }

        let mut state = self.state;
        for topic in TopicId::ALL {
            state
                .topics
                .entry(topic)
                .or_insert_with(|| TopicPerformance::new(topic));
        }
        Some(state)
    }
}

pub trait StatePort: Send {
    fn load(&self) -> Option<StateSnapshot>;
    fn save(&self, snapshot: &StateSnapshot) -> Result<(), EngineError>;
}

/// In-memory adapter for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Option<StateSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatePort for MemoryStore {
    fn load(&self) -> Option<StateSnapshot> {
        self.inner.lock().clone()
    }

    fn save(&self, snapshot: &StateSnapshot) -> Result<(), EngineError> {
        *self.inner.lock() = Some(snapshot.clone());
        Ok(())
    }
}

/// JSON file adapter. Saves write a sibling temp file first and rename it
/// into place, so a crash mid-save leaves the previous snapshot intact.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatePort for JsonFileStore {
    fn load(&self) -> Option<StateSnapshot> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no saved state");
                return None;
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "failed to read saved state");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "discarding corrupt saved state");
                None
            }
        }
    }

    fn save(&self, snapshot: &StateSnapshot) -> Result<(), EngineError> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| EngineError::Persistence(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| EngineError::Persistence(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| EngineError::Persistence(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load().is_none());

        let mut state = EngineState::new();
        state.total_answered = 42;
        store.save(&StateSnapshot::capture(&state, now())).unwrap();

        let restored = store.load().unwrap().restore().unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));

        let mut state = EngineState::new();
        state.total_answered = 7;
        state.push_recent(true, 10);
        store.save(&StateSnapshot::capture(&state, now())).unwrap();

        let restored = store.load().unwrap().restore().unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::new(path);
        assert!(store.load().is_none());
    }

    #[test]
    fn test_unknown_topic_rejects_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = JsonFileStore::new(path.clone());
        store
            .save(&StateSnapshot::capture(&EngineState::new(), now()))
            .unwrap();

        let tampered = fs::read_to_string(&path)
            .unwrap()
            .replace("audit-process", "forged-topic");
        fs::write(&path, tampered).unwrap();

        assert!(store.load().is_none());
    }

    #[test]
    fn test_version_mismatch_discards_snapshot() {
        let mut snapshot = StateSnapshot::capture(&EngineState::new(), now());
        snapshot.version = 99;
        assert!(snapshot.restore().is_none());
    }

    #[test]
    fn test_restore_backfills_missing_topics() {
        let mut state = EngineState::new();
        state.topics.remove(&TopicId::Governance);

        let restored = StateSnapshot::capture(&state, now()).restore().unwrap();
        assert!(restored.topics.contains_key(&TopicId::Governance));
    }
}
