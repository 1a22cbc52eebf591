use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use sensor::{RestoredValue, StateStore, StateStoreError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct PersistedValue {
    value: u32,
    reset_marker: Option<NaiveDate>,
}

/// JSON-file-backed persistence for sensor values, read once at startup and
/// rewritten on every save.
pub struct FileStateStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, PersistedValue>>,
}

impl FileStateStore {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StateStoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|err| StateStoreError::Io(err.to_string()))?;
            let entries: HashMap<String, PersistedValue> = serde_json::from_str(&content)
                .map_err(|err| StateStoreError::Io(err.to_string()))?;
            info!(path = %path.display(), sensors = entries.len(), "sensor state loaded");
            entries
        } else {
            debug!(path = %path.display(), "no prior sensor state");
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn write_out(&self, entries: &HashMap<String, PersistedValue>) -> Result<(), StateStoreError> {
        let content = serde_json::to_string_pretty(entries)
            .map_err(|err| StateStoreError::Io(err.to_string()))?;
        fs::write(&self.path, content).map_err(|err| StateStoreError::Io(err.to_string()))
    }
}

impl StateStore for FileStateStore {
    fn restore_last_value(&self, sensor_id: &str) -> Option<RestoredValue> {
        let entries = self.entries.lock().ok()?;
        entries.get(sensor_id).map(|persisted| RestoredValue {
            value: persisted.value,
            reset_marker: persisted.reset_marker,
        })
    }

    fn save_last_value(
        &self,
        sensor_id: &str,
        value: u32,
        reset_marker: Option<NaiveDate>,
    ) -> Result<(), StateStoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StateStoreError::Io("state map poisoned".to_string()))?;
        entries.insert(
            sensor_id.to_string(),
            PersistedValue {
                value,
                reset_marker,
            },
        );
        self.write_out(&entries)
    }
}
