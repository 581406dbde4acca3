use std::collections::BTreeMap;
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::WeekBucket;
use crate::error::SyncError;

/// Last successfully synced version of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub last_modified: Option<String>,
    pub iso_week: String,
}

impl StateEntry {
    pub fn new(last_modified: Option<String>, bucket: WeekBucket) -> Self {
        Self {
            last_modified,
            iso_week: bucket.to_string(),
        }
    }

    pub fn matches(&self, last_modified: Option<&str>, bucket: WeekBucket) -> bool {
        self.iso_week == bucket.to_string() && self.last_modified.as_deref() == last_modified
    }
}

/// Keyed by the resource identity string.
pub type StateMap = BTreeMap<String, StateEntry>;

/// JSON file mapping resource identity to its [`StateEntry`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: Utf8PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Empty map on first run.
    pub fn load(&self) -> Result<StateMap, SyncError> {
        let content = match fs::read_to_string(self.path.as_std_path()) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path, "no state file yet");
                return Ok(StateMap::new());
            }
            Err(err) => {
                return Err(SyncError::Filesystem(format!("read {}: {err}", self.path)));
            }
        };
        serde_json::from_str(&content)
            .map_err(|err| SyncError::StateParse(format!("{}: {err}", self.path)))
    }

    /// Rewrites the whole file through a sibling temp file.
    pub fn save(&self, state: &StateMap) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_str().is_empty()) {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(state)
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        fs::write(tmp_path.as_std_path(), &content)
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), self.path.as_std_path())
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        Ok(())
    }
}
