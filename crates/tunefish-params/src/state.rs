use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Snapshot of a tuning run: the completed-iteration counter plus the
/// current parameter values.
///
/// The persisted form is plain JSON and safe to hand-edit between resumed
/// chunks. The counter is global across chunks; it is what keeps the decaying
/// gain schedule continuous when a run is split over many process
/// invocations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TuningState {
    pub iteration: u64,
    pub parameters: BTreeMap<String, f64>,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum StateError {
    #[display("failed to read tuning state from {}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[display("failed to parse tuning state {}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("failed to encode tuning state")]
    Encode { source: serde_json::Error },
    #[display("failed to write tuning state to {}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Durable storage for a [`TuningState`] at a fixed path.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted state, or `None` when no state file exists yet.
    pub fn load(&self) -> Result<Option<TuningState>, StateError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StateError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let state = serde_json::from_slice(&bytes).map_err(|source| StateError::Parse {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(state))
    }

    /// Atomically replaces the state file.
    ///
    /// The state is written to a temporary sibling and renamed into place, so
    /// an interrupted write leaves the previous file readable.
    pub fn save(&self, state: &TuningState) -> Result<(), StateError> {
        let mut json =
            serde_json::to_vec_pretty(state).map_err(|source| StateError::Encode { source })?;
        json.push(b'\n');

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| StateError::Write {
                path: self.path.clone(),
                source,
            })?;
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, &json).map_err(|source| StateError::Write {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StateError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("tuning_state.json");
        self.path
            .with_file_name(format!(".{name}.tmp.{}", std::process::id()))
    }
}
