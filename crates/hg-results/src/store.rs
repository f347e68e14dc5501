//! On-disk storage of pipe state snapshots.
//!
//! A snapshot taken with `Network::get_pipe_states` can be written here and
//! later fed back to `Network::reset` to resume from the same plug contents.

use crate::types::PipeStates;
use crate::{ResultsError, ResultsResult};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct SnapshotStore {
    root_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn snapshot_path(&self, name: &str) -> ResultsResult<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !name.starts_with('.');
        if !valid {
            return Err(ResultsError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(self.root_dir.join(format!("{name}.json")))
    }

    pub fn has_snapshot(&self, name: &str) -> bool {
        self.snapshot_path(name).is_ok_and(|p| p.exists())
    }

    pub fn save(&self, name: &str, states: &PipeStates) -> ResultsResult<()> {
        let path = self.snapshot_path(name)?;
        fs::write(path, states.to_json()?)?;
        Ok(())
    }

    pub fn load(&self, name: &str) -> ResultsResult<PipeStates> {
        let path = self.snapshot_path(name)?;
        if !path.exists() {
            return Err(ResultsError::SnapshotNotFound {
                name: name.to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        Ok(PipeStates::from_json(&content)?)
    }

    /// Names of all stored snapshots, sorted.
    pub fn list(&self) -> ResultsResult<Vec<String>> {
        let mut names = Vec::new();
        if !self.root_dir.exists() {
            return Ok(names);
        }
        for entry in fs::read_dir(&self.root_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json")
                && let Some(stem) = path.file_stem()
            {
                names.push(stem.to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn delete(&self, name: &str) -> ResultsResult<()> {
        let path = self.snapshot_path(name)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
