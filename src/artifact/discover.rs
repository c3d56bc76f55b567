//! Locating step inputs across runs.
//!
//! A step run on its own needs the artifacts of earlier steps. They are
//! taken from the current run when present, otherwise from the newest run
//! that has them. A `.json` file that no longer parses counts as absent.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use super::{ArtifactStore, Result, RunHandle};

/// Outcome of resolving a step's inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Every file, by name.
    Found(BTreeMap<String, PathBuf>),
    /// The files that exist in no run.
    Missing(Vec<String>),
}

/// Where each required file was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    /// Set when a single run held every file.
    pub dir: Option<PathBuf>,
    pub files: BTreeMap<String, PathBuf>,
}

impl ArtifactStore {
    /// Finds `required` in prior runs, newest first.
    ///
    /// Prefers one directory holding all files; falls back to the newest
    /// copy of each file individually. `None` if any file exists nowhere.
    pub fn find_across_runs(&self, required: &[&str]) -> Result<Option<Discovery>> {
        let dirs = self.run_dirs()?;

        for dir in &dirs {
            if required.iter().all(|name| usable(&dir.join(name))) {
                let files = required
                    .iter()
                    .map(|name| ((*name).to_string(), dir.join(name)))
                    .collect();
                return Ok(Some(Discovery {
                    dir: Some(dir.clone()),
                    files,
                }));
            }
        }

        let mut files = BTreeMap::new();
        for name in required {
            let Some(path) = dirs
                .iter()
                .map(|dir| dir.join(name))
                .find(|path| usable(path))
            else {
                tracing::debug!(file = *name, "not found in any run");
                return Ok(None);
            };
            files.insert((*name).to_string(), path);
        }

        Ok(Some(Discovery { dir: None, files }))
    }

    /// Resolves `required` for `run`: files already in the run win, the
    /// rest come from [`find_across_runs`](Self::find_across_runs).
    pub fn resolve_inputs(&self, run: &RunHandle, required: &[&str]) -> Result<Resolved> {
        let mut files = BTreeMap::new();
        let mut missing = Vec::new();

        for name in required {
            let path = run.dir.join(name);
            if usable(&path) {
                files.insert((*name).to_string(), path);
            } else {
                missing.push(*name);
            }
        }

        if missing.is_empty() {
            return Ok(Resolved::Found(files));
        }

        let Some(found) = self.find_across_runs(&missing)? else {
            let dirs = self.run_dirs()?;
            let absent = missing
                .into_iter()
                .filter(|name| !dirs.iter().any(|dir| usable(&dir.join(name))))
                .map(String::from)
                .collect();
            return Ok(Resolved::Missing(absent));
        };
        match &found.dir {
            Some(dir) => tracing::info!(from = %dir.display(), files = ?missing, "using artifacts from a prior run"),
            None => {
                for (name, path) in &found.files {
                    tracing::info!(file = %name, from = %path.display(), "using artifact from a prior run");
                }
            }
        }
        files.extend(found.files);
        Ok(Resolved::Found(files))
    }
}

fn usable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    if path.extension().is_some_and(|ext| ext == "json") {
        return fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str::<serde_json::Value>(&json).ok())
            .is_some();
    }
    true
}
