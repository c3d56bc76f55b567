//! Run directories and the JSON artifacts passed between steps.
//!
//! Every pipeline invocation writes into its own directory under the
//! output root:
//!
//! ```text
//! <output>/<run-id>/
//!   items.json     # fetch
//!   phases.json    # classify
//!   actions.json   # process
//!   report.md      # report
//!   run.json       # steps executed so far
//! ```
//!
//! Run ids are UTC timestamps with the colons replaced, so directory names
//! sort in creation order.

mod discover;

pub use discover::{Discovery, Resolved};

use std::{
    cell::OnceCell,
    env, fs, io,
    path::{Path, PathBuf},
};

use jiff::Timestamp;
use serde::{Serialize, de::DeserializeOwned};

/// Environment variable a child invocation uses to inherit its parent's run.
pub const RUN_ID_ENV: &str = "SHEPHERD_RUN_ID";

const RUN_ID_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, ArtifactError>;

/// The current run's id and directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub id: String,
    pub dir: PathBuf,
}

/// A prior run and the artifacts it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunListing {
    pub id: String,
    pub artifacts: Vec<String>,
}

/// File-based artifact storage rooted at the output directory.
pub struct ArtifactStore {
    root: PathBuf,
    inherited: Option<String>,
    run: OnceCell<RunHandle>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            inherited: None,
            run: OnceCell::new(),
        }
    }

    /// Join an existing run instead of starting a new one.
    pub fn with_run_id(mut self, id: Option<String>) -> Self {
        self.inherited = id;
        self
    }

    /// The run id a parent invocation exported, if any.
    pub fn inherited_run_id() -> Option<String> {
        env::var(RUN_ID_ENV).ok()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the run for this invocation, creating its directory on
    /// first call. Later calls return the same handle.
    pub fn create_run(&self) -> Result<&RunHandle> {
        if let Some(handle) = self.run.get() {
            return Ok(handle);
        }

        let id = run_id(self.inherited.clone(), Timestamp::now());
        let dir = self.root.join(&id);
        fs::create_dir_all(&dir)?;
        tracing::debug!(run = %id, dir = %dir.display(), "run directory ready");

        Ok(self.run.get_or_init(|| RunHandle { id, dir }))
    }

    // ── Read / write ──

    /// Writes `data` as pretty JSON, replacing any existing file.
    pub fn write<T: Serialize + ?Sized>(
        &self,
        run: &RunHandle,
        filename: &str,
        data: &T,
    ) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(data)?;
        self.write_text(run, filename, &json)
    }

    pub fn write_text(&self, run: &RunHandle, filename: &str, text: &str) -> Result<PathBuf> {
        fs::create_dir_all(&run.dir)?;
        let path = run.dir.join(filename);
        fs::write(&path, text)?;
        Ok(path)
    }

    /// Reads a JSON artifact from the given run.
    pub fn read<T: DeserializeOwned>(&self, run: &RunHandle, filename: &str) -> Result<T> {
        read_path(&run.dir.join(filename))
    }

    /// Lists runs newest first, each with its artifact file names.
    pub fn list_runs(&self) -> Result<Vec<RunListing>> {
        let mut runs = Vec::new();
        for dir in self.run_dirs()? {
            let Some(id) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let mut artifacts = Vec::new();
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    artifacts.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
            artifacts.sort();
            runs.push(RunListing {
                id: id.to_string(),
                artifacts,
            });
        }
        Ok(runs)
    }

    /// Run directories sorted newest first by name.
    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(dirs)
    }
}

/// Reads a JSON artifact from an explicit path.
pub fn read_path<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ArtifactError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_str(&json)?)
}

fn run_id(inherited: Option<String>, now: Timestamp) -> String {
    match inherited.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => now.strftime(RUN_ID_FORMAT).to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    pub(crate) fn test_store() -> (TempDir, ArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("output"));
        (dir, store)
    }

    /// A run with a fixed id, bypassing the clock.
    pub(crate) fn run(store: &ArtifactStore, id: &str) -> RunHandle {
        let handle = RunHandle {
            id: id.to_string(),
            dir: store.root().join(id),
        };
        fs::create_dir_all(&handle.dir).unwrap();
        handle
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_dir, store) = test_store();
        let run = run(&store, "2026-10-16T09-00-00");
        let sample = Sample {
            name: "widgets".into(),
            count: 3,
        };

        let path = store.write(&run, "items.json", &sample).unwrap();

        assert_eq!(path, run.dir.join("items.json"));
        let loaded: Sample = store.read(&run, "items.json").unwrap();
        assert_eq!(loaded, sample);
    }

    #[test]
    fn write_overwrites() {
        let (_dir, store) = test_store();
        let run = run(&store, "2026-10-16T09-00-00");

        store.write(&run, "items.json", &vec![1, 2, 3]).unwrap();
        store.write(&run, "items.json", &vec![4]).unwrap();

        let loaded: Vec<u32> = store.read(&run, "items.json").unwrap();
        assert_eq!(loaded, vec![4]);
    }

    #[test]
    fn read_missing_is_not_found() {
        let (_dir, store) = test_store();
        let run = run(&store, "2026-10-16T09-00-00");

        let err = store.read::<Sample>(&run, "items.json").unwrap_err();

        assert!(matches!(err, ArtifactError::NotFound { .. }));
    }

    #[test]
    fn create_run_is_cached() {
        let (_dir, store) = test_store();

        let first = store.create_run().unwrap().clone();
        let second = store.create_run().unwrap();

        assert_eq!(&first, second);
        assert!(first.dir.is_dir());
    }

    #[test]
    fn create_run_joins_inherited_run() {
        let (_dir, store) = test_store();
        let store = store.with_run_id(Some("2026-01-01T00-00-00".into()));

        let run = store.create_run().unwrap();

        assert_eq!(run.id, "2026-01-01T00-00-00");
        assert_eq!(run.dir, store.root().join("2026-01-01T00-00-00"));
    }

    #[test]
    fn run_id_is_sortable_timestamp() {
        let now: Timestamp = "2026-10-16T09:05:07Z".parse().unwrap();
        assert_eq!(run_id(None, now), "2026-10-16T09-05-07");
    }

    #[test]
    fn run_id_inherits_from_parent() {
        let now = Timestamp::now();
        assert_eq!(
            run_id(Some("2026-01-01T00-00-00".into()), now),
            "2026-01-01T00-00-00"
        );
        assert_ne!(run_id(Some("  ".into()), now), "  ");
    }

    #[test]
    fn list_runs_newest_first() {
        let (_dir, store) = test_store();
        let older = run(&store, "2026-10-15T09-00-00");
        let newer = run(&store, "2026-10-16T09-00-00");
        store.write(&older, "items.json", &Vec::<u32>::new()).unwrap();
        store.write_text(&newer, "report.md", "# Report\n").unwrap();
        store.write(&newer, "actions.json", &Vec::<u32>::new()).unwrap();

        let runs = store.list_runs().unwrap();

        assert_eq!(
            runs,
            vec![
                RunListing {
                    id: newer.id.clone(),
                    artifacts: vec!["actions.json".into(), "report.md".into()],
                },
                RunListing {
                    id: older.id.clone(),
                    artifacts: vec!["items.json".into()],
                },
            ]
        );
    }

    #[test]
    fn list_runs_without_output_dir() {
        let (_dir, store) = test_store();
        assert!(store.list_runs().unwrap().is_empty());
    }
}
