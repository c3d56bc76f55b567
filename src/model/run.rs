//! Pipeline run record.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One timestamped execution of the pipeline.
///
/// The id is fixed for the run's lifetime. `steps` lists the steps that
/// actually ran, in order, including one that failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    pub id: String,
    pub dir: PathBuf,
    pub steps: Vec<String>,
}
