use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use wac_algo::ArrayCableProblem;

/// One named problem instance in a batch.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub job_id: String,
    pub problem: ArrayCableProblem,
    /// File the problem was read from, if any.
    pub source: Option<PathBuf>,
}

impl BatchJob {
    pub fn new(job_id: impl Into<String>, problem: ArrayCableProblem) -> Self {
        Self {
            job_id: job_id.into(),
            problem,
            source: None,
        }
    }

    /// Read a problem from a JSON file; the job id is the file stem.
    pub fn load(path: &Path) -> Result<Self> {
        let job_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("problem file '{}' has no usable name", path.display()))?
            .to_string();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading problem file '{}'", path.display()))?;
        let problem: ArrayCableProblem = serde_json::from_str(&text)
            .with_context(|| format!("parsing problem file '{}'", path.display()))?;
        Ok(Self {
            job_id,
            problem,
            source: Some(path.to_path_buf()),
        })
    }
}

/// Outcome of one job as written to the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJobRecord {
    pub job_id: String,
    /// Layout outcome label, or "error" when the job failed before solving.
    pub status: String,
    pub error: Option<String>,
    pub objective: Option<f64>,
    pub solve_time_ms: u64,
    pub num_units: usize,
    pub num_cable_types: usize,
    pub num_cables: Option<usize>,
    pub output: Option<String>,
}

impl BatchJobRecord {
    pub fn has_layout(&self) -> bool {
        self.objective.is_some()
    }

    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

/// Load every `*.json` problem in a directory, sorted by file name.
pub fn jobs_from_dir(dir: &Path) -> Result<Vec<BatchJob>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("listing problem directory '{}'", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();
    paths.iter().map(|path| BatchJob::load(path)).collect()
}
