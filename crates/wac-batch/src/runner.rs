use crate::job::{BatchJob, BatchJobRecord};
use crate::manifest::{write_batch_manifest, BatchManifest};
use anyhow::{Context, Result};
use chrono::Utc;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use wac_algo::{LayoutOutcome, SolverConfig};
use wac_core::Layout;

pub const MANIFEST_FILE: &str = "batch_manifest.json";

pub struct BatchRunnerConfig {
    pub jobs: Vec<BatchJob>,
    pub output_root: PathBuf,
    /// Replaces every job's own solver settings when set.
    pub solver: Option<SolverConfig>,
    /// Write `<output_root>/<job_id>/layout.json` for each solved job.
    pub write_layouts: bool,
    /// Worker threads; 0 uses every core.
    pub threads: usize,
}

impl BatchRunnerConfig {
    pub fn new(jobs: Vec<BatchJob>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            jobs,
            output_root: output_root.into(),
            solver: None,
            write_layouts: true,
            threads: 0,
        }
    }
}

/// Counts and manifest location of a finished run.
pub struct BatchSummary {
    pub solved: usize,
    pub without_layout: usize,
    pub failure: usize,
    pub manifest_path: PathBuf,
    pub jobs: Vec<BatchJobRecord>,
}

/// Solve every job in parallel and write the manifest.
///
/// A job that is infeasible or runs out of time is recorded, not fatal;
/// only I/O on the output root aborts the batch.
pub fn run_batch(config: &BatchRunnerConfig) -> Result<BatchSummary> {
    fs::create_dir_all(&config.output_root).with_context(|| {
        format!(
            "creating batch output root '{}'",
            config.output_root.display()
        )
    })?;

    let thread_count = if config.threads == 0 {
        num_cpus::get()
    } else {
        config.threads
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .context("building Rayon thread pool for batch runs")?;

    info!(
        jobs = config.jobs.len(),
        threads = thread_count,
        "starting layout batch"
    );
    let job_records: Vec<BatchJobRecord> = pool.install(|| {
        config
            .jobs
            .par_iter()
            .map(|job| run_job(job, config))
            .collect()
    });

    let solved = job_records.iter().filter(|r| r.has_layout()).count();
    let failure = job_records.iter().filter(|r| r.is_error()).count();
    let without_layout = job_records.len() - solved - failure;

    let backend = config
        .solver
        .as_ref()
        .map(|s| s.backend.to_string())
        .unwrap_or_else(|| "per-job".to_string());
    let manifest = BatchManifest {
        created_at: Utc::now(),
        backend,
        num_jobs: job_records.len(),
        solved,
        without_layout,
        failure,
        jobs: job_records.clone(),
    };
    let manifest_path = config.output_root.join(MANIFEST_FILE);
    write_batch_manifest(&manifest_path, &manifest)?;
    info!(solved, without_layout, failure, "layout batch finished");

    Ok(BatchSummary {
        solved,
        without_layout,
        failure,
        manifest_path,
        jobs: job_records,
    })
}

fn run_job(job: &BatchJob, config: &BatchRunnerConfig) -> BatchJobRecord {
    let mut problem = job.problem.clone();
    if let Some(solver) = &config.solver {
        problem.config.solver = solver.clone();
    }

    let mut record = BatchJobRecord {
        job_id: job.job_id.clone(),
        status: "error".to_string(),
        error: None,
        objective: None,
        solve_time_ms: 0,
        num_units: problem.units.len(),
        num_cable_types: problem.cable_types.len(),
        num_cables: None,
        output: None,
    };

    let start = Instant::now();
    let outcome = problem.create_layout();
    record.solve_time_ms = start.elapsed().as_millis() as u64;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(job = %job.job_id, error = %err, "batch job failed");
            record.error = Some(err.to_string());
            return record;
        }
    };
    record.status = outcome.label().to_string();

    if let LayoutOutcome::Optimal(layout) | LayoutOutcome::Feasible(layout) = &outcome {
        record.objective = Some(layout.total_cost());
        record.num_cables = Some(layout.len());
        if config.write_layouts {
            let path = config.output_root.join(&job.job_id).join("layout.json");
            match write_layout(&path, layout) {
                Ok(()) => record.output = Some(path.display().to_string()),
                Err(err) => {
                    warn!(job = %job.job_id, error = %err, "could not write layout");
                    record.status = "error".to_string();
                    record.error = Some(format!("{err:#}"));
                    record.objective = None;
                }
            }
        }
    } else {
        warn!(job = %job.job_id, status = outcome.label(), "no layout");
    }
    record
}

fn write_layout(path: &Path, layout: &Layout) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating layout directory '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&layout.rows()).context("serializing layout rows")?;
    fs::write(path, json).with_context(|| format!("writing layout '{}'", path.display()))
}
