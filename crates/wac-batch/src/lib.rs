//! Solve many array cable problems in parallel and record the results.
//!
//! Each job is an [`ArrayCableProblem`](wac_algo::ArrayCableProblem) read
//! from JSON. Jobs run on a rayon pool; every job's status, objective and
//! solve time go into a `batch_manifest.json` under the output root.

pub mod job;
pub mod logging;
pub mod manifest;
pub mod runner;

pub use job::{jobs_from_dir, BatchJob, BatchJobRecord};
pub use logging::init_tracing;
pub use manifest::{load_batch_manifest, write_batch_manifest, BatchManifest};
pub use runner::{run_batch, BatchRunnerConfig, BatchSummary, MANIFEST_FILE};
