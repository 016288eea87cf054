//! Run configuration assembled from the command line.

use std::path::PathBuf;
use std::time::Duration;

/// Everything one export run needs to know. Built once in `main` and passed
/// down; the engine layers never read the environment themselves.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Herb name to search for.
    pub term: String,
    /// Suffix for the output file name, `Success{N}.csv`.
    pub success_index: u32,
    pub headless: bool,
    /// Fixed per-action delay, for watching runs in headed mode.
    pub slow_mo: Duration,
    /// Shared bound for every page wait.
    pub timeout: Duration,
    pub output_dir: PathBuf,
    pub debug_dir: PathBuf,
    /// Attempts for the whole entry-navigation step.
    pub retry_attempts: u32,
    /// Fixed delay between those attempts.
    pub retry_delay: Duration,
}

impl RunConfig {
    /// Path the extracted table is written to.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("Success{}.csv", self.success_index))
    }

    /// Path a previously saved table is compared against, when present.
    pub fn reference_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_RelatedTargets.csv", self.term))
    }
}
