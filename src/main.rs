use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tcmsp_export::{run_export, RunConfig};

/// Export the related-targets table for one herb from the TCMSP database.
#[derive(Debug, Parser)]
#[command(name = "tcmsp-export", version, about)]
struct Cli {
    /// Herb name to search for.
    term: String,

    /// Numeric suffix for the output file, Success{N}.csv.
    #[arg(long, default_value_t = 1)]
    success_index: u32,

    /// Run the browser without a visible window. This is the default.
    #[arg(long, conflicts_with = "headed")]
    headless: bool,

    /// Run the browser with a visible window.
    #[arg(long)]
    headed: bool,

    /// Fixed delay in milliseconds before each browser action.
    #[arg(long, default_value_t = 0)]
    slow_mo: u64,

    /// Raise log verbosity to debug for every layer.
    #[arg(long)]
    trace: bool,

    /// Run the pipeline three times (twice headless, once headed) and fail
    /// on the first failing run.
    #[arg(long)]
    self_check: bool,

    /// Bound in seconds for every navigation and wait.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Directory the CSV output lands in.
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Directory debug artifacts land in.
    #[arg(long, default_value = "debug")]
    debug_dir: PathBuf,
}

impl Cli {
    fn run_config(&self, headless: bool, success_index: u32) -> RunConfig {
        RunConfig {
            term: self.term.clone(),
            success_index,
            headless,
            slow_mo: Duration::from_millis(self.slow_mo),
            timeout: Duration::from_secs(self.timeout_secs),
            output_dir: self.output_dir.clone(),
            debug_dir: self.debug_dir.clone(),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.trace { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
    let headless = cli.headless || !cli.headed;

    if cli.self_check {
        // Headless twice for stability, headed once for parity with what a
        // person watching the browser would see.
        let modes = [(true, 1), (true, 2), (false, 3)];
        for (run_headless, index) in modes {
            let offset = cli.success_index + index - 1;
            info!(run = index, headless = run_headless, "self-check run");
            run_export(&cli.run_config(run_headless, offset))
                .await
                .with_context(|| format!("self-check run {index} failed"))?;
        }
        info!("self-check passed");
        return Ok(());
    }

    run_export(&cli.run_config(headless, cli.success_index)).await
}
