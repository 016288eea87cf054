//! Debug artifact capture.
//!
//! One directory per run, named `<timestamp>_<sanitized term>`, collecting
//! labelled page dumps, the step log, the network capture log and the final
//! error chain. Everything here is best-effort: a full disk must never turn
//! a working export into a failure.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Local;
use tracing::{debug, warn};

use extract_engine::DiagnosticSink;
use surface_adapter::{NetworkExchange, PageSurface};

/// Keep file names portable: anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "run".to_string()
    } else {
        cleaned
    }
}

/// Sink that lands artifacts in the run's debug directory.
pub struct FileSink {
    dir: PathBuf,
    sequence: AtomicU32,
}

impl FileSink {
    /// Create the per-run directory under `debug_dir`. Failure to create it
    /// degrades to a sink that only logs.
    pub fn new(debug_dir: &Path, term: &str) -> Self {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let dir = debug_dir.join(format!("{stamp}_{}", sanitize_filename(term)));
        if let Err(err) = std::fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), %err, "debug directory not created");
        }
        Self {
            dir,
            sequence: AtomicU32::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist the network capture log as JSON.
    pub fn write_xhr_log(&self, exchanges: &[NetworkExchange]) {
        let path = self.dir.join("xhr_log.json");
        match serde_json::to_vec_pretty(exchanges) {
            Ok(bytes) => {
                if let Err(err) = std::fs::write(&path, bytes) {
                    warn!(path = %path.display(), %err, "xhr log not written");
                }
            }
            Err(err) => warn!(%err, "xhr log not serializable"),
        }
    }

    /// Record the failure display chain for post-mortems.
    pub fn write_error(&self, err: &anyhow::Error) {
        let path = self.dir.join("error.txt");
        if let Err(io_err) = std::fs::write(&path, format!("{err:#}\n")) {
            warn!(path = %path.display(), %io_err, "error report not written");
        }
    }

    fn labelled(&self, label: &str, ext: &str) -> PathBuf {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.dir
            .join(format!("{seq:03}_{}.{ext}", sanitize_filename(label)))
    }
}

#[async_trait]
impl DiagnosticSink for FileSink {
    async fn dump(&self, surface: &dyn PageSurface, label: &str) {
        match surface.content().await {
            Ok(html) => {
                let path = self.labelled(label, "html");
                if let Err(err) = std::fs::write(&path, html) {
                    warn!(path = %path.display(), %err, "html dump not written");
                }
            }
            Err(err) => debug!(label, %err, "page source unavailable for dump"),
        }
        match surface.screenshot().await {
            Ok(png) => {
                let path = self.labelled(label, "png");
                if let Err(err) = std::fs::write(&path, png) {
                    warn!(path = %path.display(), %err, "screenshot not written");
                }
            }
            Err(err) => debug!(label, %err, "screenshot unavailable"),
        }
    }

    fn step(&self, text: &str) {
        use std::io::Write;
        let path = self.dir.join("step_urls.txt");
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "{text}"));
        if let Err(err) = result {
            debug!(%err, "step log append failed");
        }
    }
}
