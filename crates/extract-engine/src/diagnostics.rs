//! Side-channel for debug artifacts.
//!
//! The engine writes snapshots and step notes through this sink; where they
//! land (files, nowhere) is the caller's concern. Every sink operation is
//! best-effort by contract: implementations must not fail the run.

use async_trait::async_trait;

use surface_adapter::PageSurface;

#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    /// Capture the page (HTML and/or screenshot) under a label.
    async fn dump(&self, surface: &dyn PageSurface, label: &str);

    /// Append one line to the step log.
    fn step(&self, text: &str);
}

/// Sink that discards everything; used in tests and library embeddings.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

#[async_trait]
impl DiagnosticSink for NullSink {
    async fn dump(&self, _surface: &dyn PageSurface, _label: &str) {}

    fn step(&self, _text: &str) {}
}
