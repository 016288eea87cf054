//! TCMSP related-targets exporter.
//!
//! The binary wires the workspace layers together: launch a browser session,
//! drive the herb search, walk down to the detail page, run the extraction
//! chain and persist the normalized table as CSV.

pub mod config;
pub mod debug;
pub mod export;
pub mod run;

pub use config::RunConfig;
pub use run::run_export;
