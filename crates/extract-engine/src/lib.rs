//! Navigation-and-extraction engine.
//!
//! Walks from a search-results list to the detail view, activates the
//! related-targets section, and runs the tiered extraction chain over
//! whatever the page actually offers.

pub mod activate;
pub mod chain;
pub mod diagnostics;
pub mod drilldown;
pub mod errors;
pub mod popup;
pub mod view;

pub use chain::{extract_related_targets, ExtractionResult, Provenance};
pub use diagnostics::{DiagnosticSink, NullSink};
pub use drilldown::{drill_down_to_detail, DrillOutcome};
pub use errors::EngineError;
