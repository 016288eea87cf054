//! Engine-level error taxonomy.

use thiserror::Error;

use grid_reader::GridError;
use surface_adapter::SurfaceError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Every extraction tier came up empty. The only hard failure the chain
    /// itself produces.
    #[error("related targets not found in widget store, page source, DOM, or captured traffic")]
    AllTiersExhausted,

    /// Section activation exhausted its fallbacks, forced override included.
    #[error("related targets section not visible after selection")]
    SectionNotVisible,

    /// The list grid's first data row never materialized within the bound.
    #[error("list grid rows never materialized: {0}")]
    GridNotReady(String),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Grid(#[from] GridError),
}
