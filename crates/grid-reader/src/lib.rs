//! Kendo grid interrogation over a [`PageSurface`].
//!
//! The grid widget keeps its own paginated data store independent of the
//! rendered DOM; this crate reads that state, commands page changes, and
//! walks every page of the rendered view.

pub mod reader;
pub mod walker;

use thiserror::Error;

pub use reader::{GridReader, GridState};
pub use walker::walk_all_pages;

#[derive(Debug, Error)]
pub enum GridError {
    /// The widget or its data source is not present on the page.
    #[error("grid state unavailable for #{0}")]
    StateUnavailable(String),

    /// The widget never confirmed a commanded page change.
    #[error("page change to {page} not confirmed for #{grid}")]
    PageChangeUnconfirmed { grid: String, page: u64 },

    #[error(transparent)]
    Surface(#[from] surface_adapter::SurfaceError),
}
