//! Tabular data model and pure parsing for the related-targets exporter.
//!
//! Everything in this crate operates on strings and owned values; nothing
//! here touches a live page. The browser-facing layers hand raw HTML or JSON
//! payloads down and receive [`ExtractedTable`] values back.

pub mod embedded;
pub mod html;
pub mod json;
pub mod model;
pub mod normalize;
pub mod schema;

pub use model::{Cell, Column, ExtractedTable};
pub use normalize::{compare_with_reference, normalize_related_targets};
pub use schema::{normalize_headers, CanonicalSchema};
