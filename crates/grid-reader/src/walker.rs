//! Whole-grid pagination walk with duplicate-row suppression.

use std::collections::HashSet;

use tracing::{debug, warn};

use surface_adapter::WaitState;
use table_core::{normalize_headers, ExtractedTable};

use crate::reader::GridReader;
use crate::GridError;

/// Visit every page of the grid, merging visible rows. Duplicate suppression
/// keys on the raw, unnormalized cell tuple: rows rendering identical text
/// are merged even if the widget considers them distinct.
pub async fn walk_all_pages(
    reader: &GridReader<'_>,
    grid_id: &str,
) -> Result<ExtractedTable, GridError> {
    let state = reader
        .read_state(grid_id)
        .await?
        .ok_or_else(|| GridError::StateUnavailable(grid_id.to_string()))?;
    let total_pages = state.page_count.max(state.derived_page_count());
    let mut current = state.page;
    debug!(
        grid_id,
        pages = total_pages,
        page_size = state.page_size,
        total = state.total,
        "walking grid"
    );

    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut seen: HashSet<Vec<String>> = HashSet::new();

    for page in 1..=total_pages {
        if page != current {
            reader.set_page(grid_id, page).await?;
        }
        // Idle wait degrades to proceed-anyway here: a stuck loading mask
        // must not abort the walk when rows are already rendered.
        if let Err(err) = reader.wait_idle(grid_id).await {
            warn!(grid_id, page, %err, "grid never went idle; reading anyway");
        }
        reader
            .surface()
            .wait_for_selector(
                &format!("#{grid_id} .k-grid-content tbody tr"),
                WaitState::Attached,
                reader.timeout(),
            )
            .await
            .map_err(GridError::from)?;

        let (page_headers, page_rows) = reader.read_visible_table(grid_id).await?;
        if headers.is_empty() {
            headers = page_headers;
        }
        for row in page_rows {
            if !seen.insert(row.clone()) {
                continue;
            }
            rows.push(row);
        }
        debug!(grid_id, page, merged = rows.len(), "page merged");
        current = page;
    }

    if headers.is_empty() {
        return Ok(ExtractedTable::new());
    }
    Ok(ExtractedTable::from_rows(normalize_headers(&headers), rows))
}
