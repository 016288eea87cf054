//! View classification and list-grid interrogation.

use std::time::Duration;

use tracing::debug;

use surface_adapter::{PageSurface, SurfaceError, WaitState};

use crate::errors::EngineError;

pub const LIST_GRID: &str = "grid";
pub const DETAIL_GRID: &str = "grid2";
pub const NO_RESULTS_TEXT: &str = "No items to display";

const LIST_HEADER_SEL: &str = "#grid .k-grid-header th";
const LIST_ROW_SEL: &str = "#grid .k-grid-content tbody tr";

/// Lowercased header texts of the list grid, empty when the grid is absent.
pub async fn list_grid_headers(surface: &dyn PageSurface) -> Vec<String> {
    let count = surface.count(LIST_HEADER_SEL).await.unwrap_or(0);
    let mut headers = Vec::with_capacity(count);
    for i in 0..count {
        let text = surface
            .inner_text(LIST_HEADER_SEL, i)
            .await
            .unwrap_or_default();
        headers.push(text.to_lowercase());
    }
    headers
}

/// A view is the search list iff its grid header row names a herb column,
/// or the raw markup carries the list view's structural fingerprint.
pub async fn is_search_list_page(surface: &dyn PageSurface) -> bool {
    let headers = list_grid_headers(surface).await;
    if headers
        .iter()
        .any(|h| h.contains("latin name") || h.contains("chinese name"))
    {
        return true;
    }
    match surface.content().await {
        Ok(html) => {
            html.contains("#grid") && html.contains("k-grid-content") && html.contains("Search by")
        }
        Err(err) => {
            debug!(%err, "content unavailable during classification");
            false
        }
    }
}

/// Zero-results detection: the widget's no-records node, or the literal
/// banner text anywhere in the body.
pub async fn search_has_no_results(surface: &dyn PageSurface) -> bool {
    if surface.count(".k-grid-norecords").await.unwrap_or(0) > 0 {
        return true;
    }
    match surface.content().await {
        Ok(html) => html.to_lowercase().contains(&NO_RESULTS_TEXT.to_lowercase()),
        Err(_) => false,
    }
}

/// Block until the list grid's first data row is materialized. A second,
/// best-effort wait gives the widget's data source time to report rows.
pub async fn wait_for_grid_ready(
    surface: &dyn PageSurface,
    timeout: Duration,
) -> Result<(), EngineError> {
    surface
        .wait_for_selector(LIST_ROW_SEL, WaitState::Attached, timeout)
        .await
        .map_err(|err: SurfaceError| EngineError::GridNotReady(err.to_string()))?;
    let predicate = "(() => window.$ && $('#grid').data('kendoGrid') \
        && $('#grid').data('kendoGrid').dataSource \
        && $('#grid').data('kendoGrid').dataSource.total() > 0)()";
    if let Err(err) = surface.wait_for_function(predicate, timeout).await {
        debug!(%err, "grid data source never reported rows; proceeding");
    }
    Ok(())
}

/// The drill-down anchor: first data row, the column whose header matched
/// "Latin name".
#[derive(Clone, Debug)]
pub struct LatinLink {
    /// Selector reaching the live anchor, for click delivery.
    pub selector: String,
    /// Raw href attribute; `None` for script-only anchors.
    pub href: Option<String>,
}

pub async fn latin_link(surface: &dyn PageSurface) -> Option<LatinLink> {
    let headers = list_grid_headers(surface).await;
    let latin_idx = headers.iter().position(|h| h.contains("latin name"))?;

    let selector = format!(
        "#grid .k-grid-content tbody tr:nth-child(1) td:nth-child({}) a",
        latin_idx + 1
    );
    if surface.count(&selector).await.unwrap_or(0) == 0 {
        return None;
    }
    let href = surface
        .attribute(&selector, 0, "href")
        .await
        .ok()
        .flatten()
        .filter(|h| !h.is_empty());
    Some(LatinLink { selector, href })
}
