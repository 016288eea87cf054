//! Pagination state and visible-table reads for one grid widget.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use surface_adapter::{js_string, PageSurface, SurfaceError};

use crate::GridError;

/// Snapshot of the widget's pagination state. Read fresh before and after
/// every page change; never cached across navigation.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct GridState {
    /// 1-based current page.
    pub page: u64,
    #[serde(rename = "pageSize")]
    pub page_size: u64,
    pub total: u64,
    #[serde(rename = "pageCount")]
    pub page_count: u64,
}

impl GridState {
    /// Derived page count with the minimum-1 floor, used when the widget
    /// reports a zero or absent count.
    pub fn derived_page_count(&self) -> u64 {
        if self.page_size == 0 {
            return 1;
        }
        self.total.div_ceil(self.page_size).max(1)
    }
}

/// Best-effort reader for one grid id on one page surface. All waits share
/// the single configured bound.
pub struct GridReader<'a> {
    surface: &'a dyn PageSurface,
    timeout: Duration,
}

impl<'a> GridReader<'a> {
    pub fn new(surface: &'a dyn PageSurface, timeout: Duration) -> Self {
        Self { surface, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn surface(&self) -> &dyn PageSurface {
        self.surface
    }

    /// Read the widget's pagination state. `Ok(None)` when the widget is
    /// missing; an `Err` means the page itself could not be interrogated,
    /// which callers must not treat as an empty grid.
    pub async fn read_state(&self, grid_id: &str) -> Result<Option<GridState>, GridError> {
        let expression = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el || !window.$) return null; \
             const grid = window.$(el).data('kendoGrid'); \
             if (!grid || !grid.dataSource) return null; \
             const total = grid.dataSource.total(); \
             const pageSize = grid.dataSource.pageSize(); \
             const page = grid.dataSource.page(); \
             const pageCount = Math.ceil(total / pageSize) || 1; \
             return {{ total, pageSize, page, pageCount }}; }})()",
            sel = js_string(&format!("#{grid_id}")),
        );
        let value = self.surface.evaluate(&expression).await?;
        if value.is_null() {
            return Ok(None);
        }
        let state: GridState = serde_json::from_value(value)
            .map_err(|err| SurfaceError::Evaluation(format!("grid state shape: {err}")))?;
        debug!(grid_id, ?state, "grid state");
        Ok(Some(state))
    }

    /// Command the widget to `page` and block until it reports that page as
    /// current. `Ok(false)` when the widget is missing; a confirmation
    /// timeout is an error, not a silent no-op.
    pub async fn set_page(&self, grid_id: &str, page: u64) -> Result<bool, GridError> {
        let sel = js_string(&format!("#{grid_id}"));
        let command = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el || !window.$) return false; \
             const grid = window.$(el).data('kendoGrid'); \
             if (!grid || !grid.dataSource) return false; \
             grid.dataSource.page({page}); return true; }})()",
        );
        let accepted = self.surface.evaluate(&command).await?;
        if accepted.as_bool() != Some(true) {
            return Ok(false);
        }

        let confirm = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el || !window.$) return false; \
             const grid = window.$(el).data('kendoGrid'); \
             return grid && grid.dataSource.page() === {page}; }})()",
        );
        self.surface
            .wait_for_function(&confirm, self.timeout)
            .await
            .map_err(|_| GridError::PageChangeUnconfirmed {
                grid: grid_id.to_string(),
                page,
            })?;
        Ok(true)
    }

    /// Block until no loading mask is visibly present. Whether a timeout
    /// here aborts or degrades to proceed-anyway is the caller's decision.
    pub async fn wait_idle(&self, grid_id: &str) -> Result<(), GridError> {
        let expression = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return false; \
             const mask = el.querySelector('.k-loading-mask'); \
             return !mask || mask.offsetParent === null; }})()",
            sel = js_string(&format!("#{grid_id}")),
        );
        self.surface
            .wait_for_function(&expression, self.timeout)
            .await?;
        Ok(())
    }

    /// Read whatever the currently rendered page shows: header texts (blank
    /// headers become `col_N`) and raw row cell texts.
    pub async fn read_visible_table(
        &self,
        grid_id: &str,
    ) -> Result<(Vec<String>, Vec<Vec<String>>), GridError> {
        let header_sel = format!("#{grid_id} .k-grid-header th");
        let mut headers = Vec::new();
        let header_count = self.surface.count(&header_sel).await?;
        for i in 0..header_count {
            let text = self.surface.inner_text(&header_sel, i).await.unwrap_or_default();
            if text.is_empty() {
                headers.push(format!("col_{}", i + 1));
            } else {
                headers.push(text);
            }
        }

        let row_sel = format!("#{grid_id} .k-grid-content tbody tr");
        let row_count = self.surface.count(&row_sel).await?;
        let mut rows = Vec::with_capacity(row_count);
        for r in 0..row_count {
            let cell_sel = format!(
                "#{grid_id} .k-grid-content tbody tr:nth-child({}) td",
                r + 1
            );
            let cell_count = self.surface.count(&cell_sel).await?;
            let mut cells = Vec::with_capacity(cell_count);
            for c in 0..cell_count {
                cells.push(self.surface.inner_text(&cell_sel, c).await.unwrap_or_default());
            }
            rows.push(cells);
        }
        Ok((headers, rows))
    }
}
