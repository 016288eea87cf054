//! Tiered extraction of the related-targets table.
//!
//! Five sources are tried in fixed order, from the most faithful (the
//! widget's own data store) to the least (captured network traffic). The
//! first tier that yields a table with at least one row wins; every result
//! carries the provenance of the tier that produced it.

use std::time::Duration;

use tracing::{debug, info, warn};

use grid_reader::{walk_all_pages, GridReader};
use surface_adapter::{NetworkExchange, PageSurface};
use table_core::{embedded, html, json, normalize_related_targets, ExtractedTable};

use crate::activate::ensure_related_targets_section;
use crate::diagnostics::DiagnosticSink;
use crate::errors::EngineError;
use crate::view::DETAIL_GRID;

/// Which tier produced the table. Ordered from most to least faithful.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Provenance {
    /// Read straight out of the widget's data store.
    KendoDataSource,
    /// Parsed from the grid-initialization payload in the page source.
    HtmlEmbedded,
    /// Paged through the live widget and scraped the rendered rows.
    DomKendo,
    /// Best-scoring table in the static DOM, frames included.
    Dom,
    /// Reconstructed from a captured XHR/fetch response.
    Xhr,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Provenance::KendoDataSource => "Kendo-DataSource",
            Provenance::HtmlEmbedded => "HTML-embedded",
            Provenance::DomKendo => "DOM-Kendo",
            Provenance::Dom => "DOM",
            Provenance::Xhr => "XHR",
        };
        f.write_str(name)
    }
}

/// A normalized table plus the tier that produced it.
#[derive(Clone, Debug)]
pub struct ExtractionResult {
    pub table: ExtractedTable,
    pub provenance: Provenance,
}

/// Run the full chain against the current page. Section activation runs
/// first but is advisory: a hidden pane does not stop the source-level
/// tiers from looking.
pub async fn extract_related_targets(
    surface: &dyn PageSurface,
    exchanges: &[NetworkExchange],
    sink: &dyn DiagnosticSink,
    timeout: Duration,
) -> Result<ExtractionResult, EngineError> {
    if let Err(err) = ensure_related_targets_section(surface, timeout).await {
        warn!(%err, "section activation failed; extraction continues");
        sink.dump(surface, "section_activation_failed").await;
    }

    if let Some(table) = from_data_source(surface).await {
        return finish(sink, table, Provenance::KendoDataSource);
    }
    if let Some(table) = from_embedded_payload(surface).await {
        return finish(sink, table, Provenance::HtmlEmbedded);
    }
    if let Some(table) = from_paged_widget(surface, timeout).await {
        return finish(sink, table, Provenance::DomKendo);
    }
    if let Some(table) = from_static_dom(surface).await {
        return finish(sink, table, Provenance::Dom);
    }
    if let Some(table) = from_exchanges(exchanges) {
        return finish(sink, table, Provenance::Xhr);
    }

    sink.dump(surface, "all_tiers_exhausted").await;
    Err(EngineError::AllTiersExhausted)
}

fn finish(
    sink: &dyn DiagnosticSink,
    table: ExtractedTable,
    provenance: Provenance,
) -> Result<ExtractionResult, EngineError> {
    let table = normalize_related_targets(table);
    info!(%provenance, rows = table.row_count(), "related targets extracted");
    sink.step(&format!(
        "extracted via {provenance}: {} rows",
        table.row_count()
    ));
    Ok(ExtractionResult { table, provenance })
}

fn non_empty(table: ExtractedTable) -> Option<ExtractedTable> {
    if table.is_empty() {
        None
    } else {
        Some(table)
    }
}

/// Tier 1: serialize the widget's data store in one evaluate round trip.
/// Complete regardless of pagination, since the store holds every page.
async fn from_data_source(surface: &dyn PageSurface) -> Option<ExtractedTable> {
    let script = format!(
        "(() => {{ \
            const grid = window.$ && $('#{DETAIL_GRID}').data('kendoGrid'); \
            if (!grid || !grid.dataSource) return null; \
            const data = grid.dataSource.data(); \
            return data.toJSON ? data.toJSON() : data; \
        }})()"
    );
    let value = match surface.evaluate(&script).await {
        Ok(value) => value,
        Err(err) => {
            debug!(%err, "data store read failed");
            return None;
        }
    };
    embedded::records_to_table(&value).and_then(non_empty)
}

/// Tier 2: the grid-initialization payload inlined in the page source.
async fn from_embedded_payload(surface: &dyn PageSurface) -> Option<ExtractedTable> {
    let html = match surface.content().await {
        Ok(html) => html,
        Err(err) => {
            debug!(%err, "page source unavailable");
            return None;
        }
    };
    embedded::extract_grid_payload(&html).and_then(non_empty)
}

/// Tier 3: drive the live widget page by page and scrape the rendered rows.
async fn from_paged_widget(surface: &dyn PageSurface, timeout: Duration) -> Option<ExtractedTable> {
    let reader = GridReader::new(surface, timeout);
    match walk_all_pages(&reader, DETAIL_GRID).await {
        Ok(table) => non_empty(table),
        Err(err) => {
            debug!(%err, "widget page walk failed");
            None
        }
    }
}

/// Tier 4: best-scoring static table in the page or any frame.
async fn from_static_dom(surface: &dyn PageSurface) -> Option<ExtractedTable> {
    let mut documents = Vec::new();
    match surface.content().await {
        Ok(html) => documents.push(html),
        Err(err) => debug!(%err, "page source unavailable"),
    }
    match surface.frame_contents().await {
        Ok(frames) => documents.extend(frames),
        Err(err) => debug!(%err, "frame contents unavailable"),
    }
    documents
        .iter()
        .find_map(|doc| html::find_related_table(doc).and_then(non_empty))
}

/// Tier 5: replay the capture log. JSON bodies go through record-array
/// scoring; HTML fragments through the same table heuristics as tier 4.
fn from_exchanges(exchanges: &[NetworkExchange]) -> Option<ExtractedTable> {
    for exchange in exchanges {
        let Some(body) = &exchange.body else {
            continue;
        };
        let looks_json = exchange.content_type.contains("json")
            || body.trim_start().starts_with(['{', '[']);
        let table = if looks_json {
            serde_json::from_str(body)
                .ok()
                .and_then(|value| json::best_record_array(&value))
        } else {
            html::find_related_table(body)
        };
        if let Some(table) = table.and_then(non_empty) {
            debug!(url = %exchange.url, "table recovered from captured traffic");
            return Some(table);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NullSink;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::{json, Value};
    use surface_adapter::{SurfaceError, WaitPolicy};
    use table_core::Cell;

    const EMBEDDED_PAGE: &str = r##"<html><body><script>
        $("#grid2").kendoGrid({dataSource:{data:[
            {"molecule_ID":"100","molecule_name":"quercetin","target_name":"PTGS2","SVM_score":"0.93"},
            {"molecule_ID":"101","molecule_name":"kaempferol","target_name":"ESR1","SVM_score":"0.81"}
        ]}});
        </script></body></html>"##;

    /// Both the widget store and the embedded payload are available; the
    /// store must win.
    struct RichDetailPage;

    #[async_trait]
    impl surface_adapter::PageSurface for RichDetailPage {
        async fn navigate(&self, _: &str, _: WaitPolicy) -> Result<(), SurfaceError> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String, SurfaceError> {
            Ok(String::new())
        }
        async fn content(&self) -> Result<String, SurfaceError> {
            Ok(EMBEDDED_PAGE.to_string())
        }
        async fn evaluate(&self, script: &str) -> Result<Value, SurfaceError> {
            if script.contains("dataSource") && script.contains("toJSON") {
                return Ok(json!([
                    {"molecule_ID": "200", "molecule_name": "store", "target_name": "AKT1"}
                ]));
            }
            if script.contains("kendoTabStrip") {
                return Ok(json!(true));
            }
            Ok(json!(null))
        }
        async fn count(&self, selector: &str) -> Result<usize, SurfaceError> {
            if selector.contains("tbody tr") {
                return Ok(1);
            }
            Ok(0)
        }
        async fn inner_text(&self, _: &str, _: usize) -> Result<String, SurfaceError> {
            Ok(String::new())
        }
        async fn attribute(
            &self,
            _: &str,
            _: usize,
            _: &str,
        ) -> Result<Option<String>, SurfaceError> {
            Ok(None)
        }
        async fn is_visible(&self, _: &str, _: usize) -> Result<bool, SurfaceError> {
            Ok(true)
        }
        async fn click(&self, _: &str, _: usize) -> Result<(), SurfaceError> {
            Ok(())
        }
        async fn fill(&self, _: &str, _: usize, _: &str) -> Result<(), SurfaceError> {
            Ok(())
        }
        async fn frame_contents(&self) -> Result<Vec<String>, SurfaceError> {
            Ok(Vec::new())
        }
        async fn screenshot(&self) -> Result<Vec<u8>, SurfaceError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn widget_store_outranks_embedded_payload() {
        let result = extract_related_targets(&RichDetailPage, &[], &NullSink, Duration::from_secs(2))
            .await
            .expect("store tier yields rows");
        assert_eq!(result.provenance, Provenance::KendoDataSource);
        assert_eq!(result.table.row_count(), 1);
        let molecule = result.table.column("molecule_ID").expect("column present");
        assert_eq!(molecule.cells[0], Cell::Int(200));
    }

    /// The widget is unreachable; the embedded payload tier takes over and
    /// the result comes out normalized.
    struct SourceOnlyPage {
        pane_visible: bool,
    }

    #[async_trait]
    impl surface_adapter::PageSurface for SourceOnlyPage {
        async fn navigate(&self, _: &str, _: WaitPolicy) -> Result<(), SurfaceError> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String, SurfaceError> {
            Ok(String::new())
        }
        async fn content(&self) -> Result<String, SurfaceError> {
            Ok(EMBEDDED_PAGE.to_string())
        }
        async fn evaluate(&self, _: &str) -> Result<Value, SurfaceError> {
            Ok(json!(null))
        }
        async fn count(&self, selector: &str) -> Result<usize, SurfaceError> {
            if selector.contains("tbody tr") {
                return Ok(1);
            }
            Ok(0)
        }
        async fn inner_text(&self, _: &str, _: usize) -> Result<String, SurfaceError> {
            Ok(String::new())
        }
        async fn attribute(
            &self,
            _: &str,
            _: usize,
            _: &str,
        ) -> Result<Option<String>, SurfaceError> {
            Ok(None)
        }
        async fn is_visible(&self, _: &str, _: usize) -> Result<bool, SurfaceError> {
            Ok(self.pane_visible)
        }
        async fn click(&self, _: &str, _: usize) -> Result<(), SurfaceError> {
            Ok(())
        }
        async fn fill(&self, _: &str, _: usize, _: &str) -> Result<(), SurfaceError> {
            Ok(())
        }
        async fn frame_contents(&self) -> Result<Vec<String>, SurfaceError> {
            Ok(Vec::new())
        }
        async fn screenshot(&self) -> Result<Vec<u8>, SurfaceError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn embedded_payload_is_second_and_normalized() {
        let page = SourceOnlyPage { pane_visible: true };
        let result = extract_related_targets(&page, &[], &NullSink, Duration::from_secs(2))
            .await
            .expect("embedded tier yields rows");
        assert_eq!(result.provenance, Provenance::HtmlEmbedded);
        assert_eq!(result.table.row_count(), 2);
        let molecule = result.table.column("molecule_ID").expect("column present");
        assert_eq!(molecule.cells[0], Cell::Int(100));
        let svm = result.table.column("SVM_score").expect("column present");
        assert_eq!(svm.cells[1], Cell::Float(0.81));
    }

    #[tokio::test]
    async fn activation_failure_does_not_stop_the_chain() {
        // Nothing ever makes the pane visible, so activation fails, but the
        // embedded payload is still in the source and must be extracted.
        let page = SourceOnlyPage {
            pane_visible: false,
        };
        let result = extract_related_targets(&page, &[], &NullSink, Duration::from_millis(300))
            .await
            .expect("extraction survives a hidden pane");
        assert_eq!(result.provenance, Provenance::HtmlEmbedded);
        assert_eq!(result.table.row_count(), 2);
    }

    #[test]
    fn capture_log_replay_scores_json_and_html() {
        let json_exchange = NetworkExchange {
            url: "https://tcmsp-e.com/api/targets".into(),
            status: 200,
            resource_kind: "xhr".into(),
            content_type: "application/json".into(),
            body: Some(
                json!({"data": [
                    {"target_name": "PTGS1", "uniprot": "P23219", "gene_symbol": "PTGS1"}
                ]})
                .to_string(),
            ),
            captured_at: Utc::now(),
        };
        let table = from_exchanges(&[json_exchange]).expect("json body yields a table");
        assert!(table.column("target_name").is_some());

        let html_exchange = NetworkExchange {
            url: "https://tcmsp-e.com/fragment".into(),
            status: 200,
            resource_kind: "xhr".into(),
            content_type: "text/html".into(),
            body: Some(
                "<h3>Related Targets</h3><table>\
                 <tr><th>target name</th><th>uniprot</th><th>gene</th></tr>\
                 <tr><td>AKT1</td><td>P31749</td><td>AKT1</td></tr></table>"
                    .into(),
            ),
            captured_at: Utc::now(),
        };
        let table = from_exchanges(&[html_exchange]).expect("html body yields a table");
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn bodiless_exchanges_are_skipped() {
        let exchange = NetworkExchange {
            url: "https://tcmsp-e.com/api/targets".into(),
            status: 200,
            resource_kind: "xhr".into(),
            content_type: "application/json".into(),
            body: None,
            captured_at: Utc::now(),
        };
        assert!(from_exchanges(&[exchange]).is_none());
    }

    #[test]
    fn provenance_labels_are_stable() {
        assert_eq!(Provenance::KendoDataSource.to_string(), "Kendo-DataSource");
        assert_eq!(Provenance::HtmlEmbedded.to_string(), "HTML-embedded");
        assert_eq!(Provenance::DomKendo.to_string(), "DOM-Kendo");
        assert_eq!(Provenance::Dom.to_string(), "DOM");
        assert_eq!(Provenance::Xhr.to_string(), "XHR");
    }
}
