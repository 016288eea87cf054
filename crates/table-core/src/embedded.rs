//! Recovery of the grid's inline initialization payload from page source.
//!
//! The detail page seeds its grid with a literal `data: [...]` array inside
//! the widget construction call. The array can nest arrays and objects, so
//! the end of the payload is found by balanced-bracket scanning (string
//! aware) and the slice is then handed to a strict JSON parse.

use serde_json::Value;
use tracing::debug;

use crate::model::ExtractedTable;

const GRID_MARKERS: [&str; 3] = [
    r##"$("#grid2").kendoGrid("##,
    r##"$('#grid2').kendoGrid("##,
    r##"grid2").kendoGrid("##,
];

/// Scan raw HTML for the grid2 construction snippet and parse its inline
/// data array. Returns `None` on any structural mismatch; never panics on
/// hostile input.
pub fn extract_grid_payload(html: &str) -> Option<ExtractedTable> {
    let start = GRID_MARKERS.iter().find_map(|marker| html.find(marker))?;
    let segment = &html[start..];

    let ds_idx = segment.find("dataSource")?;
    let data_idx = segment[ds_idx..].find("data:")? + ds_idx;
    let array_start = segment[data_idx..].find('[')? + data_idx;
    let array_end = balanced_array_end(&segment[array_start..])? + array_start;

    let json_text = &segment[array_start..=array_end];
    let value: Value = match serde_json::from_str(json_text) {
        Ok(value) => value,
        Err(err) => {
            debug!(%err, "inline grid payload is not strict JSON");
            return None;
        }
    };
    records_to_table(&value)
}

/// Convert a JSON array of uniform objects into a table. Any non-object
/// entry disqualifies the whole array.
pub fn records_to_table(value: &Value) -> Option<ExtractedTable> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    let mut records = Vec::with_capacity(items.len());
    for item in items {
        records.push(item.as_object()?.clone());
    }
    Some(ExtractedTable::from_records(&records))
}

/// Index of the `]` closing the array that opens at byte 0 of `segment`.
/// Tracks string literals so brackets inside values do not unbalance the
/// scan.
fn balanced_array_end(segment: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in segment.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Cell;

    const PAGE: &str = r##"<script>
        $("#grid2").kendoGrid({
            dataSource: {
                data: [{"molecule_ID":"1","target_name":"ABC","SVM_score":"0.8"},
                       {"molecule_ID":"2","target_name":"D]E","SVM_score":""}],
                pageSize: 10
            },
            sortable: true
        });
    </script>"##;

    #[test]
    fn extracts_inline_payload() {
        let table = extract_grid_payload(PAGE).expect("payload");
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.column_names(),
            vec!["molecule_ID", "target_name", "SVM_score"]
        );
        // Bracket inside a string value must not end the scan early.
        assert_eq!(table.row(1)[1], &Cell::Text("D]E".into()));
    }

    #[test]
    fn missing_marker_yields_none() {
        assert!(extract_grid_payload("<html><body>no grid</body></html>").is_none());
    }

    #[test]
    fn non_json_payload_yields_none() {
        let page = r##"$("#grid2").kendoGrid({ dataSource: { data: [ {bad: unquoted} ] } })"##;
        assert!(extract_grid_payload(page).is_none());
    }

    #[test]
    fn non_object_entries_disqualify() {
        let value: Value = serde_json::from_str(r#"[{"a":1}, 2]"#).unwrap();
        assert!(records_to_table(&value).is_none());
    }

    #[test]
    fn balanced_scan_handles_nesting() {
        assert_eq!(balanced_array_end(r#"[[1,2],[3,[4]]] extra"#), Some(14));
        assert_eq!(balanced_array_end(r#"[ "a]b", 1 ]"#), Some(11));
        assert_eq!(balanced_array_end("[ unterminated"), None);
    }
}
