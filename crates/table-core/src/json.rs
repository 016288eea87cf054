//! Record-array discovery inside arbitrary JSON payloads.
//!
//! Captured XHR bodies rarely put the interesting rows at the top level, so
//! candidates are collected recursively and ranked by how well their key set
//! overlaps the target vocabulary.

use serde_json::Value;

use crate::model::ExtractedTable;
use crate::schema::TARGET_KEYWORDS;

/// Find the best uniform record array anywhere inside `value` and convert it
/// to a table. `None` when no array of objects exists.
pub fn best_record_array(value: &Value) -> Option<ExtractedTable> {
    let mut candidates: Vec<&Vec<Value>> = Vec::new();
    collect_candidates(value, &mut candidates);

    let best = candidates.into_iter().max_by_key(|rows| score_rows(rows))?;
    let records: Vec<serde_json::Map<String, Value>> = best
        .iter()
        .filter_map(|row| row.as_object().cloned())
        .collect();
    if records.is_empty() {
        return None;
    }
    Some(ExtractedTable::from_records(&records))
}

fn collect_candidates<'a>(value: &'a Value, out: &mut Vec<&'a Vec<Value>>) {
    match value {
        Value::Array(items) => {
            if !items.is_empty() && items.iter().all(Value::is_object) {
                out.push(items);
            }
            for item in items {
                collect_candidates(item, out);
            }
        }
        Value::Object(map) => {
            for nested in map.values() {
                collect_candidates(nested, out);
            }
        }
        _ => {}
    }
}

/// Two points per distinct key hitting a target keyword, plus one per
/// distinct key as a width tie-break.
fn score_rows(rows: &[Value]) -> usize {
    let mut keys: Vec<String> = Vec::new();
    for row in rows {
        if let Some(map) = row.as_object() {
            for key in map.keys() {
                let lower = key.to_lowercase();
                if !keys.contains(&lower) {
                    keys.push(lower);
                }
            }
        }
    }
    let keyword_hits = keys
        .iter()
        .filter(|k| TARGET_KEYWORDS.iter().any(|kw| k.contains(kw)))
        .count();
    keyword_hits * 2 + keys.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Cell;

    #[test]
    fn nested_array_with_target_keys_wins() {
        let payload: Value = serde_json::from_str(
            r#"{
                "meta": [{"page": 1}, {"page": 2}],
                "result": {"rows": [
                    {"target_name": "ABC", "uniprot": "P1"},
                    {"target_name": "DEF", "uniprot": "P2"}
                ]}
            }"#,
        )
        .unwrap();
        let table = best_record_array(&payload).expect("table");
        assert_eq!(table.column_names(), vec!["target_name", "uniprot"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.row(0)[0], &Cell::Text("ABC".into()));
    }

    #[test]
    fn scalar_payload_has_no_candidates() {
        let payload: Value = serde_json::from_str(r#"{"count": 3, "ok": true}"#).unwrap();
        assert!(best_record_array(&payload).is_none());
    }

    #[test]
    fn mixed_array_is_not_a_candidate() {
        let payload: Value = serde_json::from_str(r#"[{"a": 1}, "text"]"#).unwrap();
        assert!(best_record_array(&payload).is_none());
    }
}
