//! Canonical related-targets schema and header hygiene.

/// The business column set, in output order. Columns matching these names are
/// fronted in this order; anything else is appended after, order preserved.
pub const RELATED_COLUMNS: [&str; 9] = [
    "molecule_ID",
    "MOL_ID",
    "molecule_name",
    "target_name",
    "target_ID",
    "drugbank_ID",
    "validated",
    "SVM_score",
    "RF_score",
];

/// Header keywords used when scoring candidate tables.
pub const TARGET_KEYWORDS: [&str; 5] = ["target", "protein", "uniprot", "gene", "symbol"];

/// Fixed ordered view of the expected business columns.
#[derive(Clone, Copy, Debug, Default)]
pub struct CanonicalSchema;

impl CanonicalSchema {
    pub fn columns() -> &'static [&'static str] {
        &RELATED_COLUMNS
    }

    pub fn contains(name: &str) -> bool {
        RELATED_COLUMNS.iter().any(|c| *c == name)
    }
}

/// Collapse internal whitespace, trim, and make duplicate headers unique by
/// suffixing repeats with `_2`, `_3`, ... (case-insensitive collision key).
pub fn normalize_headers(headers: &[String]) -> Vec<String> {
    let mut seen: Vec<(String, usize)> = Vec::new();
    let mut cleaned = Vec::with_capacity(headers.len());
    for raw in headers {
        let mut header = collapse_whitespace(raw);
        if header.is_empty() {
            header = "col".to_string();
        }
        let key = header.to_lowercase();
        let count = match seen.iter_mut().find(|(k, _)| *k == key) {
            Some((_, count)) => {
                *count += 1;
                *count
            }
            None => {
                seen.push((key, 1));
                1
            }
        };
        if count > 1 {
            header = format!("{}_{}", header, count);
        }
        cleaned.push(header);
    }
    cleaned
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
