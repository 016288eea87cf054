//! Raw-HTML table recovery via `scraper`.
//!
//! These helpers never fail on malformed markup: a table that cannot be read
//! comes back empty and the caller moves on to the next source.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::model::ExtractedTable;
use crate::schema::{collapse_whitespace, normalize_headers, TARGET_KEYWORDS};

fn selector(css: &str) -> Selector {
    // Selectors in this module are static strings; a parse failure is a
    // programming error, not a data error.
    Selector::parse(css).expect("static selector")
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Convert one `<table>` element into rows. Prefers the structured
/// `thead`/`tbody` layout; degrades to a flat `tr` walk with the first row
/// treated as headers.
pub fn table_to_rows(table: ElementRef<'_>) -> ExtractedTable {
    let header_sel = selector("thead tr th, thead tr td");
    let body_row_sel = selector("tbody tr");
    let cell_sel = selector("td, th");

    let headers: Vec<String> = table.select(&header_sel).map(element_text).collect();
    if !headers.is_empty() {
        let rows: Vec<Vec<String>> = table
            .select(&body_row_sel)
            .map(|row| row.select(&cell_sel).map(element_text).collect())
            .filter(|cells: &Vec<String>| !cells.is_empty())
            .collect();
        if !rows.is_empty() {
            return ExtractedTable::from_rows(normalize_headers(&headers), rows);
        }
    }

    // Fallback: every <tr> in document order, first row as headers.
    let row_sel = selector("tr");
    let mut all_rows: Vec<Vec<String>> = table
        .select(&row_sel)
        .map(|row| row.select(&cell_sel).map(element_text).collect())
        .filter(|cells: &Vec<String>| !cells.is_empty())
        .collect();
    if all_rows.is_empty() {
        return ExtractedTable::new();
    }
    let headers = all_rows.remove(0);
    ExtractedTable::from_rows(normalize_headers(&headers), all_rows)
}

/// Parse the first `<table>` found in an HTML fragment.
pub fn parse_table_fragment(html: &str) -> ExtractedTable {
    let doc = Html::parse_fragment(html);
    let table_sel = selector("table");
    match doc.select(&table_sel).next() {
        Some(table) => table_to_rows(table),
        None => ExtractedTable::new(),
    }
}

/// Keyword score for a candidate table: +3 per header hitting a target
/// keyword, +2 per header containing "target".
pub fn score_table(table: ElementRef<'_>) -> i32 {
    let th_sel = selector("th");
    let headers: Vec<String> = table
        .select(&th_sel)
        .map(|th| element_text(th).to_lowercase())
        .collect();
    let mut score = 0;
    for header in &headers {
        for keyword in TARGET_KEYWORDS {
            if header.contains(keyword) {
                score += 3;
            }
        }
    }
    for header in &headers {
        if header.contains("target") {
            score += 2;
        }
    }
    score
}

fn matches_related_caption(text: &str) -> bool {
    let squeezed: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    squeezed.contains("relatedtargets") || squeezed.contains("相关靶点")
}

/// Locate the related-targets table in a full document: the first table
/// following a matching caption, else the highest-scoring table if its score
/// reaches the acceptance threshold of 3.
pub fn find_related_table(html: &str) -> Option<ExtractedTable> {
    let doc = Html::parse_document(html);
    let mut caption_seen = false;
    for node in doc.root_element().descendants() {
        if let Some(text) = node.value().as_text() {
            if matches_related_caption(&text.text) {
                caption_seen = true;
            }
            continue;
        }
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        if caption_seen && element.value().name() == "table" {
            let table = table_to_rows(element);
            if !table.is_empty() {
                return Some(table);
            }
            caption_seen = false;
        }
    }

    let table_sel = selector("table");
    let best = doc
        .select(&table_sel)
        .map(|t| (score_table(t), t))
        .max_by_key(|(score, _)| *score)?;
    if best.0 >= 3 {
        debug!(score = best.0, "accepting best-scoring table");
        let table = table_to_rows(best.1);
        if !table.is_empty() {
            return Some(table);
        }
    }
    None
}

/// Recover the drill-down href from raw list-page markup: inside `#grid`,
/// the first data row's cell under the header containing "latin name".
pub fn latin_name_href(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let grid_sel = selector("#grid");
    let grid = doc.select(&grid_sel).next()?;

    let header_sel = selector(".k-grid-header th");
    let latin_idx = grid
        .select(&header_sel)
        .position(|th| element_text(th).to_lowercase().contains("latin name"))?;

    let row_sel = selector(".k-grid-content tbody tr");
    let first_row = grid.select(&row_sel).next()?;
    let cell_sel = selector("td");
    let cell = first_row.select(&cell_sel).nth(latin_idx)?;
    let anchor_sel = selector("a[href]");
    let anchor = cell.select(&anchor_sel).next()?;
    anchor.value().attr("href").map(|h| h.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Cell;

    #[test]
    fn structured_table_round_trips_header_arity() {
        let html = r#"<table>
            <thead><tr><th>id</th><th>id</th><th>name</th></tr></thead>
            <tbody><tr><td>1</td><td>2</td><td>abc</td></tr></tbody>
        </table>"#;
        let table = parse_table_fragment(html);
        assert_eq!(table.column_names(), vec!["id", "id_2", "name"]);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.row(0).len(), 3);
    }

    #[test]
    fn headerless_table_uses_first_row() {
        let html = "<table><tr><td>h1</td><td>h2</td></tr><tr><td>a</td><td>b</td></tr></table>";
        let table = parse_table_fragment(html);
        assert_eq!(table.column_names(), vec!["h1", "h2"]);
        assert_eq!(table.row(0)[0], &Cell::Text("a".into()));
    }

    #[test]
    fn malformed_html_yields_empty_table() {
        let table = parse_table_fragment("<div><span>no table here");
        assert!(table.is_empty());
        assert_eq!(table.width(), 0);
    }

    #[test]
    fn caption_wins_over_scoring() {
        let html = r#"<html><body>
            <h3>Something else</h3>
            <table><tr><th>target_name</th></tr><tr><td>decoy</td></tr></table>
            <h3>Related Targets</h3>
            <table><tr><th>plain</th></tr><tr><td>wanted</td></tr></table>
        </body></html>"#;
        let table = find_related_table(html).expect("table");
        assert_eq!(table.row(0)[0], &Cell::Text("wanted".into()));
    }

    #[test]
    fn scoring_requires_threshold() {
        let weak = r#"<html><body>
            <table><tr><th>alpha</th><th>beta</th></tr><tr><td>1</td><td>2</td></tr></table>
        </body></html>"#;
        assert!(find_related_table(weak).is_none());

        let strong = r#"<html><body>
            <table><tr><th>target_name</th><th>uniprot</th></tr><tr><td>x</td><td>y</td></tr></table>
        </body></html>"#;
        let table = find_related_table(strong).expect("table");
        assert_eq!(table.column_names(), vec!["target_name", "uniprot"]);
    }

    #[test]
    fn chinese_caption_matches() {
        let html = r#"<html><body>
            <span>相关靶点</span>
            <table><tr><th>a</th></tr><tr><td>b</td></tr></table>
        </body></html>"#;
        assert!(find_related_table(html).is_some());
    }

    #[test]
    fn latin_href_found_by_header_index() {
        let html = r#"<html><body><div id="grid">
            <div class="k-grid-header"><table><tr>
                <th>MOL ID</th><th>Chinese Name</th><th>Latin Name</th>
            </tr></table></div>
            <div class="k-grid-content"><table><tbody><tr>
                <td>1</td><td>甘草</td><td><a href="browse.php?qc=herbs&amp;qsr=licorice">Glycyrrhiza</a></td>
            </tr></tbody></table></div>
        </div></body></html>"#;
        assert_eq!(
            latin_name_href(html).as_deref(),
            Some("browse.php?qc=herbs&qsr=licorice")
        );
    }

    #[test]
    fn latin_href_absent_without_latin_header() {
        let html = r#"<div id="grid">
            <div class="k-grid-header"><table><tr><th>Name</th></tr></table></div>
            <div class="k-grid-content"><table><tbody><tr>
                <td><a href="x.php">x</a></td>
            </tr></tbody></table></div>
        </div>"#;
        assert!(latin_name_href(html).is_none());
    }
}
