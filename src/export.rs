//! CSV persistence for extracted tables.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use table_core::ExtractedTable;

/// Write the table as CSV, headers first, cells in raw display form.
pub fn write_csv(table: &ExtractedTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    writer
        .write_record(table.column_names())
        .context("writing header row")?;
    for r in 0..table.row_count() {
        writer
            .write_record(table.row_display(r))
            .with_context(|| format!("writing row {r}"))?;
    }
    writer.flush().context("flushing csv")?;
    info!(path = %path.display(), rows = table.row_count(), "table written");
    Ok(())
}

/// Read a previously written table back. All cells come back as raw text;
/// the comparison path re-applies type coercion afterwards.
pub fn read_csv(path: &Path) -> Result<ExtractedTable> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading header row")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("reading data row")?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }
    Ok(ExtractedTable::from_rows(headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use table_core::Cell;

    #[test]
    fn written_table_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Success1.csv");
        let table = ExtractedTable::from_rows(
            vec!["molecule_ID".into(), "target_name".into()],
            vec![
                vec!["100".into(), "PTGS2".into()],
                vec!["".into(), "ESR1".into()],
            ],
        );
        write_csv(&table, &path).unwrap();

        let back = read_csv(&path).unwrap();
        assert_eq!(back.column_names(), vec!["molecule_ID", "target_name"]);
        assert_eq!(back.row_count(), 2);
        assert_eq!(back.row(0)[1], &Cell::Text("PTGS2".into()));
        assert_eq!(back.row(1)[0], &Cell::Missing);
    }

    #[test]
    fn headers_only_table_writes_just_the_header_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let table = ExtractedTable::headers_only(&["a", "b"]);
        write_csv(&table, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), "a,b");
        let back = read_csv(&path).unwrap();
        assert!(back.is_empty());
        assert_eq!(back.width(), 2);
    }
}
