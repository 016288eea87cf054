//! Column-ordered table model shared by every extraction tier.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single cell with its declared type. `Missing` covers both absent cells
/// and values that failed a numeric coercion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
    Missing,
}

impl Cell {
    /// Raw display form, used for dedup keys and CSV export.
    pub fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) => v.to_string(),
            Cell::Missing => String::new(),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Lossy conversion from a JSON scalar. Objects and arrays are rendered
    /// through their JSON form so no payload value is ever dropped.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Missing,
            Value::Bool(b) => Cell::Text(b.to_string()),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Cell::Int(i)
                } else {
                    n.as_f64().map(Cell::Float).unwrap_or(Cell::Missing)
                }
            }
            Value::String(s) => {
                if s.is_empty() {
                    Cell::Missing
                } else {
                    Cell::Text(s.clone())
                }
            }
            other => Cell::Text(other.to_string()),
        }
    }
}

/// One named column. Insertion order of columns inside a table is
/// significant: it encodes the output schema order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

/// Rectangular table. Every column holds exactly `row_count` cells; rows
/// shorter than the header set are right-padded with `Missing`, longer rows
/// are truncated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTable {
    columns: Vec<Column>,
}

impl ExtractedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a header row plus data rows of raw strings.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column {
                name,
                cells: Vec::with_capacity(rows.len()),
            })
            .collect();
        for mut row in rows {
            row.truncate(width);
            while row.len() < width {
                row.push(String::new());
            }
            for (column, value) in columns.iter_mut().zip(row) {
                let cell = if value.is_empty() {
                    Cell::Missing
                } else {
                    Cell::Text(value)
                };
                column.cells.push(cell);
            }
        }
        Self { columns }
    }

    /// Build from uniform JSON records, columns ordered by first appearance
    /// of each key across the record set.
    pub fn from_records(records: &[serde_json::Map<String, Value>]) -> Self {
        let mut names: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
        let mut columns: Vec<Column> = names
            .iter()
            .map(|name| Column {
                name: name.clone(),
                cells: Vec::with_capacity(records.len()),
            })
            .collect();
        for record in records {
            for (column, name) in columns.iter_mut().zip(&names) {
                let cell = record.get(name).map(Cell::from_json).unwrap_or(Cell::Missing);
                column.cells.push(cell);
            }
        }
        Self { columns }
    }

    /// Empty table carrying only the given headers.
    pub fn headers_only(headers: &[&str]) -> Self {
        Self {
            columns: headers
                .iter()
                .map(|name| Column {
                    name: (*name).to_string(),
                    cells: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.cells.len()).unwrap_or(0)
    }

    /// A table with headers but zero rows still counts as empty for the
    /// extraction chain: a tier must yield data to win.
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn row(&self, index: usize) -> Vec<&Cell> {
        self.columns.iter().map(|c| &c.cells[index]).collect()
    }

    /// Raw string form of one row, in column order.
    pub fn row_display(&self, index: usize) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.cells[index].display())
            .collect()
    }

    /// Reorder columns to the given name order; names not present in the
    /// table are skipped, table columns not named are appended in their
    /// current relative order.
    pub fn reorder(&mut self, front: &[&str]) {
        let mut reordered: Vec<Column> = Vec::with_capacity(self.columns.len());
        for name in front {
            if let Some(pos) = self.columns.iter().position(|c| &c.name == name) {
                reordered.push(self.columns.remove(pos));
            }
        }
        reordered.append(&mut self.columns);
        self.columns = reordered;
    }

    /// Restrict and order columns to exactly the reference set. Names the
    /// table lacks become all-missing columns of the right length.
    pub fn align_to(&mut self, names: &[String]) {
        let rows = self.row_count();
        let mut aligned: Vec<Column> = Vec::with_capacity(names.len());
        for name in names {
            if let Some(pos) = self.columns.iter().position(|c| &c.name == name) {
                aligned.push(self.columns.remove(pos));
            } else {
                aligned.push(Column {
                    name: name.clone(),
                    cells: vec![Cell::Missing; rows],
                });
            }
        }
        self.columns = aligned;
    }
}
