//! Typed normalization toward the canonical schema, plus reference
//! comparison.

use tracing::debug;

use crate::model::{Cell, Column, ExtractedTable};
use crate::schema::RELATED_COLUMNS;

const INT_COLUMNS: [&str; 2] = ["molecule_ID", "target_ID"];
const FLOAT_COLUMNS: [&str; 2] = ["SVM_score", "RF_score"];

/// Declared type of a whole column, inferred from its non-missing cells.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dtype {
    Int,
    Float,
    Text,
}

pub fn column_dtype(column: &Column) -> Dtype {
    let mut any = false;
    let mut all_int = true;
    let mut all_float = true;
    for cell in &column.cells {
        match cell {
            Cell::Missing => {}
            Cell::Int(_) => {
                any = true;
                all_float = false;
            }
            Cell::Float(_) => {
                any = true;
                all_int = false;
            }
            Cell::Text(_) => {
                any = true;
                all_int = false;
                all_float = false;
            }
        }
    }
    match (any, all_int, all_float) {
        (false, _, _) => Dtype::Text,
        (true, true, _) => Dtype::Int,
        (true, _, true) => Dtype::Float,
        _ => Dtype::Text,
    }
}

fn parse_int(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::Int(v) => Some(*v),
        Cell::Float(v) if v.fract() == 0.0 => Some(*v as i64),
        Cell::Text(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn parse_float(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Int(v) => Some(*v as f64),
        Cell::Float(v) => Some(*v),
        Cell::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn coerce_int_strict(column: &mut Column) {
    // Identifier columns become integers only when every value parses
    // cleanly; otherwise the column is left untouched.
    let parsed: Option<Vec<i64>> = column.cells.iter().map(parse_int).collect();
    if let Some(values) = parsed {
        column.cells = values.into_iter().map(Cell::Int).collect();
    } else {
        debug!(column = %column.name, "identifier column not cleanly integral; left as-is");
    }
}

fn coerce_float_lossy(column: &mut Column) {
    for cell in &mut column.cells {
        *cell = match parse_float(cell) {
            Some(v) => Cell::Float(v),
            None => Cell::Missing,
        };
    }
}

fn blank_to_missing(column: &mut Column) {
    for cell in &mut column.cells {
        if matches!(cell, Cell::Text(s) if s.trim().is_empty()) {
            *cell = Cell::Missing;
        }
    }
}

/// Apply the canonical typing rules and column order: identifier columns to
/// int (strict), score columns to float (lossy), `validated` kept as text
/// with blanks as missing, canonical columns fronted, extras appended in
/// their original relative order.
pub fn normalize_related_targets(mut table: ExtractedTable) -> ExtractedTable {
    for name in INT_COLUMNS {
        if let Some(column) = table.column_mut(name) {
            blank_to_missing(column);
            coerce_int_strict(column);
        }
    }
    for name in FLOAT_COLUMNS {
        if let Some(column) = table.column_mut(name) {
            coerce_float_lossy(column);
        }
    }
    if let Some(column) = table.column_mut("validated") {
        blank_to_missing(column);
    }
    table.reorder(&RELATED_COLUMNS);
    table
}

/// Strict reference comparison: normalize both sides, align the candidate to
/// the reference's column order/set, coerce candidate columns to the
/// reference's dtypes, then require exact equality including missing-value
/// positions. Reported as a plain bool; diffing belongs to a higher layer.
pub fn compare_with_reference(candidate: &ExtractedTable, reference: &ExtractedTable) -> bool {
    let mut candidate = normalize_related_targets(candidate.clone());
    let reference = normalize_related_targets(reference.clone());

    let ref_names: Vec<String> = reference
        .column_names()
        .into_iter()
        .map(|n| n.to_string())
        .collect();
    candidate.align_to(&ref_names);

    for name in &ref_names {
        let Some(ref_col) = reference.column(name) else {
            continue;
        };
        let dtype = column_dtype(ref_col);
        if let Some(col) = candidate.column_mut(name) {
            match dtype {
                Dtype::Int => coerce_int_strict(col),
                Dtype::Float => coerce_float_lossy(col),
                Dtype::Text => {
                    for cell in &mut col.cells {
                        if !cell.is_missing() {
                            *cell = Cell::Text(cell.display());
                        }
                    }
                }
            }
        }
    }

    candidate == reference
}
