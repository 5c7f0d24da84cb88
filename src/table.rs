//! Flow Table Data Model
//!
//! Source tables arrive with arbitrary, inconsistent shapes, so a table is a
//! dynamic column list over rows of typed cells. A canonical field that no
//! input column mapped to is simply absent - it is never synthesized with a
//! default value - and every consumer treats each column as optionally
//! present. All transforms produce a new table; input tables are never
//! mutated.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;

/// One typed value in a [`FlowTable`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Cell {
    Text(String),
    Time(DateTime<Utc>),
    Missing,
}

impl Cell {
    /// Text content, if this cell holds text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value parsed from text. Unparsable or non-finite values read
    /// as missing rather than erroring.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    /// Point-in-time value. Text cells are parsed on demand so analytics
    /// also work on tables that never went through normalization.
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Cell::Time(t) => Some(*t),
            Cell::Text(s) => parse_timestamp(s),
            Cell::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
}

/// An ordered collection of flow records sharing a uniform column set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl FlowTable {
    /// Empty table with the given column headers.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from already-shaped parts. Rows must match the column
    /// arity.
    pub fn from_parts(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    /// Decode delimited text into a table. Empty fields become missing cells.
    pub fn from_csv(text: &str) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row = (0..columns.len())
                .map(|i| match record.get(i) {
                    Some(v) if !v.is_empty() => Cell::Text(v.to_string()),
                    _ => Cell::Missing,
                })
                .collect();
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at (row, column name), if the column exists.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn text(&self, row: usize, column: &str) -> Option<&str> {
        self.cell(row, column).and_then(Cell::as_text)
    }

    pub fn number(&self, row: usize, column: &str) -> Option<f64> {
        self.cell(row, column).and_then(Cell::as_number)
    }

    pub fn time(&self, row: usize, column: &str) -> Option<DateTime<Utc>> {
        self.cell(row, column).and_then(Cell::as_time)
    }

    /// Zero-row table with the same column headers.
    pub fn empty_like(&self) -> Self {
        Self::new(self.columns.clone())
    }

    /// New table holding only the given row indices, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let rows = indices
            .iter()
            .filter_map(|&i| self.rows.get(i).cloned())
            .collect();
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Concatenate tables, aligning columns by name (first-seen order).
    /// Cells for columns a source table lacks are marked missing.
    pub fn concat<I>(tables: I) -> Self
    where
        I: IntoIterator<Item = FlowTable>,
    {
        let mut columns: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut collected: Vec<FlowTable> = Vec::new();
        for table in tables {
            for column in &table.columns {
                if !index.contains_key(column) {
                    index.insert(column.clone(), columns.len());
                    columns.push(column.clone());
                }
            }
            collected.push(table);
        }

        let mut rows = Vec::new();
        for table in collected {
            let map: Vec<usize> = table.columns.iter().map(|c| index[c]).collect();
            for row in table.rows {
                let mut out = vec![Cell::Missing; columns.len()];
                for (i, cell) in row.into_iter().enumerate() {
                    out[map[i]] = cell;
                }
                rows.push(out);
            }
        }
        Self { columns, rows }
    }
}

/// Parse a timestamp in any of the formats seen in flow log exports.
///
/// Naive values are assumed UTC. Returns `None` for anything unparsable -
/// the value becomes missing for that row, never a pipeline failure.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}
