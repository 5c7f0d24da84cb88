//! Aggregation Engine
//!
//! Pure traffic analytics over normalized flow tables: top-N grouped sums,
//! denied-flow filtering and hourly flow counts. Nothing here mutates its
//! input, and "no matching data" conditions (absent columns, empty tables)
//! return empty, correctly shaped results rather than errors.

pub mod persistence;
pub mod spikes;


use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::table::FlowTable;

pub use persistence::{persistent_connections, PersistenceRecord};
pub use spikes::detect_spikes;

/// Decisions counted as denied or dropped traffic.
static DENY_RE: Lazy<Regex> = Lazy::new(|| Regex::new("(?i)deny|drop|dropped").unwrap());

/// Grouped sums sorted descending by measure, truncated to N.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationResult {
    pub key_column: String,
    pub measure_column: String,
    /// (group key, summed measure) pairs, largest first.
    pub rows: Vec<(String, f64)>,
}

impl AggregationResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Hourly flow counts, ascending by bucket, occupied hours only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HourlySeries {
    pub points: Vec<(DateTime<Utc>, u64)>,
}

impl HourlySeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Group rows by `group_key`, sum `measure` per group, return the top `n`.
///
/// Rows lacking the key form no group. Missing measure values contribute
/// nothing to their group's sum. Ties keep first-encountered group order
/// (stable sort). Empty input gives an empty result that still carries the
/// requested column names.
pub fn top_n(table: &FlowTable, group_key: &str, measure: &str, n: usize) -> AggregationResult {
    let mut sums: HashMap<String, f64> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for row in 0..table.len() {
        let key = match table.text(row, group_key) {
            Some(k) if !k.is_empty() => k.to_string(),
            _ => continue,
        };
        if !sums.contains_key(&key) {
            order.push(key.clone());
        }
        let entry = sums.entry(key).or_insert(0.0);
        if let Some(value) = table.number(row, measure) {
            *entry += value;
        }
    }

    let mut rows: Vec<(String, f64)> = order
        .into_iter()
        .map(|key| {
            let sum = sums[&key];
            (key, sum)
        })
        .collect();
    rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    rows.truncate(n);

    AggregationResult {
        key_column: group_key.to_string(),
        measure_column: measure.to_string(),
        rows,
    }
}

/// Sources contributing the most `bytes`, largest first.
pub fn top_talkers(table: &FlowTable, n: usize) -> AggregationResult {
    top_n(table, "src_ip", "bytes", n)
}

/// Destinations receiving the most `bytes`, largest first.
pub fn top_listeners(table: &FlowTable, n: usize) -> AggregationResult {
    top_n(table, "dst_ip", "bytes", n)
}

/// Rows whose decision reads as denied or dropped (case-insensitive
/// substring match). A table without a `flow_decision` column yields an
/// empty table with the same headers.
pub fn denied_flows(table: &FlowTable) -> FlowTable {
    if !table.has_column("flow_decision") {
        return table.empty_like();
    }
    let keep: Vec<usize> = (0..table.len())
        .filter(|&row| {
            table
                .text(row, "flow_decision")
                .map_or(false, |d| DENY_RE.is_match(d))
        })
        .collect();
    table.select_rows(&keep)
}

/// Flow counts per hour bucket, ascending. Rows with a missing or
/// unparsable timestamp are excluded from the count.
pub fn flows_per_hour(table: &FlowTable) -> HourlySeries {
    if !table.has_column("timestamp") {
        return HourlySeries::default();
    }
    let mut counts: BTreeMap<DateTime<Utc>, u64> = BTreeMap::new();
    for row in 0..table.len() {
        let ts = match table.time(row, "timestamp") {
            Some(t) => t,
            None => continue,
        };
        let bucket = match floor_timestamp(ts, 3600) {
            Some(b) => b,
            None => continue,
        };
        *counts.entry(bucket).or_insert(0) += 1;
    }
    HourlySeries {
        points: counts.into_iter().collect(),
    }
}

/// Floor a timestamp to a multiple of `width_secs` since the Unix epoch.
pub(crate) fn floor_timestamp(ts: DateTime<Utc>, width_secs: i64) -> Option<DateTime<Utc>> {
    if width_secs <= 0 {
        return None;
    }
    let secs = ts.timestamp();
    let floored = secs - secs.rem_euclid(width_secs);
    Utc.timestamp_opt(floored, 0).single()
}
