//! Persistent Connection Detection
//!
//! Buckets flows into fixed-width time windows and flags endpoint tuples
//! recurring at or above a minimum occurrence count within one window -
//! the long-lived, repetitive connections that stand out from ordinary
//! traffic churn.

use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;

use crate::table::FlowTable;

use super::floor_timestamp;

/// One recurring connection tuple inside one time window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistenceRecord {
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: String,
    pub window_start: DateTime<Utc>,
    pub occurrences: u64,
}

/// Find (src_ip, dst_ip, src_port, dst_port, protocol) tuples seen at least
/// `min_occurrences` times within one window of width `window`.
///
/// Rows missing any grouping component - timestamp, either address, either
/// port or the protocol - cannot form a complete tuple and are excluded.
/// Results are ordered by window start, then tuple, for stable output.
pub fn persistent_connections(
    table: &FlowTable,
    min_occurrences: u64,
    window: Duration,
) -> Vec<PersistenceRecord> {
    let width = window.num_seconds();
    if width <= 0 || table.is_empty() {
        return Vec::new();
    }

    type Key = (String, String, u16, u16, String, i64);
    let mut counts: HashMap<Key, u64> = HashMap::new();

    for row in 0..table.len() {
        let ts = match table.time(row, "timestamp") {
            Some(t) => t,
            None => continue,
        };
        let src_ip = match table.text(row, "src_ip") {
            Some(v) => v.to_string(),
            None => continue,
        };
        let dst_ip = match table.text(row, "dst_ip") {
            Some(v) => v.to_string(),
            None => continue,
        };
        let src_port = match table.text(row, "src_port").and_then(parse_port) {
            Some(p) => p,
            None => continue,
        };
        let dst_port = match table.text(row, "dst_port").and_then(parse_port) {
            Some(p) => p,
            None => continue,
        };
        let protocol = match table.text(row, "protocol") {
            Some(v) => v.to_string(),
            None => continue,
        };
        let bucket = match floor_timestamp(ts, width) {
            Some(b) => b.timestamp(),
            None => continue,
        };

        *counts
            .entry((src_ip, dst_ip, src_port, dst_port, protocol, bucket))
            .or_insert(0) += 1;
    }

    let mut records: Vec<PersistenceRecord> = counts
        .into_iter()
        .filter(|(_, count)| *count >= min_occurrences)
        .filter_map(|((src_ip, dst_ip, src_port, dst_port, protocol, bucket), occurrences)| {
            let window_start = Utc.timestamp_opt(bucket, 0).single()?;
            Some(PersistenceRecord {
                src_ip,
                dst_ip,
                src_port,
                dst_port,
                protocol,
                window_start,
                occurrences,
            })
        })
        .collect();

    records.sort_by(|a, b| {
        (
            a.window_start,
            &a.src_ip,
            &a.dst_ip,
            a.src_port,
            a.dst_port,
            &a.protocol,
        )
            .cmp(&(
                b.window_start,
                &b.src_ip,
                &b.dst_ip,
                b.src_port,
                b.dst_port,
                &b.protocol,
            ))
    });
    records
}

fn parse_port(raw: &str) -> Option<u16> {
    raw.trim().parse().ok()
}
