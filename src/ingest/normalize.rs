//! Schema Normalization
//!
//! Vendor exports disagree on column naming (`Src_IP`, `sourceip`, `src`,
//! ...). Normalization maps whatever arrives onto the canonical schema the
//! analytics depend on, via case-insensitive alias lists with first-match
//! priority. A canonical column with no matching alias stays absent; columns
//! with no canonical mapping pass through unchanged.

use std::collections::HashMap;

use crate::table::{parse_timestamp, Cell, FlowTable};

/// Canonical column names with their accepted aliases, in priority order.
///
/// The canonical name itself is always the highest-priority alias, which is
/// what makes normalization idempotent.
pub const CANONICAL_ALIASES: &[(&str, &[&str])] = &[
    ("subscription", &["subscription", "subscription_id", "subscriptionid"]),
    ("resource_group", &["resource_group", "resourcegroup", "rg"]),
    ("nsg_name", &["nsg_name", "nsgname", "nsg"]),
    ("src_ip", &["src_ip", "sourceip", "src", "source_ip", "srcip"]),
    ("dst_ip", &["dst_ip", "destinationip", "dst", "destination_ip", "dstip"]),
    ("src_port", &["src_port", "sourceport", "sport"]),
    ("dst_port", &["dst_port", "destinationport", "dport"]),
    ("protocol", &["protocol", "proto"]),
    ("flow_decision", &["flow_decision", "decision", "action"]),
    ("flow_state", &["flow_state", "state"]),
    ("packets", &["packets", "packet_count", "pkt"]),
    ("bytes", &["bytes", "byte_count", "octets"]),
    ("timestamp", &["timestamp", "time", "time_generated"]),
];

/// Map a table's columns onto the canonical schema.
///
/// Pure function: returns a new table, the input is untouched. For each
/// canonical name the first alias present in the input (case-insensitive)
/// is renamed to the canonical name; remaining columns keep their original
/// names. If a canonical `timestamp` column exists after renaming, every
/// value is coerced to a typed point in time; unparsable values become
/// missing for that row rather than failing the table.
pub fn normalize(table: &FlowTable) -> FlowTable {
    // Case-insensitive index of the input columns, first occurrence wins.
    let mut lower: HashMap<String, usize> = HashMap::new();
    for (i, column) in table.columns().iter().enumerate() {
        lower.entry(column.to_lowercase()).or_insert(i);
    }

    let mut renames: HashMap<usize, &str> = HashMap::new();
    for (canonical, aliases) in CANONICAL_ALIASES {
        // A verbatim canonical column always wins; renaming a lower-priority
        // alias next to it would duplicate the name.
        if table.columns().iter().any(|c| c == canonical) {
            continue;
        }
        for alias in *aliases {
            if let Some(&idx) = lower.get(*alias) {
                if table.columns()[idx] != *canonical {
                    renames.insert(idx, *canonical);
                }
                break;
            }
        }
    }

    let mut columns = table.columns().to_vec();
    for (&idx, &canonical) in &renames {
        columns[idx] = canonical.to_string();
    }

    let mut rows = table.rows().to_vec();
    if let Some(ts) = columns.iter().position(|c| c == "timestamp") {
        for row in &mut rows {
            row[ts] = match &row[ts] {
                Cell::Time(t) => Cell::Time(*t),
                Cell::Text(s) => match parse_timestamp(s) {
                    Some(t) => Cell::Time(t),
                    None => Cell::Missing,
                },
                Cell::Missing => Cell::Missing,
            };
        }
    }

    FlowTable::from_parts(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_normalize_columns() {
        let table = FlowTable::from_csv(
            "Src_IP,Dst_IP,timestamp\n1.1.1.1,2.2.2.2,2025-01-01T00:00:00Z\n",
        )
        .unwrap();
        let normalized = normalize(&table);

        assert!(normalized.has_column("src_ip"));
        assert!(normalized.has_column("dst_ip"));
        assert_eq!(
            normalized.time(0, "timestamp"),
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
        // input untouched
        assert!(table.has_column("Src_IP"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let table = FlowTable::from_csv(
            "sourceip,destinationport,action,time\n1.1.1.1,443,Allow,2025-01-01 10:00:00\n",
        )
        .unwrap();
        let once = normalize(&table);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_never_fabricates_columns() {
        let table = FlowTable::from_csv("vendor_field,another\nx,y\n").unwrap();
        let normalized = normalize(&table);
        assert_eq!(normalized.columns(), &["vendor_field", "another"]);
    }

    #[test]
    fn test_unknown_columns_pass_through() {
        let table = FlowTable::from_csv("src,vendor_tag\n1.1.1.1,edge-7\n").unwrap();
        let normalized = normalize(&table);
        assert!(normalized.has_column("src_ip"));
        assert_eq!(normalized.text(0, "vendor_tag"), Some("edge-7"));
    }

    #[test]
    fn test_alias_priority_is_first_match() {
        // Both "sourceip" and "src" alias src_ip; "sourceip" has priority,
        // and "src" must survive untouched - no duplicated column.
        let table = FlowTable::from_csv("sourceip,src\n1.1.1.1,9.9.9.9\n").unwrap();
        let normalized = normalize(&table);
        assert_eq!(normalized.columns(), &["src_ip", "src"]);
        assert_eq!(normalized.text(0, "src_ip"), Some("1.1.1.1"));
    }

    #[test]
    fn test_canonical_name_beats_aliases() {
        let table = FlowTable::from_csv("src_ip,sourceip\n1.1.1.1,9.9.9.9\n").unwrap();
        let normalized = normalize(&table);
        assert_eq!(normalized.columns(), &["src_ip", "sourceip"]);
    }

    #[test]
    fn test_rename_never_duplicates_a_column() {
        let table = FlowTable::from_csv("SRC_IP,src_ip\n1.1.1.1,9.9.9.9\n").unwrap();
        let normalized = normalize(&table);
        assert_eq!(normalized.columns(), &["SRC_IP", "src_ip"]);
    }

    #[test]
    fn test_unparsable_timestamp_becomes_missing() {
        let table =
            FlowTable::from_csv("timestamp\n2025-01-01T00:00:00Z\nnot-a-date\n").unwrap();
        let normalized = normalize(&table);
        assert!(normalized.time(0, "timestamp").is_some());
        assert!(normalized.cell(1, "timestamp").unwrap().is_missing());
    }
}
