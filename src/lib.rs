//! FlowLens Core - Flow Log Ingestion & Traffic Analytics
//!
//! Pulls network-flow log files (zipped, gzipped or plain CSV) out of an
//! object store, reconciles their inconsistent vendor column names onto one
//! canonical schema, and runs traffic analytics over the result: top
//! talkers/listeners, denied-flow summaries, hourly flow counts, rolling
//! z-score spike detection and persistent-connection detection.
//!
//! ## Architecture
//! - `store/` - Object store trait + implementations (memory, local dir, Azure Blob)
//! - `ingest/` - Fetch, extract, CSV-parse and normalize into [`FlowTable`]s
//! - `analytics/` - Pure aggregation and anomaly detection over tables
//!
//! Analytics functions never mutate their input; every transform produces a
//! new table. They are usable directly on locally supplied tables without
//! going through the ingestion pipeline.

pub mod analytics;
pub mod constants;
pub mod error;
pub mod ingest;
pub mod store;
pub mod table;

pub use analytics::{
    denied_flows, detect_spikes, flows_per_hour, persistent_connections, top_listeners, top_n,
    top_talkers, AggregationResult, HourlySeries, PersistenceRecord,
};
pub use error::{ExtractError, FetchError, StoreError};
pub use ingest::{normalize, IngestStats, Ingestor};
pub use store::{fetch_with_retry, ObjectStore, RetryPolicy};
pub use table::{Cell, FlowTable};
