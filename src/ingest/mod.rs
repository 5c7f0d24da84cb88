//! Ingestion Pipeline
//!
//! Orchestrates the path from object store to normalized tables: list
//! candidate objects by prefix, fetch each with bounded retry, route through
//! archive extraction, parse the delimited text and normalize the schema.
//! Produced as a lazy sequence - each table is decoded only when the caller
//! asks for it, so peak memory stays at one raw object plus one table.
//!
//! Failure policy: a fetch that exhausts its retry budget, or a member that
//! cannot be decoded, is logged, counted and skipped. Partial results beat
//! total failure when ingesting many objects.

pub mod extract;
pub mod normalize;

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ExtractError, StoreError};
use crate::store::{fetch_with_retry, ObjectStore, RetryPolicy};
use crate::table::FlowTable;

pub use extract::{extract, Payload};
pub use normalize::{normalize, CANONICAL_ALIASES};

/// Object name suffixes the pipeline understands. Anything else in the
/// listing is skipped silently.
pub const SUPPORTED_SUFFIXES: &[&str] = &[".zip", ".gz", ".csv"];

/// Whether an object name carries a supported suffix (case-insensitive).
pub fn is_supported(name: &str) -> bool {
    let lower = name.to_lowercase();
    SUPPORTED_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

// ============================================================================
// INGEST STATISTICS
// ============================================================================

/// Counters for one pipeline run, shared between the iterator and whoever
/// reports on it. The consuming CLI surfaces skips as warnings instead of
/// aborting the session on partial data.
#[derive(Debug, Default)]
pub struct IngestStats {
    objects_processed: AtomicU64,
    objects_skipped: AtomicU64,
    members_skipped: AtomicU64,
    tables_yielded: AtomicU64,
    skipped_names: Mutex<Vec<String>>,
}

impl IngestStats {
    pub fn objects_processed(&self) -> u64 {
        self.objects_processed.load(Ordering::Relaxed)
    }

    pub fn objects_skipped(&self) -> u64 {
        self.objects_skipped.load(Ordering::Relaxed)
    }

    pub fn members_skipped(&self) -> u64 {
        self.members_skipped.load(Ordering::Relaxed)
    }

    pub fn tables_yielded(&self) -> u64 {
        self.tables_yielded.load(Ordering::Relaxed)
    }

    /// Names of objects dropped after retry exhaustion.
    pub fn skipped_names(&self) -> Vec<String> {
        self.skipped_names.lock().clone()
    }

    fn record_object(&self) {
        self.objects_processed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_object_skip(&self, name: &str) {
        self.objects_skipped.fetch_add(1, Ordering::Relaxed);
        self.skipped_names.lock().push(name.to_string());
    }

    fn record_member_skip(&self) {
        self.members_skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_table(&self) {
        self.tables_yielded.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================================
// INGESTOR
// ============================================================================

/// Entry point for pipeline runs against one object store.
pub struct Ingestor<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    retry: RetryPolicy,
    stats: Arc<IngestStats>,
}

impl<'a, S: ObjectStore + ?Sized> Ingestor<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            stats: Arc::new(IngestStats::default()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Handle on the run counters; stays valid while iteration proceeds.
    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    /// Lazily ingest every supported object under `prefix`.
    ///
    /// Listing failure is fatal (there is nothing to iterate); everything
    /// after that follows the skip-and-continue policy. The sequence is
    /// finite, follows listing order, and is not restartable - each call
    /// re-lists and re-fetches.
    pub fn ingest(&self, prefix: &str) -> Result<IngestIter<'a, S>, StoreError> {
        let names: Vec<String> = self
            .store
            .list(prefix)?
            .into_iter()
            .filter(|n| is_supported(n))
            .collect();
        log::info!("found {} candidate objects under prefix '{}'", names.len(), prefix);
        Ok(IngestIter {
            store: self.store,
            retry: self.retry.clone(),
            names: names.into_iter(),
            pending: VecDeque::new(),
            stats: Arc::clone(&self.stats),
        })
    }

    /// Ingest and concatenate everything under `prefix` into one table.
    pub fn ingest_all(&self, prefix: &str) -> Result<FlowTable, StoreError> {
        Ok(FlowTable::concat(self.ingest(prefix)?))
    }
}

/// Lazy, single-pass sequence of normalized tables.
pub struct IngestIter<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    retry: RetryPolicy,
    names: std::vec::IntoIter<String>,
    pending: VecDeque<FlowTable>,
    stats: Arc<IngestStats>,
}

impl<S: ObjectStore + ?Sized> Iterator for IngestIter<'_, S> {
    type Item = FlowTable;

    fn next(&mut self) -> Option<FlowTable> {
        loop {
            if let Some(table) = self.pending.pop_front() {
                self.stats.record_table();
                return Some(table);
            }

            let name = self.names.next()?;
            log::info!("processing object: {}", name);
            let raw = match fetch_with_retry(self.store, &name, &self.retry) {
                Ok(bytes) => bytes,
                Err(err) => {
                    log::warn!("skipping object: {}", err);
                    self.stats.record_object_skip(&name);
                    continue;
                }
            };
            self.stats.record_object();

            for item in extract(&name, &raw) {
                match item {
                    Ok(payload) => match FlowTable::from_csv(&payload.text) {
                        Ok(table) => self.pending.push_back(normalize(&table)),
                        Err(err) => {
                            let err = ExtractError::BadCsv {
                                name: payload.member,
                                reason: err.to_string(),
                            };
                            log::warn!("skipping member: {}", err);
                            self.stats.record_member_skip();
                        }
                    },
                    Err(err) => {
                        log::warn!("skipping member: {}", err);
                        self.stats.record_member_skip();
                    }
                }
            }
        }
    }
}
