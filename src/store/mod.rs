//! Object Store Abstraction
//!
//! The pipeline only needs a listing/byte-fetching capability; everything
//! provider-specific lives behind [`ObjectStore`]. Fetches go through an
//! explicit bounded-retry policy because transient network failures are
//! expected when pulling many log objects.

pub mod azure;
pub mod local;

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use crate::constants;
use crate::error::{FetchError, StoreError};

pub use azure::AzureBlobStore;
pub use local::LocalDirStore;

/// Listing and fetching capability of a remote (or local) object store.
///
/// `list` order must be stable across calls for deterministic retries but is
/// not required to be sorted. `fetch` is allowed to fail transiently; the
/// retry wrapper assumes failures are not permanent until the attempt
/// ceiling is reached.
pub trait ObjectStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
    fn fetch(&self, name: &str) -> Result<Vec<u8>, StoreError>;
}

/// Bounded-retry policy for one object fetch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_RETRY_ATTEMPTS,
            base_delay: Duration::from_secs(constants::DEFAULT_RETRY_BASE_SECS),
            max_delay: Duration::from_secs(constants::DEFAULT_RETRY_MAX_SECS),
        }
    }
}

/// Fetch one object, retrying with exponential backoff.
///
/// The delay starts at `base_delay` and doubles after every failed attempt,
/// capped at `max_delay`. Exhausting the attempt budget yields a
/// [`FetchError`] naming the object.
pub fn fetch_with_retry<S: ObjectStore + ?Sized>(
    store: &S,
    name: &str,
    policy: &RetryPolicy,
) -> Result<Vec<u8>, FetchError> {
    let attempts = policy.max_attempts.max(1);
    let mut delay = policy.base_delay;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match store.fetch(name) {
            Ok(bytes) => return Ok(bytes),
            Err(err) => {
                if attempt >= attempts {
                    return Err(FetchError {
                        name: name.to_string(),
                        attempts: attempt,
                        source: err,
                    });
                }
                log::debug!(
                    "fetch of '{}' failed (attempt {}/{}): {}",
                    name,
                    attempt,
                    attempts,
                    err
                );
                thread::sleep(delay);
                delay = (delay * 2).min(policy.max_delay);
            }
        }
    }
}

/// In-memory object store. Listing order is the sorted key order, which
/// keeps runs deterministic for tests and offline experiments.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.objects.insert(name.into(), bytes);
    }
}

impl ObjectStore for MemoryStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn fetch(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Store whose fetches fail a fixed number of times before succeeding.
    struct FlakyStore {
        inner: MemoryStore,
        failures_left: Mutex<u32>,
        attempts: Mutex<u32>,
    }

    impl FlakyStore {
        fn new(inner: MemoryStore, failures: u32) -> Self {
            Self {
                inner,
                failures_left: Mutex::new(failures),
                attempts: Mutex::new(0),
            }
        }
    }

    impl ObjectStore for FlakyStore {
        fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            self.inner.list(prefix)
        }

        fn fetch(&self, name: &str) -> Result<Vec<u8>, StoreError> {
            *self.attempts.lock() += 1;
            let mut left = self.failures_left.lock();
            if *left > 0 {
                *left -= 1;
                return Err(StoreError::Transport("connection reset".to_string()));
            }
            self.inner.fetch(name)
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_retry_recovers_from_transient_failures() {
        let mut inner = MemoryStore::new();
        inner.insert("logs/a.csv", b"src_ip\n1.1.1.1\n".to_vec());
        let store = FlakyStore::new(inner, 2);

        let bytes = fetch_with_retry(&store, "logs/a.csv", &fast_policy()).unwrap();
        assert_eq!(bytes, b"src_ip\n1.1.1.1\n");
        assert_eq!(*store.attempts.lock(), 3);
    }

    #[test]
    fn test_retry_exhaustion_reports_object_name() {
        let store = FlakyStore::new(MemoryStore::new(), u32::MAX);

        let err = fetch_with_retry(&store, "logs/b.csv", &fast_policy()).unwrap_err();
        assert_eq!(err.name, "logs/b.csv");
        assert_eq!(err.attempts, 3);
        assert_eq!(*store.attempts.lock(), 3);
    }

    #[test]
    fn test_memory_store_lists_by_prefix() {
        let mut store = MemoryStore::new();
        store.insert("logs/2025/a.csv", Vec::new());
        store.insert("logs/2025/b.csv", Vec::new());
        store.insert("other/c.csv", Vec::new());

        let names = store.list("logs/").unwrap();
        assert_eq!(names, vec!["logs/2025/a.csv", "logs/2025/b.csv"]);
    }
}
