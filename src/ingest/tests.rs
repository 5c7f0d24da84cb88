use std::io::Write;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::StoreError;
use crate::store::{MemoryStore, ObjectStore, RetryPolicy};
use crate::table::FlowTable;

use super::{is_supported, Ingestor};

fn zip_bytes(members: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in members {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn gz_bytes(content: &str) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    }
}

/// Store that permanently fails fetches for one object name.
struct PartiallyDeadStore {
    inner: MemoryStore,
    dead: String,
    dead_attempts: Mutex<u32>,
}

impl ObjectStore for PartiallyDeadStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list(prefix)
    }

    fn fetch(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        if name == self.dead {
            *self.dead_attempts.lock() += 1;
            return Err(StoreError::Transport("timed out".to_string()));
        }
        self.inner.fetch(name)
    }
}

#[test]
fn test_is_supported_suffixes() {
    assert!(is_supported("a.csv"));
    assert!(is_supported("a.CSV"));
    assert!(is_supported("a.csv.gz"));
    assert!(is_supported("logs/a.zip"));
    assert!(!is_supported("a.json"));
    assert!(!is_supported("a.csv.bak"));
}

#[test]
fn test_zip_members_with_divergent_schemas_both_normalize() {
    let mut store = MemoryStore::new();
    store.insert(
        "logs/day1.zip",
        zip_bytes(&[
            ("east.csv", "Src_IP,Dst_IP,bytes\n1.1.1.1,5.5.5.5,100\n"),
            ("west.csv", "sourceip,destinationip,octets\n2.2.2.2,6.6.6.6,300\n"),
        ]),
    );

    let ingestor = Ingestor::new(&store);
    let tables: Vec<FlowTable> = ingestor.ingest("logs/").unwrap().collect();

    assert_eq!(tables.len(), 2);
    for table in &tables {
        assert!(table.has_column("src_ip"));
        assert!(table.has_column("dst_ip"));
    }
    assert_eq!(tables[0].number(0, "bytes"), Some(100.0));
    assert_eq!(tables[1].number(0, "bytes"), Some(300.0));
}

#[test]
fn test_gz_and_plain_objects_ingest() {
    let mut store = MemoryStore::new();
    store.insert("logs/a.csv", b"src,bytes\n1.1.1.1,10\n".to_vec());
    store.insert("logs/b.csv.gz", gz_bytes("src,bytes\n2.2.2.2,20\n"));
    store.insert("logs/notes.json", b"{}".to_vec());

    let ingestor = Ingestor::new(&store);
    let merged = ingestor.ingest_all("logs/").unwrap();

    assert_eq!(merged.len(), 2);
    assert!(merged.has_column("src_ip"));
    assert_eq!(ingestor.stats().tables_yielded(), 2);
    assert_eq!(ingestor.stats().objects_processed(), 2);
}

#[test]
fn test_fetch_exhaustion_skips_object_and_continues() {
    let mut inner = MemoryStore::new();
    inner.insert("logs/good.csv", b"src_ip,bytes\n1.1.1.1,10\n".to_vec());
    inner.insert("logs/unreachable.csv", b"src_ip,bytes\n9.9.9.9,99\n".to_vec());
    let store = PartiallyDeadStore {
        inner,
        dead: "logs/unreachable.csv".to_string(),
        dead_attempts: Mutex::new(0),
    };

    let ingestor = Ingestor::new(&store).with_retry(fast_retry());
    let tables: Vec<FlowTable> = ingestor.ingest("logs/").unwrap().collect();

    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].text(0, "src_ip"), Some("1.1.1.1"));
    assert_eq!(*store.dead_attempts.lock(), 3);

    let stats = ingestor.stats();
    assert_eq!(stats.objects_skipped(), 1);
    assert_eq!(
        stats.skipped_names(),
        vec!["logs/unreachable.csv".to_string()]
    );
}

#[test]
fn test_corrupt_member_skipped_siblings_survive() {
    let mut store = MemoryStore::new();
    store.insert("logs/bad.gz", b"not gzip at all".to_vec());
    store.insert("logs/good.csv", b"src_ip\n1.1.1.1\n".to_vec());

    let ingestor = Ingestor::new(&store);
    let tables: Vec<FlowTable> = ingestor.ingest("logs/").unwrap().collect();

    assert_eq!(tables.len(), 1);
    let stats = ingestor.stats();
    assert_eq!(stats.members_skipped(), 1);
    assert_eq!(stats.objects_skipped(), 0);
}

#[test]
fn test_empty_listing_yields_nothing() {
    let store = MemoryStore::new();
    let ingestor = Ingestor::new(&store);
    let merged = ingestor.ingest_all("logs/").unwrap();
    assert!(merged.is_empty());
    assert!(merged.columns().is_empty());
}
