//! Domain-specific error types for FlowLens.
//!
//! Errors are reserved for input that is genuinely unusable (an object that
//! cannot be fetched or decoded). "No matching data" conditions - absent
//! columns, empty tables - return empty, correctly shaped results instead.

use thiserror::Error;

/// Errors surfaced by an [`crate::store::ObjectStore`] implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object '{0}' not found")]
    NotFound(String),

    #[error("server returned status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Remote fetch of one object exhausted its retry budget.
///
/// Scoped to that object; the pipeline reports it and skips the object
/// rather than aborting the whole run.
#[derive(Error, Debug)]
#[error("fetch of '{name}' failed after {attempts} attempts: {source}")]
pub struct FetchError {
    pub name: String,
    pub attempts: u32,
    #[source]
    pub source: StoreError,
}

/// A blob, or one member inside a blob, could not be decoded.
///
/// Scoped to that member; sibling members of the same archive are unaffected.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("'{name}' is not a readable archive: {reason}")]
    BadArchive { name: String, reason: String },

    #[error("failed to decode member '{member}' of '{name}': {reason}")]
    BadMember {
        name: String,
        member: String,
        reason: String,
    },

    #[error("failed to decompress '{name}': {reason}")]
    BadStream { name: String, reason: String },

    #[error("failed to parse '{name}' as delimited text: {reason}")]
    BadCsv { name: String, reason: String },
}
