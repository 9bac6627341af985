//! Engine configuration applied by [`crate::database::Database::open`].
//!
//! The underlying key-value engine's buffer cache, WAL, and compactor are
//! out of scope for this crate (see `spec.md` §1), but the façade still
//! carries the same configuration values a real deployment would pass down
//! to it, so that swapping in a fuller engine later is a drop-in change.

/// Buffer cache size, in bytes.
pub const BUFFER_CACHE_BYTES: u64 = 8 * 1024 * 1024;

/// Number of WAL records buffered before a forced checkpoint.
pub const WAL_THRESHOLD_RECORDS: u32 = 1024;

/// Whether the WAL is flushed before every commit.
pub const WAL_FLUSH_BEFORE_COMMIT: bool = true;

/// Whether the sequence-tree optimization is enabled.
pub const SEQUENCE_TREE_OPTIMIZATION: bool = true;

/// Whether document bodies are compressed on disk.
pub const BODY_COMPRESSION_ENABLED: bool = true;

/// Auto-compactor probe interval, in seconds.
pub const COMPACTOR_PROBE_INTERVAL_SECS: u32 = 300;

/// Bodies at or below this size are stored inline with the revision metadata;
/// larger bodies are written to the overflow store keyed by `(docID, sequence)`.
pub const INLINE_BODY_MAX_BYTES: usize = 4096;

/// Immutable snapshot of the engine configuration a [`crate::database::Database`] was opened with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub buffer_cache_bytes: u64,
    pub wal_threshold_records: u32,
    pub wal_flush_before_commit: bool,
    pub sequence_tree_optimization: bool,
    pub body_compression_enabled: bool,
    pub compactor_probe_interval_secs: u32,
    pub read_only: bool,
}

impl EngineConfig {
    pub fn new(read_only: bool) -> Self {
        Self {
            buffer_cache_bytes: BUFFER_CACHE_BYTES,
            wal_threshold_records: WAL_THRESHOLD_RECORDS,
            wal_flush_before_commit: WAL_FLUSH_BEFORE_COMMIT,
            sequence_tree_optimization: SEQUENCE_TREE_OPTIMIZATION,
            body_compression_enabled: BODY_COMPRESSION_ENABLED,
            compactor_probe_interval_secs: COMPACTOR_PROBE_INTERVAL_SECS,
            read_only,
        }
    }
}
