//! Shared RocksDB storage utilities.
//!
//! This module provides generic utilities and patterns for RocksDB-based
//! storage. It contains no domain-specific logic - just pure RocksDB helpers.
//!
//! ## Key Features
//!
//! - Configurable RocksDB setup with sensible defaults
//! - Generic key-value operations with serialization
//! - Forward and reverse seek iteration bounded by a key prefix
//! - Atomic write batches

use crate::error::{ForumError, Result};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options,
    WriteBatch,
};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

// =============================================================================
// RocksDB Configuration
// =============================================================================

/// Configuration for RocksDB storage.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Maximum number of open files.
    pub max_open_files: i32,
    /// Number of log files to keep.
    pub keep_log_file_num: usize,
    /// Maximum WAL size in bytes.
    pub max_wal_size: u64,
    /// Write buffer size in bytes.
    pub write_buffer_size: usize,
    /// Maximum number of write buffers.
    pub max_write_buffer_number: i32,
    /// Target file size for SST files.
    pub target_file_size_base: u64,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            max_open_files: 128,
            keep_log_file_num: 2,
            max_wal_size: 32 * 1024 * 1024,      // 32MB
            write_buffer_size: 32 * 1024 * 1024, // 32MB
            max_write_buffer_number: 2,
            target_file_size_base: 32 * 1024 * 1024, // 32MB
        }
    }
}

impl RocksDbConfig {
    /// Creates a configuration optimized for server workloads.
    ///
    /// Uses larger buffers and more files for higher throughput.
    pub fn for_server() -> Self {
        Self {
            max_open_files: 256,
            keep_log_file_num: 3,
            max_wal_size: 64 * 1024 * 1024,      // 64MB
            write_buffer_size: 64 * 1024 * 1024, // 64MB
            max_write_buffer_number: 3,
            target_file_size_base: 64 * 1024 * 1024, // 64MB
        }
    }

    /// Builds RocksDB Options from this configuration.
    pub fn build_options(&self) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(self.max_open_files);
        opts.set_keep_log_file_num(self.keep_log_file_num);
        opts.set_max_total_wal_size(self.max_wal_size);
        opts.increase_parallelism(num_cpus::get() as i32);
        opts.set_write_buffer_size(self.write_buffer_size);
        opts.set_max_write_buffer_number(self.max_write_buffer_number);
        opts.set_target_file_size_base(self.target_file_size_base);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }
}

// =============================================================================
// Key Generation Utilities
// =============================================================================

/// Creates a prefixed key with a separator.
///
/// Format: `{prefix}{separator}{suffix}`
///
/// This is useful for creating composite keys that enable prefix iteration.
pub fn prefixed_key(prefix: &[u8], separator: u8, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1 + suffix.len());
    key.extend_from_slice(prefix);
    key.push(separator);
    key.extend_from_slice(suffix);
    key
}

/// Creates a composite key from two byte slices.
///
/// Format: `{part1}:{part2}` (using colon separator)
pub fn composite_key(part1: &[u8], part2: &[u8]) -> Vec<u8> {
    prefixed_key(part1, b':', part2)
}

/// Returns the smallest key that sorts after every key starting with `prefix`.
///
/// Returns `None` when the prefix is empty or all `0xFF` (no upper bound exists).
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

// =============================================================================
// Value Encoding
// =============================================================================

/// Serializes a value with bincode.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value)
        .map_err(|e| ForumError::serialization(format!("Failed to serialize: {}", e)))
}

/// Deserializes a bincode value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes)
        .map_err(|e| ForumError::serialization(format!("Failed to deserialize: {}", e)))
}

// =============================================================================
// Database Handle Wrapper
// =============================================================================

/// A wrapper around RocksDB that provides common operations.
///
/// This is designed to be embedded in storage structs to provide
/// shared functionality while allowing storage-specific extensions.
pub struct RocksDbHandle {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksDbHandle {
    /// Opens a RocksDB database with the given column families.
    pub fn open(
        db_path: impl AsRef<Path>,
        config: &RocksDbConfig,
        column_families: &[&str],
    ) -> Result<Self> {
        let opts = config.build_options();
        let cf_opts = Options::default();

        let cf_descriptors: Vec<_> = column_families
            .iter()
            .map(|cf| ColumnFamilyDescriptor::new(*cf, cf_opts.clone()))
            .collect();

        let db = DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(
            &opts,
            db_path.as_ref(),
            cf_descriptors,
        )
        .map_err(|e| ForumError::storage(format!("Failed to open RocksDB: {}", e)))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Gets a column family handle.
    pub fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| ForumError::storage(format!("Column family '{}' not found", name)))
    }

    /// Stores a serializable value at the given key.
    pub fn put<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let bytes = encode(value)?;

        trace!(
            cf = cf_name,
            key_len = key.len(),
            value_bytes = bytes.len(),
            "db_put: storing serialized value"
        );

        self.put_raw(cf_name, key, &bytes)
    }

    /// Stores raw bytes at the given key.
    pub fn put_raw(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.cf(cf_name)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| ForumError::storage(format!("Failed to write: {}", e)))?;
        Ok(())
    }

    /// Loads and deserializes a value from the given key.
    pub fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        match self.get_raw(cf_name, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Loads raw bytes from the given key.
    pub fn get_raw(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(cf_name)?;

        match self.db.get_cf(&cf, key) {
            Ok(Some(bytes)) => {
                trace!(
                    cf = cf_name,
                    key_len = key.len(),
                    value_bytes = bytes.len(),
                    "db_get_raw: found record"
                );
                Ok(Some(bytes))
            }
            Ok(None) => {
                trace!(
                    cf = cf_name,
                    key_len = key.len(),
                    "db_get_raw: key not found"
                );
                Ok(None)
            }
            Err(e) => Err(ForumError::storage(format!("Failed to read: {}", e))),
        }
    }

    /// Checks if a key exists.
    pub fn exists(&self, cf_name: &str, key: &[u8]) -> Result<bool> {
        let cf = self.cf(cf_name)?;
        let exists = self
            .db
            .get_pinned_cf(&cf, key)
            .map(|v| v.is_some())
            .map_err(|e| ForumError::storage(format!("Failed to check key: {}", e)))?;

        trace!(
            cf = cf_name,
            key_len = key.len(),
            exists = exists,
            "db_exists: checked key existence"
        );

        Ok(exists)
    }

    /// Starts a new atomic write batch against this database.
    pub fn batch(&self) -> StorageBatch<'_> {
        StorageBatch {
            handle: self,
            batch: WriteBatch::default(),
        }
    }

    /// Iterates over entries starting from a seek position, filtering by a prefix.
    ///
    /// This is useful for cursor-based pagination where you want to seek to a specific
    /// position in the index but still only iterate over entries with a common prefix.
    ///
    /// - `seek_key`: The key to seek to (start iteration from this position)
    /// - `filter_prefix`: Only process keys that start with this prefix
    ///
    /// The callback receives (key, value) pairs and should return true to continue
    /// or false to stop iteration.
    pub fn seek_iterate<F>(
        &self,
        cf_name: &str,
        seek_key: &[u8],
        filter_prefix: &[u8],
        mut callback: F,
    ) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let cf = self.cf(cf_name)?;
        let mut iter = self.db.raw_iterator_cf(&cf);
        iter.seek(seek_key);

        let mut count: usize = 0;
        while iter.valid() {
            if let (Some(key), Some(value)) = (iter.key(), iter.value()) {
                // Stop if we've moved past the filter prefix
                if !key.starts_with(filter_prefix) {
                    break;
                }
                count += 1;
                if !callback(key, value) {
                    break;
                }
                iter.next();
            } else {
                break;
            }
        }

        iter.status()
            .map_err(|e| ForumError::storage(format!("Iterator error: {}", e)))?;

        debug!(
            cf = cf_name,
            seek_key_len = seek_key.len(),
            filter_prefix_len = filter_prefix.len(),
            records_iterated = count,
            "db_seek_iterate: completed seek iteration"
        );

        Ok(())
    }

    /// Iterates backwards over entries with the given prefix.
    ///
    /// Iteration starts at the last key `<= seek_key`, or at the last key of the
    /// prefix when `seek_key` is `None`, and walks toward smaller keys until the
    /// prefix no longer matches.
    pub fn seek_iterate_reverse<F>(
        &self,
        cf_name: &str,
        seek_key: Option<&[u8]>,
        filter_prefix: &[u8],
        mut callback: F,
    ) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let cf = self.cf(cf_name)?;
        let mut iter = self.db.raw_iterator_cf(&cf);

        match seek_key {
            Some(key) => iter.seek_for_prev(key),
            None => match prefix_successor(filter_prefix) {
                Some(end) => {
                    iter.seek_for_prev(&end);
                    // The successor itself is outside the prefix
                    if iter.valid() && iter.key() == Some(end.as_slice()) {
                        iter.prev();
                    }
                }
                None => iter.seek_to_last(),
            },
        }

        let mut count: usize = 0;
        while iter.valid() {
            if let (Some(key), Some(value)) = (iter.key(), iter.value()) {
                if !key.starts_with(filter_prefix) {
                    break;
                }
                count += 1;
                if !callback(key, value) {
                    break;
                }
                iter.prev();
            } else {
                break;
            }
        }

        iter.status()
            .map_err(|e| ForumError::storage(format!("Iterator error: {}", e)))?;

        debug!(
            cf = cf_name,
            filter_prefix_len = filter_prefix.len(),
            records_iterated = count,
            "db_seek_iterate_reverse: completed reverse iteration"
        );

        Ok(())
    }

    /// Returns the largest key of a column family, if it holds any.
    pub fn last_key(&self, cf_name: &str) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        let mut iter = self.db.raw_iterator_cf(&cf);
        iter.seek_to_last();

        let last = if iter.valid() {
            iter.key().map(<[u8]>::to_vec)
        } else {
            None
        };
        iter.status()
            .map_err(|e| ForumError::storage(format!("Iterator error: {}", e)))?;

        Ok(last)
    }

    /// Deletes every entry of the given column families in one atomic batch.
    ///
    /// Each column family is wiped with a single range tombstone covering
    /// everything up to its current last key. Returns the number of column
    /// families that held data.
    pub fn clear_column_families(&self, cf_names: &[&str]) -> Result<usize> {
        let mut batch = self.batch();
        let mut cleared = 0;

        for cf_name in cf_names {
            if let Some(last) = self.last_key(cf_name)? {
                // The end bound is exclusive; last + 0x00 is the next possible key
                let mut end = last;
                end.push(0x00);
                batch.delete_range(cf_name, &[], &end)?;
                cleared += 1;
            }
        }

        batch.commit()?;

        debug!(
            column_families = cf_names.len(),
            non_empty = cleared,
            "db_clear: cleared column families"
        );

        Ok(cleared)
    }

    /// Returns database statistics.
    pub fn stats(&self) -> String {
        self.db
            .property_value("rocksdb.stats")
            .ok()
            .flatten()
            .unwrap_or_else(|| "Stats unavailable".to_string())
    }
}

impl std::fmt::Debug for RocksDbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbHandle")
            .field("db", &"RocksDB")
            .finish()
    }
}

// =============================================================================
// Write Batches
// =============================================================================

/// A set of writes that is applied to the database atomically.
///
/// Nothing staged in the batch is visible to readers until [`StorageBatch::commit`]
/// succeeds. Dropping the batch discards every staged write.
pub struct StorageBatch<'a> {
    handle: &'a RocksDbHandle,
    batch: WriteBatch,
}

impl<'a> StorageBatch<'a> {
    /// Stages a serializable value at the given key.
    pub fn put<T: Serialize>(&mut self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let bytes = encode(value)?;
        self.put_raw(cf_name, key, &bytes)
    }

    /// Stages raw bytes at the given key.
    pub fn put_raw(&mut self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.handle.cf(cf_name)?;
        self.batch.put_cf(&cf, key, value);
        Ok(())
    }

    /// Stages a key deletion.
    pub fn delete(&mut self, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf = self.handle.cf(cf_name)?;
        self.batch.delete_cf(&cf, key);
        Ok(())
    }

    /// Stages the deletion of every key in `[from, to)`.
    pub fn delete_range(&mut self, cf_name: &str, from: &[u8], to: &[u8]) -> Result<()> {
        let cf = self.handle.cf(cf_name)?;
        self.batch.delete_range_cf(&cf, from, to);
        Ok(())
    }

    /// Applies every staged write atomically.
    pub fn commit(self) -> Result<()> {
        let ops = self.batch.len();
        self.handle
            .db
            .write(self.batch)
            .map_err(|e| ForumError::storage(format!("Failed to commit batch: {}", e)))?;

        trace!(operations = ops, "db_commit: applied write batch");
        Ok(())
    }
}
