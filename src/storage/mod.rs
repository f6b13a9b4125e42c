//! Storage utilities and abstractions.
//!
//! This module provides the RocksDB infrastructure the forum store is built on.
//!
//! ## Modules
//!
//! - `rocksdb`: Generic RocksDB utilities (configuration, handle, iteration, batches)

pub mod rocksdb;

pub use rocksdb::{
    composite_key, decode, encode, prefix_successor, prefixed_key, RocksDbConfig, RocksDbHandle,
    StorageBatch,
};
