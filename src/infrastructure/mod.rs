//! Concrete adapters for the domain ports.

pub mod catalog;
pub mod gateway;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
