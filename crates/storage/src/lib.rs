//! Storage abstraction and implementations for Helpboard.
//!
//! This crate provides a trait-based key/value interface over JSON
//! documents, with a file-backed reference implementation and an
//! in-memory one. Every write is announced on a broadcast channel so
//! sessions sharing a backend can pick up each other's changes.

#![warn(missing_docs)]

pub mod keys;
pub mod trait_;
#[cfg(feature = "json")]
pub mod json_storage;
pub mod memory;

pub use trait_::{
    Storage, StorageError, StorageEvent, Result, SharedStorage, load_json, save_json, shared,
};
#[cfg(feature = "json")]
pub use json_storage::JsonStorage;
pub use memory::MemoryStorage;
