//! Storage layer for backlog-triage.
//!
//! Provides RocksDB-backed storage with:
//! - Column family isolation for vectors, ticket docs, themes and memberships
//! - Project-scoped keys for exact prefix scans
//! - Atomic multi-column-family writes via [`StorageBatch`]
//! - Paged prefix scans so callers can stream large projects

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;

pub use db::{Storage, StorageBatch, StorageStats};
pub use error::StorageError;
pub use keys::{MembershipKey, ThemeKey, TicketKey, VectorKey};
