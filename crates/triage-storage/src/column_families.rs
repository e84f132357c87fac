//! Column family definitions for RocksDB.
//!
//! - vectors: ticket embeddings, one per ticket (point lookups + project scans)
//! - tickets: ticket docs (title, body, labels) used for labels and tags
//! - themes: theme records with centroid and members
//! - memberships: ticket -> theme index

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for ticket vectors
pub const CF_VECTORS: &str = "vectors";

/// Column family name for ticket docs
pub const CF_TICKETS: &str = "tickets";

/// Column family name for theme records
pub const CF_THEMES: &str = "themes";

/// Column family name for ticket -> theme memberships
pub const CF_MEMBERSHIPS: &str = "memberships";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_VECTORS, CF_TICKETS, CF_THEMES, CF_MEMBERSHIPS];

/// Vectors are large and rarely rewritten; compress them.
fn vectors_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_VECTORS, vectors_options()),
        ColumnFamilyDescriptor::new(CF_TICKETS, Options::default()),
        ColumnFamilyDescriptor::new(CF_THEMES, Options::default()),
        ColumnFamilyDescriptor::new(CF_MEMBERSHIPS, Options::default()),
    ]
}
