//! # triage-vector
//!
//! Project-scoped vector store and similarity engine.
//!
//! Vectors live in RocksDB next to a small doc per ticket (title, body,
//! labels). Nearest-neighbor search is exact: a full scan with a bounded
//! top-k, so results are deterministic and ties break by smaller ticket id.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let store = VectorStore::new(storage, "PAY", 384, "hashing-v1-d384")?;
//! store.upsert_ticket(&ticket, vector)?;
//! let links = SimilarityEngine::new(&store).find_similar("PAY-1", 5, 0.5)?;
//! ```

pub mod error;
pub mod record;
pub mod scan;
pub mod similarity;
pub mod store;

pub use error::VectorError;
pub use record::{TicketDoc, VectorRecord};
pub use scan::VectorScan;
pub use similarity::{cosine_similarity, SimilarityEngine};
pub use store::{DeleteCascade, Neighbor, UpsertOutcome, VectorStore};
