//! # triage-themes
//!
//! Groups a project's tickets into themes: hard clusters with a centroid
//! and a short keyword label.
//!
//! ## Features
//! - Incremental assignment: join the nearest theme, hold loose matches as
//!   noise while the project is small, otherwise seed a singleton theme
//! - Full reprocess: deterministic greedy pass over sorted ids, then centroid
//!   merges and cohesion splits, committed in one atomic write
//! - TF-IDF labels from member titles, ties broken alphabetically
//! - Cooperative cancellation and deadlines for long reprocess runs
//! - Delete cascade that removes a ticket from its theme

pub mod clustering;
pub mod error;
pub mod labeling;
pub mod similarity;
pub mod storage;
pub mod types;

pub use clustering::{ReprocessOptions, ReprocessSummary, ThemeClusterer};
pub use error::ThemeError;
pub use labeling::{DocFrequencies, ThemeLabel, ThemeLabeler, TitleIndex};
pub use storage::ThemeStore;
pub use types::{Membership, Theme};
