// src/lib.rs
// Public library surface for the CLI and integration tests.

pub mod error;
pub mod ingest;
pub mod report;

// ---- Re-exports for stable public API ----
pub use crate::error::{IngestError, Result};
pub use crate::ingest::config::{load_config_default, load_config_from, IngestConfig};
pub use crate::ingest::http::{QuotaTracker, ResilientClient, RetryPolicy};
pub use crate::ingest::types::{RawFeedItem, SignalEvent, SourceProvider, SourceTag};
