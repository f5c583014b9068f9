//! OCR profiler core.
//!
//! Turns a book's aligned OCR/correction characters into tokens, runs the
//! external profiler over them, and stores the weighted correction
//! suggestions it returns so they can be queried per token, per error
//! pattern or per book.
//!
//! Storage sits behind [`store::ProfileStore`]; [`store_memory::MemoryStore`]
//! backs tests, and the Postgres adapter is enabled with the `postgres`
//! feature.

pub mod archive;
pub mod casing;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod language;
pub mod pipeline;
pub mod query;
pub mod schema;
pub mod store;
pub mod store_memory;
#[cfg(feature = "postgres")]
pub mod store_postgres;
pub mod tokenizer;
pub mod types;

pub use engine::{cancel_pair, CancelSignal, ProcessEngine, ProfileEngine};
pub use error::{ProfileError, Result};
pub use ingest::{ingest, IngestSummary};
pub use pipeline::{ProfileJob, Profiler, DEFAULT_CUTOFF};
pub use store::ProfileStore;
pub use store_memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use store_postgres::PgProfileStore;
pub use types::*;
