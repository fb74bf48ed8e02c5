//! The synchronous ingestion pipeline: decode, fingerprint, group, store.

pub mod pipeline;

pub use pipeline::{ingest, IngestReceipt, IngestRequest};
