#![forbid(unsafe_code)]

pub mod export;
pub mod repo;

pub use export::{DirExportSink, InMemoryExportStore, PayloadReceipt, StorageError, StoredPayload};
pub use repo::ExportSink;
