#![forbid(unsafe_code)]

use crate::export::{PayloadReceipt, StorageError};

/// Destination for finished export payloads. Writes are append-only: a name is written once.
pub trait ExportSink {
    fn write_payload(&mut self, name: &str, body: &str) -> Result<PayloadReceipt, StorageError>;
}

impl<S: ExportSink + ?Sized> ExportSink for &mut S {
    fn write_payload(&mut self, name: &str, body: &str) -> Result<PayloadReceipt, StorageError> {
        (**self).write_payload(name, body)
    }
}
