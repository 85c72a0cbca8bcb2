#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use pairmem_kernel_contracts::ContractViolation;
use sha2::{Digest, Sha256};

use crate::repo::ExportSink;

const PAYLOAD_TABLE: &str = "export_payloads";
const NAME_MAX_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    DuplicateKey { table: &'static str, key: String },
    Io { path: String, message: String },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey { table, key } => write!(f, "{table}: duplicate key {key:?}"),
            Self::Io { path, message } => write!(f, "io error at {path}: {message}"),
            Self::ContractViolation(v) => write!(f, "contract violation: {v}"),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadReceipt {
    pub name: String,
    pub bytes: usize,
    pub sha256_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPayload {
    pub name: String,
    pub body: String,
    pub sha256_hex: String,
}

pub fn sha256_hex(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Payload names become file names: one path component, no traversal.
pub fn validate_payload_name(name: &str) -> Result<(), ContractViolation> {
    if name.is_empty() || name.len() > NAME_MAX_LEN {
        return Err(ContractViolation::InvalidValue {
            field: "export_payload.name",
            reason: "must be 1..=128 bytes",
        });
    }
    if name == "." || name == ".." || name.starts_with('.') {
        return Err(ContractViolation::InvalidValue {
            field: "export_payload.name",
            reason: "must not start with '.'",
        });
    }
    if name
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'))
    {
        return Err(ContractViolation::InvalidValue {
            field: "export_payload.name",
            reason: "must contain file-name-safe ASCII only",
        });
    }
    Ok(())
}

fn receipt(name: &str, body: &str) -> PayloadReceipt {
    PayloadReceipt {
        name: name.to_string(),
        bytes: body.len(),
        sha256_hex: sha256_hex(body),
    }
}

/// Append-only in-memory sink; the default for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExportStore {
    payloads: Vec<StoredPayload>,
    by_name: BTreeMap<String, usize>,
}

impl InMemoryExportStore {
    pub fn new_in_memory() -> Self {
        Self::default()
    }

    pub fn payloads(&self) -> &[StoredPayload] {
        &self.payloads
    }

    pub fn payload(&self, name: &str) -> Option<&StoredPayload> {
        self.by_name.get(name).map(|&i| &self.payloads[i])
    }
}

impl ExportSink for InMemoryExportStore {
    fn write_payload(&mut self, name: &str, body: &str) -> Result<PayloadReceipt, StorageError> {
        validate_payload_name(name)?;
        if self.by_name.contains_key(name) {
            return Err(StorageError::DuplicateKey {
                table: PAYLOAD_TABLE,
                key: name.to_string(),
            });
        }
        let receipt = receipt(name, body);
        self.by_name.insert(name.to_string(), self.payloads.len());
        self.payloads.push(StoredPayload {
            name: name.to_string(),
            body: body.to_string(),
            sha256_hex: receipt.sha256_hex.clone(),
        });
        Ok(receipt)
    }
}

/// Writes each payload as a file under `root`. Existing files are never overwritten.
#[derive(Debug, Clone)]
pub struct DirExportSink {
    root: PathBuf,
}

impl DirExportSink {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| io_error(&root, &e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ExportSink for DirExportSink {
    fn write_payload(&mut self, name: &str, body: &str) -> Result<PayloadReceipt, StorageError> {
        validate_payload_name(name)?;
        let path = self.root.join(name);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StorageError::DuplicateKey {
                    table: PAYLOAD_TABLE,
                    key: name.to_string(),
                });
            }
            Err(e) => return Err(io_error(&path, &e)),
        };
        let written = file
            .write_all(body.as_bytes())
            .and_then(|()| file.sync_all());
        drop(file);
        discard_on_failure(&path, written)?;
        Ok(receipt(name, body))
    }
}

/// A payload that was not fully written is removed, so the name stays free for a retry.
fn discard_on_failure(path: &Path, written: io::Result<()>) -> Result<(), StorageError> {
    written.map_err(|e| {
        let _ = fs::remove_file(path);
        io_error(path, &e)
    })
}

fn io_error(path: &Path, err: &io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
