#![forbid(unsafe_code)]

use std::fmt;

use pairmem_engines::outcome::{aggregate, AggregationReport};
use pairmem_engines::participant::{sanitize_file_name_part, ParticipantId};
use pairmem_kernel_contracts::outcome::TrialOutcome;
use pairmem_kernel_contracts::schedule::{AssociationMap, ResponseKeyBindings};
use pairmem_kernel_contracts::{ContractViolation, Validate};
use pairmem_storage::{ExportSink, PayloadReceipt, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportWiringConfig {
    pub export_enabled: bool,
    pub max_rows_per_payload: u32,
}

impl ExportWiringConfig {
    pub fn mvp_v1(export_enabled: bool) -> Self {
        Self {
            export_enabled,
            max_rows_per_payload: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportInput {
    pub participant_id: ParticipantId,
    /// Caller-supplied session stamp; sanitized before it reaches a file name.
    pub stamp: String,
    pub keys: ResponseKeyBindings,
}

impl ExportInput {
    pub fn v1(
        participant_id: ParticipantId,
        stamp: String,
        keys: ResponseKeyBindings,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            participant_id,
            stamp,
            keys,
        };
        input.validate()?;
        Ok(input)
    }

    pub fn learning_file_name(&self) -> String {
        format!(
            "learning_{}_{}.csv",
            sanitize_file_name_part(self.participant_id.as_str()),
            sanitize_file_name_part(&self.stamp)
        )
    }

    pub fn test_file_name(&self) -> String {
        format!(
            "test_{}_{}.csv",
            sanitize_file_name_part(self.participant_id.as_str()),
            sanitize_file_name_part(&self.stamp)
        )
    }
}

impl Validate for ExportInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.stamp.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "export_input.stamp",
                reason: "must not be empty",
            });
        }
        self.keys.validate()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportReceipt {
    pub report: AggregationReport,
    pub learning: PayloadReceipt,
    pub test: PayloadReceipt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportWiringOutcome {
    NotInvokedDisabled,
    Exported(ExportReceipt),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportError {
    Contract(ContractViolation),
    Storage(StorageError),
    /// The learning payload was written but the test payload was not.
    PartialWrite {
        written: PayloadReceipt,
        source: StorageError,
    },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contract(v) => write!(f, "contract violation: {v}"),
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::PartialWrite { written, source } => write!(
                f,
                "storage error after writing {}: {source}",
                written.name
            ),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<ContractViolation> for ExportError {
    fn from(v: ContractViolation) -> Self {
        Self::Contract(v)
    }
}

impl From<StorageError> for ExportError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

/// Aggregates one participant's outcomes and writes the learning and test payloads.
#[derive(Debug, Clone)]
pub struct ExportWiring<S>
where
    S: ExportSink,
{
    config: ExportWiringConfig,
    sink: S,
}

impl<S> ExportWiring<S>
where
    S: ExportSink,
{
    pub fn new(config: ExportWiringConfig, sink: S) -> Result<Self, ContractViolation> {
        if config.max_rows_per_payload == 0 || config.max_rows_per_payload > 1_000_000 {
            return Err(ContractViolation::InvalidValue {
                field: "export_wiring_config.max_rows_per_payload",
                reason: "must be within 1..=1_000_000",
            });
        }
        Ok(Self { config, sink })
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Writes the learning payload, then the test payload. Sinks are append-only, so a
    /// failure on the second write is returned as `PartialWrite` naming the payload that
    /// already landed.
    pub fn run_export(
        &mut self,
        input: &ExportInput,
        outcomes: &[TrialOutcome],
        associations: &AssociationMap,
    ) -> Result<ExportWiringOutcome, ExportError> {
        input.validate()?;
        if !self.config.export_enabled {
            return Ok(ExportWiringOutcome::NotInvokedDisabled);
        }

        let report = aggregate(
            outcomes,
            associations,
            input.participant_id.as_str(),
            &input.keys,
        )?;
        let limit = self.config.max_rows_per_payload as usize;
        if report.learning_rows.rows().len() > limit || report.test_rows.rows().len() > limit {
            return Err(ExportError::Contract(ContractViolation::InvalidValue {
                field: "export_wiring_config.max_rows_per_payload",
                reason: "row set exceeds the configured payload limit",
            }));
        }

        let learning = self.sink.write_payload(
            &input.learning_file_name(),
            &report.learning_rows.to_csv_text(),
        )?;
        let test = match self
            .sink
            .write_payload(&input.test_file_name(), &report.test_rows.to_csv_text())
        {
            Ok(test) => test,
            Err(source) => {
                tracing::warn!(
                    participant_id = %input.participant_id,
                    written = %learning.name,
                    error = %source,
                    "test payload write failed after learning payload"
                );
                return Err(ExportError::PartialWrite {
                    written: learning,
                    source,
                });
            }
        };
        tracing::info!(
            participant_id = %input.participant_id,
            learning = %learning.name,
            test = %test.name,
            gaps = report.gaps.len(),
            "export payloads written"
        );
        Ok(ExportWiringOutcome::Exported(ExportReceipt {
            report,
            learning,
            test,
        }))
    }
}
