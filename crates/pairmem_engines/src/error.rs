#![forbid(unsafe_code)]

use pairmem_kernel_contracts::ContractViolation;

/// Fatal failures of a scheduling run. Nothing built by a failed run may reach presentation.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulingError {
    /// A pool cannot supply the requested number of distinct assets.
    InsufficientAssets {
        pool: String,
        requested: usize,
        available: usize,
    },
    /// An internal count invariant does not hold; never corrected silently.
    ScheduleMismatch {
        what: String,
        expected: usize,
        realized: usize,
    },
    Contract(ContractViolation),
}

impl SchedulingError {
    pub(crate) fn insufficient(pool: impl Into<String>, requested: usize, available: usize) -> Self {
        Self::InsufficientAssets {
            pool: pool.into(),
            requested,
            available,
        }
    }

    pub(crate) fn mismatch(what: impl Into<String>, expected: usize, realized: usize) -> Self {
        Self::ScheduleMismatch {
            what: what.into(),
            expected,
            realized,
        }
    }
}

impl std::fmt::Display for SchedulingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientAssets {
                pool,
                requested,
                available,
            } => write!(
                f,
                "insufficient assets in {pool}: requested {requested}, available {available}"
            ),
            Self::ScheduleMismatch {
                what,
                expected,
                realized,
            } => write!(
                f,
                "schedule mismatch in {what}: expected {expected}, realized {realized}"
            ),
            Self::Contract(err) => write!(f, "contract violation: {err}"),
        }
    }
}

impl std::error::Error for SchedulingError {}

impl From<ContractViolation> for SchedulingError {
    fn from(value: ContractViolation) -> Self {
        Self::Contract(value)
    }
}
