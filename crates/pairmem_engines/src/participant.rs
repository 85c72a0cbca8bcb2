#![forbid(unsafe_code)]

use std::fmt;

use pairmem_kernel_contracts::ContractViolation;
use rand::Rng;

pub const INITIALS_MAX_LEN: usize = 8;
/// Suffix numbers 995..=999 are held back for staff and pilot sessions.
pub const FIRST_RESERVED_SUFFIX: u16 = 995;
pub const FILE_NAME_PART_MAX_CHARS: usize = 50;

/// Upper-case initials followed by a zero-padded three digit suffix, e.g. `YT042`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Accepts an id issued earlier (or typed back in by an operator).
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        let raw = raw.trim();
        if raw.len() < 4 || !raw.is_ascii() {
            return Err(ContractViolation::InvalidValue {
                field: "participant_id",
                reason: "must be initials followed by three digits",
            });
        }
        let (initials, suffix) = raw.split_at(raw.len() - 3);
        validate_initials(initials)?;
        if initials.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(ContractViolation::InvalidValue {
                field: "participant_id",
                reason: "initials must be upper-case",
            });
        }
        let number: u16 = suffix
            .parse()
            .ok()
            .filter(|_| suffix.bytes().all(|b| b.is_ascii_digit()))
            .ok_or(ContractViolation::InvalidValue {
                field: "participant_id",
                reason: "must end in three digits",
            })?;
        if number >= FIRST_RESERVED_SUFFIX {
            return Err(ContractViolation::InvalidRange {
                field: "participant_id.suffix",
                min: 0.0,
                max: f64::from(FIRST_RESERVED_SUFFIX - 1),
                got: f64::from(number),
            });
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_initials(initials: &str) -> Result<(), ContractViolation> {
    if initials.is_empty() || initials.len() > INITIALS_MAX_LEN {
        return Err(ContractViolation::InvalidValue {
            field: "participant_id.initials",
            reason: "must be 1..=8 characters",
        });
    }
    if !initials.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ContractViolation::InvalidValue {
            field: "participant_id.initials",
            reason: "must be ASCII letters or digits",
        });
    }
    Ok(())
}

/// Issues a fresh id: trimmed, upper-cased initials plus a suffix drawn uniformly from
/// `000..995`.
pub fn issue_participant_id<R>(initials: &str, rng: &mut R) -> Result<ParticipantId, ContractViolation>
where
    R: Rng + ?Sized,
{
    let initials = initials.trim().to_ascii_uppercase();
    validate_initials(&initials)?;
    let suffix = rng.gen_range(0..FIRST_RESERVED_SUFFIX);
    let id = ParticipantId(format!("{initials}{suffix:03}"));
    tracing::debug!(participant_id = %id, "participant id issued");
    Ok(id)
}

fn is_file_name_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Makes an arbitrary string safe to embed in an export file name: the result only holds
/// `[A-Za-z0-9_.-]` and never starts with `.`.
pub fn sanitize_file_name_part(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "unknown".to_string();
    }
    let mut out = String::with_capacity(trimmed.len());
    let mut in_space = false;
    for c in trimmed.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        out.push(if is_file_name_safe(c) { c } else { '_' });
    }
    if out.starts_with('.') {
        out.replace_range(..1, "_");
    }
    out.chars().take(FILE_NAME_PART_MAX_CHARS).collect()
}
