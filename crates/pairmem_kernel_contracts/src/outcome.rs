#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{ImageId, SoundId};
use crate::schedule::{
    AssociationId, ConditionLabel, PresentationOrder, ResponseKey, SoundPair, StimulusStatus,
};
use crate::{ContractViolation, Validate};

/// Decimal places kept on every reported percentage.
pub const PERCENTAGE_DP: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Learning,
    ImageRecognition,
    SoundRecognition,
}

impl TaskPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Learning => "learning",
            Self::ImageRecognition => "image_recognition",
            Self::SoundRecognition => "sound_recognition",
        }
    }
}

/// Identifiers the presentation layer echoes back with each recorded response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task_phase", rename_all = "snake_case")]
pub enum TrialMetadata {
    Learning {
        image_id: ImageId,
        #[serde(default)]
        sound_id: Option<SoundId>,
        #[serde(default)]
        condition: Option<ConditionLabel>,
        #[serde(default)]
        association_id: Option<AssociationId>,
    },
    ImageRecognition {
        image_id: ImageId,
        status: StimulusStatus,
    },
    SoundRecognition {
        old_pair: SoundPair,
        new_pair: SoundPair,
        presentation_order: PresentationOrder,
    },
}

impl TrialMetadata {
    pub fn phase(&self) -> TaskPhase {
        match self {
            Self::Learning { .. } => TaskPhase::Learning,
            Self::ImageRecognition { .. } => TaskPhase::ImageRecognition,
            Self::SoundRecognition { .. } => TaskPhase::SoundRecognition,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub metadata: TrialMetadata,
    #[serde(default)]
    pub response: Option<ResponseKey>,
    /// `None` when correctness is undefined (e.g. a learning image with no domain key).
    #[serde(default)]
    pub correct: Option<bool>,
    #[serde(default)]
    pub rt_ms: Option<u64>,
}

impl TrialOutcome {
    pub fn phase(&self) -> TaskPhase {
        self.metadata.phase()
    }

    pub fn is_correct(&self) -> bool {
        self.correct == Some(true)
    }
}

/// `correct / total * 100`, rounded to [`PERCENTAGE_DP`] places; zero when `total` is zero.
/// Always carries exactly [`PERCENTAGE_DP`] places, so `0.00` rather than `0`.
pub fn percentage(correct: u32, total: u32) -> Decimal {
    let mut out = if total == 0 {
        Decimal::ZERO
    } else {
        (Decimal::from(correct) * Decimal::ONE_HUNDRED / Decimal::from(total))
            .round_dp(PERCENTAGE_DP)
    };
    out.rescale(PERCENTAGE_DP);
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyTally {
    pub correct: u32,
    pub total: u32,
}

impl AccuracyTally {
    pub fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }

    pub fn percentage(&self) -> Decimal {
        percentage(self.correct, self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub per_condition: BTreeMap<ConditionLabel, AccuracyTally>,
    pub per_association: BTreeMap<AssociationId, AccuracyTally>,
    pub sound: AccuracyTally,
}

impl SummaryStatistics {
    pub fn condition_accuracy(&self, condition: ConditionLabel) -> Decimal {
        self.per_condition
            .get(&condition)
            .map(AccuracyTally::percentage)
            .unwrap_or_else(|| percentage(0, 0))
    }

    /// Every condition, including ones with no outcomes (reported as zero).
    pub fn per_condition_accuracy(&self) -> BTreeMap<ConditionLabel, Decimal> {
        ConditionLabel::all()
            .iter()
            .map(|c| (*c, self.condition_accuracy(*c)))
            .collect()
    }

    pub fn sound_accuracy(&self) -> Decimal {
        self.sound.percentage()
    }
}

/// Header plus rows of one CSV-shaped export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSet {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RowSet {
    pub fn v1(header: Vec<String>) -> Result<Self, ContractViolation> {
        let set = Self {
            header,
            rows: Vec::new(),
        };
        set.validate()?;
        Ok(set)
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<(), ContractViolation> {
        if row.len() != self.header.len() {
            return Err(ContractViolation::InvalidValue {
                field: "row_set.rows",
                reason: "row width must match header width",
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Header line followed by one line per row, `\n`-separated, no trailing newline.
    pub fn to_csv_text(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(csv_line(&self.header));
        for row in &self.rows {
            lines.push(csv_line(row));
        }
        lines.join("\n")
    }
}

impl Validate for RowSet {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.header.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "row_set.header",
                reason: "must not be empty",
            });
        }
        if self.rows.iter().any(|r| r.len() != self.header.len()) {
            return Err(ContractViolation::InvalidValue {
                field: "row_set.rows",
                reason: "row width must match header width",
            });
        }
        Ok(())
    }
}

fn csv_line(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_outcome_01_zero_total_is_zero_not_nan() {
        assert_eq!(percentage(0, 0), Decimal::ZERO);
        assert_eq!(percentage(0, 0).to_string(), "0.00");
        assert_eq!(percentage(0, 5).to_string(), "0.00");
    }

    #[test]
    fn at_outcome_02_percentage_is_fixed_two_places() {
        assert_eq!(percentage(7, 10).to_string(), "70.00");
        assert_eq!(percentage(2, 3).to_string(), "66.67");
        assert_eq!(percentage(3, 3).to_string(), "100.00");
    }

    #[test]
    fn at_outcome_03_csv_quotes_only_when_needed() {
        let mut set = RowSet::v1(vec!["a".to_string(), "b".to_string()]).unwrap();
        set.push_row(vec!["x,y".to_string(), "plain".to_string()])
            .unwrap();
        set.push_row(vec!["say \"hi\"".to_string(), String::new()])
            .unwrap();
        assert_eq!(set.to_csv_text(), "a,b\n\"x,y\",plain\n\"say \"\"hi\"\"\",");
        assert!(set.push_row(vec!["only_one".to_string()]).is_err());
    }

    #[test]
    fn at_outcome_04_outcome_json_is_tagged_by_phase() {
        let json = r#"{
            "metadata": {"task_phase": "image_recognition", "image_id": "a.jpg", "status": "old"},
            "response": "j",
            "correct": true,
            "rt_ms": 512
        }"#;
        let outcome: TrialOutcome = serde_json::from_str(json).unwrap();
        assert_eq!(outcome.phase(), TaskPhase::ImageRecognition);
        assert!(outcome.is_correct());
        assert_eq!(outcome.response.map(ResponseKey::as_char), Some('j'));
    }
}
