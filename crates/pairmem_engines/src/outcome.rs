#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use pairmem_kernel_contracts::catalog::ImageId;
use pairmem_kernel_contracts::outcome::{
    AccuracyTally, RowSet, SummaryStatistics, TaskPhase, TrialMetadata, TrialOutcome,
};
use pairmem_kernel_contracts::schedule::{
    AssociationMap, ConditionLabel, ResponseKey, ResponseKeyBindings, StimulusStatus,
};
use pairmem_kernel_contracts::ContractViolation;
use rust_decimal::Decimal;

/// Placeholder for any value an outcome did not carry.
pub const MISSING: &str = "N/A";

pub const LEARNING_COLUMNS: [&str; 11] = [
    "participant_id",
    "trial_index",
    "image_category_correct",
    "sound_pattern",
    "association_id",
    "image_filename",
    "sound",
    "response_key",
    "response_category",
    "correct",
    "rt",
];

pub const TEST_COLUMNS: [&str; 12] = [
    "participant_id",
    "image_accuracy_A",
    "image_accuracy_B",
    "image_accuracy_X",
    "sound_accuracy",
    "trial_index",
    "task_phase",
    "stimulus",
    "response_key",
    "correct",
    "rt",
    "image_status_or_sound_order",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataGapKind {
    /// An "old" recognition image the association map does not know; left out of accuracy.
    UnmappedOldImage,
    /// A learning outcome for an image the association map does not know; still exported.
    UnmappedLearningImage,
}

/// Recoverable per-row problem found while aggregating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationDataGap {
    pub kind: DataGapKind,
    pub phase: TaskPhase,
    pub image_id: ImageId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationReport {
    pub summary: SummaryStatistics,
    pub learning_rows: RowSet,
    pub test_rows: RowSet,
    pub gaps: Vec<AggregationDataGap>,
}

/// Tallies recognition accuracy and renders both export row sets for one participant.
///
/// Condition accuracy counts only image-recognition outcomes with status "old", looked up in
/// `associations`. Test rows list every image outcome first, then every sound outcome, with
/// one running 1-based index.
pub fn aggregate(
    outcomes: &[TrialOutcome],
    associations: &AssociationMap,
    participant_id: &str,
    keys: &ResponseKeyBindings,
) -> Result<AggregationReport, ContractViolation> {
    let mut gaps = Vec::new();
    let summary = summarize(outcomes, associations, &mut gaps);

    let mut learning_rows = RowSet::v1(header(&LEARNING_COLUMNS))?;
    let learning = outcomes
        .iter()
        .filter(|o| o.phase() == TaskPhase::Learning);
    for (index, outcome) in learning.enumerate() {
        let TrialMetadata::Learning {
            image_id,
            sound_id,
            condition,
            association_id,
        } = &outcome.metadata
        else {
            continue;
        };
        let binding = associations.get(image_id);
        if binding.is_none() {
            gaps.push(gap(DataGapKind::UnmappedLearningImage, TaskPhase::Learning, image_id));
        }
        learning_rows.push_row(vec![
            participant_id.to_string(),
            (index + 1).to_string(),
            or_missing(binding.map(|b| b.domain.as_str())),
            or_missing(
                condition
                    .or(binding.map(|b| b.condition))
                    .map(ConditionLabel::as_str),
            ),
            or_missing(
                association_id
                    .as_ref()
                    .or(binding.map(|b| &b.association_id))
                    .map(|a| a.as_str()),
            ),
            image_id.to_string(),
            or_missing(
                sound_id
                    .as_ref()
                    .or(binding.map(|b| &b.sound_id))
                    .map(|s| s.as_str()),
            ),
            key_or_missing(outcome.response),
            or_missing(
                outcome
                    .response
                    .and_then(|k| keys.domain_for_key(k))
                    .map(|d| d.as_str()),
            ),
            bool_or_missing(outcome.correct),
            rt_or_missing(outcome.rt_ms),
        ])?;
    }

    let summary_columns = summary_columns(participant_id, &summary);
    let mut test_rows = RowSet::v1(header(&TEST_COLUMNS))?;
    let images = outcomes
        .iter()
        .filter(|o| o.phase() == TaskPhase::ImageRecognition);
    let sounds = outcomes
        .iter()
        .filter(|o| o.phase() == TaskPhase::SoundRecognition);
    for (index, outcome) in images.chain(sounds).enumerate() {
        let (stimulus, status_or_order) = match &outcome.metadata {
            TrialMetadata::ImageRecognition { image_id, status } => {
                (image_id.to_string(), status.as_str().to_string())
            }
            TrialMetadata::SoundRecognition {
                old_pair,
                presentation_order,
                ..
            } => (old_pair.to_string(), presentation_order.to_string()),
            TrialMetadata::Learning { .. } => continue,
        };
        let mut row = summary_columns.clone();
        row.extend([
            (index + 1).to_string(),
            outcome.phase().as_str().to_string(),
            stimulus,
            key_or_missing(outcome.response),
            bool_or_missing(outcome.correct),
            rt_or_missing(outcome.rt_ms),
            status_or_order,
        ]);
        test_rows.push_row(row)?;
    }

    tracing::debug!(
        learning_rows = learning_rows.rows().len(),
        test_rows = test_rows.rows().len(),
        gaps = gaps.len(),
        "outcomes aggregated"
    );
    Ok(AggregationReport {
        summary,
        learning_rows,
        test_rows,
        gaps,
    })
}

/// Per-condition, per-association and sound accuracy. Unmapped old images are recorded in
/// `gaps` and skipped.
pub fn summarize(
    outcomes: &[TrialOutcome],
    associations: &AssociationMap,
    gaps: &mut Vec<AggregationDataGap>,
) -> SummaryStatistics {
    let mut per_condition: BTreeMap<ConditionLabel, AccuracyTally> = ConditionLabel::all()
        .iter()
        .map(|c| (*c, AccuracyTally::default()))
        .collect();
    let mut per_association = BTreeMap::new();
    let mut sound = AccuracyTally::default();

    for outcome in outcomes {
        match &outcome.metadata {
            TrialMetadata::ImageRecognition {
                image_id,
                status: StimulusStatus::Old,
            } => {
                let Some(binding) = associations.get(image_id) else {
                    gaps.push(gap(
                        DataGapKind::UnmappedOldImage,
                        TaskPhase::ImageRecognition,
                        image_id,
                    ));
                    continue;
                };
                per_condition
                    .entry(binding.condition)
                    .or_default()
                    .record(outcome.is_correct());
                per_association
                    .entry(binding.association_id.clone())
                    .or_insert_with(AccuracyTally::default)
                    .record(outcome.is_correct());
            }
            TrialMetadata::SoundRecognition { .. } => sound.record(outcome.is_correct()),
            TrialMetadata::ImageRecognition { .. } | TrialMetadata::Learning { .. } => {}
        }
    }

    SummaryStatistics {
        per_condition,
        per_association,
        sound,
    }
}

fn summary_columns(participant_id: &str, summary: &SummaryStatistics) -> Vec<String> {
    let mut cols = vec![participant_id.to_string()];
    cols.extend(
        ConditionLabel::all()
            .iter()
            .map(|c| summary.condition_accuracy(*c))
            .chain(std::iter::once(summary.sound_accuracy()))
            .map(|d: Decimal| d.to_string()),
    );
    cols
}

fn gap(kind: DataGapKind, phase: TaskPhase, image_id: &ImageId) -> AggregationDataGap {
    tracing::warn!(?kind, phase = phase.as_str(), image_id = %image_id, "aggregation data gap");
    AggregationDataGap {
        kind,
        phase,
        image_id: image_id.clone(),
    }
}

fn header(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

fn or_missing(value: Option<&str>) -> String {
    value.unwrap_or(MISSING).to_string()
}

fn key_or_missing(key: Option<ResponseKey>) -> String {
    key.map_or_else(|| MISSING.to_string(), |k| k.to_string())
}

fn bool_or_missing(value: Option<bool>) -> String {
    value.map_or_else(|| MISSING.to_string(), |b| b.to_string())
}

fn rt_or_missing(rt_ms: Option<u64>) -> String {
    rt_ms.map_or_else(|| MISSING.to_string(), |rt| rt.to_string())
}
