#![forbid(unsafe_code)]

use pairmem_kernel_contracts::catalog::CategoryKey;
use pairmem_kernel_contracts::schedule::ResponseKeyBindings;
use pairmem_kernel_contracts::{ContractViolation, Validate};
use serde::{Deserialize, Serialize};

/// Knobs of one scheduling run.
///
/// Every count that earlier revisions of the experiment hard-coded (pairs vs singletons,
/// images per category, new-image count) lives here. Missing JSON fields fall back to the
/// `mvp_v1` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Categories sampled for learning, in draw order. Empty means every catalog category.
    #[serde(default)]
    pub learning_categories: Vec<CategoryKey>,
    #[serde(default = "ScheduleConfig::default_images_per_category")]
    pub images_per_category: usize,
    #[serde(default = "ScheduleConfig::default_pair_groups")]
    pub pair_groups: usize,
    #[serde(default = "ScheduleConfig::default_singleton_groups")]
    pub singleton_groups: usize,
    /// Relative share of pair blocks in the block budget.
    #[serde(default = "ScheduleConfig::default_block_weight")]
    pub pair_block_weight: u32,
    #[serde(default = "ScheduleConfig::default_block_weight")]
    pub singleton_block_weight: u32,
    #[serde(default = "ScheduleConfig::default_new_image_count")]
    pub new_image_count: usize,
    /// Independent schedules generated before one is picked.
    #[serde(default = "ScheduleConfig::default_candidate_count")]
    pub candidate_count: usize,
    /// Practice trials drawn from the catalog's practice pool. Zero skips practice.
    #[serde(default)]
    pub practice_count: usize,
    #[serde(default = "ResponseKeyBindings::mvp_v1")]
    pub keys: ResponseKeyBindings,
}

impl ScheduleConfig {
    fn default_images_per_category() -> usize {
        12
    }
    fn default_pair_groups() -> usize {
        3
    }
    fn default_singleton_groups() -> usize {
        3
    }
    fn default_block_weight() -> u32 {
        1
    }
    fn default_new_image_count() -> usize {
        30
    }
    fn default_candidate_count() -> usize {
        1
    }

    pub fn mvp_v1() -> Self {
        Self {
            learning_categories: Vec::new(),
            images_per_category: Self::default_images_per_category(),
            pair_groups: Self::default_pair_groups(),
            singleton_groups: Self::default_singleton_groups(),
            pair_block_weight: Self::default_block_weight(),
            singleton_block_weight: Self::default_block_weight(),
            new_image_count: Self::default_new_image_count(),
            candidate_count: Self::default_candidate_count(),
            practice_count: 0,
            keys: ResponseKeyBindings::mvp_v1(),
        }
    }

    pub fn sounds_reserved_for_learning(&self) -> usize {
        self.pair_groups * 2 + self.singleton_groups
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

impl Validate for ScheduleConfig {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.images_per_category == 0 || self.images_per_category > 10_000 {
            return Err(ContractViolation::InvalidValue {
                field: "schedule_config.images_per_category",
                reason: "must be within 1..=10_000",
            });
        }
        if self.pair_groups > 99 || self.singleton_groups > 99 {
            return Err(ContractViolation::InvalidValue {
                field: "schedule_config.pair_groups",
                reason: "pair_groups and singleton_groups must be <= 99",
            });
        }
        if self.pair_groups + self.singleton_groups == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "schedule_config.singleton_groups",
                reason: "at least one association group is required",
            });
        }
        if self.pair_groups > 0 && self.pair_block_weight == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "schedule_config.pair_block_weight",
                reason: "must be > 0 when pair_groups > 0",
            });
        }
        if self.singleton_groups > 0 && self.singleton_block_weight == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "schedule_config.singleton_block_weight",
                reason: "must be > 0 when singleton_groups > 0",
            });
        }
        if self.candidate_count == 0 || self.candidate_count > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "schedule_config.candidate_count",
                reason: "must be within 1..=64",
            });
        }
        if self.practice_count > 100 {
            return Err(ContractViolation::InvalidValue {
                field: "schedule_config.practice_count",
                reason: "must be <= 100",
            });
        }
        let mut seen = std::collections::BTreeSet::new();
        for key in &self.learning_categories {
            if !seen.insert(key) {
                return Err(ContractViolation::Duplicate {
                    field: "schedule_config.learning_categories",
                    value: key.to_string(),
                });
            }
        }
        self.keys.validate()
    }
}
