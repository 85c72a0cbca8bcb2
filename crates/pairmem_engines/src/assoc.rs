#![forbid(unsafe_code)]

use pairmem_kernel_contracts::catalog::SoundId;
use pairmem_kernel_contracts::schedule::{
    AssociationGroup, AssociationId, AssociationKind, SoundPair,
};

use crate::{ScheduleConfig, SchedulingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockBudget {
    pub pair_blocks: usize,
    pub singleton_blocks: usize,
}

impl BlockBudget {
    pub fn total_trials(&self) -> usize {
        self.pair_blocks * 2 + self.singleton_blocks
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationPlan {
    /// Pair groups first, then singleton groups.
    pub groups: Vec<AssociationGroup>,
    /// Sounds never heard during learning; the source of new pairs in the sound test.
    pub reserved_test_sounds: Vec<SoundId>,
}

impl AssociationPlan {
    pub fn pair_groups(&self) -> impl Iterator<Item = &AssociationGroup> + '_ {
        self.groups.iter().filter(|g| g.is_pair())
    }

    pub fn total_target_count(&self) -> usize {
        self.groups.iter().map(|g| g.target_count as usize).sum()
    }
}

/// Splits `total_trials` into pair blocks (two trials each) and singleton blocks (one
/// trial each) by the configured weights. The split is exact by construction: singleton
/// blocks absorb whatever the pair blocks leave.
pub fn block_budget(
    total_trials: usize,
    pair_groups: usize,
    singleton_groups: usize,
    pair_block_weight: u32,
    singleton_block_weight: u32,
) -> Result<BlockBudget, SchedulingError> {
    match (pair_groups, singleton_groups) {
        (0, 0) => Err(SchedulingError::mismatch(
            "block budget with no association groups",
            total_trials,
            0,
        )),
        (0, _) => Ok(BlockBudget {
            pair_blocks: 0,
            singleton_blocks: total_trials,
        }),
        (_, 0) => {
            if total_trials % 2 != 0 {
                return Err(SchedulingError::mismatch(
                    "pair-only block budget (trial count must be even)",
                    total_trials,
                    total_trials - 1,
                ));
            }
            Ok(BlockBudget {
                pair_blocks: total_trials / 2,
                singleton_blocks: 0,
            })
        }
        _ => {
            let wp = u64::from(pair_block_weight);
            let ws = u64::from(singleton_block_weight);
            let pair_blocks = (total_trials as u64 * wp / (2 * wp + ws)) as usize;
            Ok(BlockBudget {
                pair_blocks,
                singleton_blocks: total_trials - 2 * pair_blocks,
            })
        }
    }
}

/// Even integer split; the remainder goes to the first groups (40 over 3 is 14, 13, 13).
pub fn split_quota(budget: usize, groups: usize) -> Vec<usize> {
    if groups == 0 {
        return Vec::new();
    }
    let base = budget / groups;
    let remainder = budget % groups;
    (0..groups)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

/// Carves the shuffled sound pool into pair and singleton groups and fixes each group's
/// quota so that the groups fill exactly `total_trials` learning trials.
///
/// Layout of the pool: `[0, P)` first pair members, `[P, 2P)` second pair members,
/// `[2P, 2P + S)` singletons, the rest reserved for the recognition test.
pub fn assign_associations(
    shuffled_sounds: &[SoundId],
    config: &ScheduleConfig,
    total_trials: usize,
) -> Result<AssociationPlan, SchedulingError> {
    let p = config.pair_groups;
    let s = config.singleton_groups;
    let needed = config.sounds_reserved_for_learning();
    if shuffled_sounds.len() < needed {
        return Err(SchedulingError::insufficient(
            "sounds for association groups",
            needed,
            shuffled_sounds.len(),
        ));
    }

    let budget = block_budget(
        total_trials,
        p,
        s,
        config.pair_block_weight,
        config.singleton_block_weight,
    )?;
    if p > 0 && budget.pair_blocks < p {
        return Err(SchedulingError::mismatch(
            "pair blocks (every pair group needs at least one block)",
            p,
            budget.pair_blocks,
        ));
    }
    if s > 0 && budget.singleton_blocks < s {
        return Err(SchedulingError::mismatch(
            "singleton blocks (every singleton group needs at least one block)",
            s,
            budget.singleton_blocks,
        ));
    }

    let mut groups = Vec::with_capacity(p + s);
    for (i, blocks) in split_quota(budget.pair_blocks, p).into_iter().enumerate() {
        let pair = SoundPair::v1(shuffled_sounds[i].clone(), shuffled_sounds[p + i].clone())?;
        groups.push(AssociationGroup::v1(
            AssociationId::new(format!("pair_{:02}", i + 1))?,
            AssociationKind::Pair { pair },
            to_u32(blocks)?,
        )?);
    }
    for (i, blocks) in split_quota(budget.singleton_blocks, s)
        .into_iter()
        .enumerate()
    {
        groups.push(AssociationGroup::v1(
            AssociationId::new(format!("single_{:02}", i + 1))?,
            AssociationKind::Singleton {
                sound: shuffled_sounds[2 * p + i].clone(),
            },
            to_u32(blocks)?,
        )?);
    }

    let plan = AssociationPlan {
        groups,
        reserved_test_sounds: shuffled_sounds[needed..].to_vec(),
    };
    if plan.total_target_count() != total_trials {
        return Err(SchedulingError::mismatch(
            "sum of association target counts",
            total_trials,
            plan.total_target_count(),
        ));
    }
    tracing::debug!(
        pair_blocks = budget.pair_blocks,
        singleton_blocks = budget.singleton_blocks,
        groups = plan.groups.len(),
        reserved_test_sounds = plan.reserved_test_sounds.len(),
        "association groups assigned"
    );
    Ok(plan)
}

fn to_u32(blocks: usize) -> Result<u32, SchedulingError> {
    u32::try_from(blocks).map_err(|_| SchedulingError::mismatch("block quota width", blocks, 0))
}
