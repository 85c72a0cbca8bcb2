#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use pairmem_kernel_contracts::schedule::{
    AssociationGroup, AssociationId, LearningTrial, ResponseKeyBindings,
};
use rand::Rng;

use crate::sampler::{shuffle, LearningImage};
use crate::SchedulingError;

/// One presentation of a whole association group. Shuffling happens at this level so a
/// pair's two sub-trials stay adjacent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockToken {
    pub group_index: usize,
}

pub fn expand_tokens(groups: &[AssociationGroup]) -> Vec<BlockToken> {
    groups
        .iter()
        .enumerate()
        .flat_map(|(group_index, g)| {
            std::iter::repeat(BlockToken { group_index }).take(g.target_blocks as usize)
        })
        .collect()
}

/// Builds the learning sequence: tokens are shuffled, flattened in token order and laid
/// onto the already shuffled images one-to-one.
///
/// Fails with `ScheduleMismatch` when the flattened sub-trials do not cover the images
/// exactly or a group's realized count differs from its `target_count`. Images are never
/// reused and groups are never wrapped around.
pub fn build_learning_trials<R>(
    groups: &[AssociationGroup],
    images: &[LearningImage],
    keys: &ResponseKeyBindings,
    rng: &mut R,
) -> Result<Vec<LearningTrial>, SchedulingError>
where
    R: Rng + ?Sized,
{
    let mut tokens = expand_tokens(groups);
    shuffle(&mut tokens, rng);

    let sub_trials: Vec<_> = tokens
        .iter()
        .flat_map(|t| {
            let group = &groups[t.group_index];
            group
                .kind
                .block_members()
                .into_iter()
                .map(move |(sound, condition)| (group, sound, condition))
        })
        .collect();
    if sub_trials.len() != images.len() {
        return Err(SchedulingError::mismatch(
            "learning sub-trials vs sampled images",
            images.len(),
            sub_trials.len(),
        ));
    }

    let trials: Vec<LearningTrial> = sub_trials
        .into_iter()
        .zip(images)
        .map(|((group, sound, condition), image)| LearningTrial {
            image_id: image.image_id.clone(),
            domain: image.domain.clone(),
            sound_id: sound.clone(),
            condition,
            association_id: group.association_id.clone(),
            expected_response: keys.key_for_domain(&image.domain),
        })
        .collect();

    verify_realized_counts(groups, &trials)?;
    tracing::debug!(
        trials = trials.len(),
        blocks = tokens.len(),
        "learning sequence built"
    );
    Ok(trials)
}

pub fn verify_realized_counts(
    groups: &[AssociationGroup],
    trials: &[LearningTrial],
) -> Result<(), SchedulingError> {
    let mut realized: BTreeMap<&AssociationId, usize> = BTreeMap::new();
    for trial in trials {
        *realized.entry(&trial.association_id).or_default() += 1;
    }
    for group in groups {
        let got = realized.remove(&group.association_id).unwrap_or(0);
        if got != group.target_count as usize {
            return Err(SchedulingError::mismatch(
                format!("realized trials for {}", group.association_id),
                group.target_count as usize,
                got,
            ));
        }
    }
    if let Some((id, got)) = realized.into_iter().next() {
        return Err(SchedulingError::mismatch(
            format!("trials for unknown association {id}"),
            0,
            got,
        ));
    }
    Ok(())
}
