#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use pairmem_kernel_contracts::catalog::{Catalog, ImageId, SoundId};
use pairmem_kernel_contracts::schedule::{
    AssociationKind, PresentationOrder, RecognitionProbe, ResponseKeyBindings, SoundPair,
    SoundProbe, StimulusStatus,
};
use rand::Rng;

use crate::assoc::AssociationPlan;
use crate::sampler::{sample, shuffle, LearningImage};
use crate::SchedulingError;

/// Old probes for every learning image (learning order), then `new_image_count` new probes
/// sampled from the catalog images that were not learned, walked in catalog order.
///
/// Presentation order of the image test belongs to the presentation layer.
pub fn build_image_probes<R>(
    catalog: &Catalog,
    learning_images: &[LearningImage],
    new_image_count: usize,
    keys: &ResponseKeyBindings,
    rng: &mut R,
) -> Result<Vec<RecognitionProbe>, SchedulingError>
where
    R: Rng + ?Sized,
{
    let learned: BTreeSet<&ImageId> = learning_images.iter().map(|i| &i.image_id).collect();
    let unused: Vec<ImageId> = catalog
        .all_images()
        .filter(|id| !learned.contains(id))
        .cloned()
        .collect();
    let new_images = sample(&unused, new_image_count, rng, "unlearned images")?;

    let probes: Vec<RecognitionProbe> = learning_images
        .iter()
        .map(|i| RecognitionProbe::v1(i.image_id.clone(), StimulusStatus::Old, keys))
        .chain(
            new_images
                .into_iter()
                .map(|id| RecognitionProbe::v1(id, StimulusStatus::New, keys)),
        )
        .collect();
    tracing::debug!(
        old = learning_images.len(),
        new = new_image_count,
        "image recognition probes built"
    );
    Ok(probes)
}

/// New pairs are consecutive sounds from the reserved pool: `(r0, r1), (r2, r3), ...`.
pub fn new_sound_pairs(
    reserved: &[SoundId],
    count: usize,
) -> Result<Vec<SoundPair>, SchedulingError> {
    if reserved.len() < count * 2 {
        return Err(SchedulingError::insufficient(
            "reserved sounds for new pairs",
            count * 2,
            reserved.len(),
        ));
    }
    reserved
        .chunks_exact(2)
        .take(count)
        .map(|c| SoundPair::v1(c[0].clone(), c[1].clone()).map_err(SchedulingError::from))
        .collect()
}

/// One two-alternative probe per learned pair. Old and new pair lists are shuffled
/// independently, zipped, and each probe then draws its presentation order.
pub fn build_sound_probes<R>(
    plan: &AssociationPlan,
    keys: &ResponseKeyBindings,
    rng: &mut R,
) -> Result<Vec<SoundProbe>, SchedulingError>
where
    R: Rng + ?Sized,
{
    let mut old_pairs: Vec<SoundPair> = plan
        .pair_groups()
        .filter_map(|g| match &g.kind {
            AssociationKind::Pair { pair } => Some(pair.clone()),
            AssociationKind::Singleton { .. } => None,
        })
        .collect();
    let mut new_pairs = new_sound_pairs(&plan.reserved_test_sounds, old_pairs.len())?;
    shuffle(&mut old_pairs, rng);
    shuffle(&mut new_pairs, rng);

    let mut probes = Vec::with_capacity(old_pairs.len());
    for (old_pair, new_pair) in old_pairs.into_iter().zip(new_pairs) {
        let order = if rng.gen_bool(0.5) {
            PresentationOrder::OldFirst
        } else {
            PresentationOrder::NewFirst
        };
        probes.push(SoundProbe::v1(old_pair, new_pair, order, keys)?);
    }
    tracing::debug!(probes = probes.len(), "sound recognition probes built");
    Ok(probes)
}
