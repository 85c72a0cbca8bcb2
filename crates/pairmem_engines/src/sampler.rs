#![forbid(unsafe_code)]

use pairmem_kernel_contracts::catalog::{Catalog, CategoryKey, Domain, ImageId, SoundId};
use pairmem_kernel_contracts::schedule::PracticeTrial;
use rand::seq::{index, SliceRandom};
use rand::Rng;

use crate::{ScheduleConfig, SchedulingError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningImage {
    pub image_id: ImageId,
    pub domain: Domain,
}

/// Draws `n` distinct elements of `pool` without replacement, in random order.
pub fn sample<T, R>(
    pool: &[T],
    n: usize,
    rng: &mut R,
    pool_name: &str,
) -> Result<Vec<T>, SchedulingError>
where
    T: Clone,
    R: Rng + ?Sized,
{
    if n > pool.len() {
        return Err(SchedulingError::insufficient(pool_name, n, pool.len()));
    }
    Ok(index::sample(rng, pool.len(), n)
        .into_iter()
        .map(|i| pool[i].clone())
        .collect())
}

pub fn shuffle<T, R>(items: &mut [T], rng: &mut R)
where
    R: Rng + ?Sized,
{
    items.shuffle(rng);
}

/// Samples `images_per_category` images from every learning category in configured order,
/// then shuffles the concatenation. A configured category missing from the catalog is an
/// empty pool, not a skipped one.
pub fn sample_learning_images<R>(
    catalog: &Catalog,
    config: &ScheduleConfig,
    rng: &mut R,
) -> Result<Vec<LearningImage>, SchedulingError>
where
    R: Rng + ?Sized,
{
    let keys: Vec<CategoryKey> = if config.learning_categories.is_empty() {
        catalog.category_keys()
    } else {
        config.learning_categories.clone()
    };
    if keys.is_empty() {
        return Err(SchedulingError::insufficient("learning categories", 1, 0));
    }

    let mut out = Vec::with_capacity(keys.len() * config.images_per_category);
    for key in &keys {
        let category = catalog
            .category(key)
            .ok_or_else(|| {
                SchedulingError::insufficient(format!("images:{key}"), config.images_per_category, 0)
            })?;
        let drawn = sample(
            &category.images,
            config.images_per_category,
            rng,
            &format!("images:{key}"),
        )?;
        out.extend(drawn.into_iter().map(|image_id| LearningImage {
            image_id,
            domain: category.domain.clone(),
        }));
    }
    shuffle(&mut out, rng);
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticePlan {
    pub trials: Vec<PracticeTrial>,
    /// Played once before practice so the participant can set the volume.
    pub sound_check: SoundId,
}

/// Samples `count` practice images without replacement, then one sound per practice trial
/// and finally the sound-check sound. Sounds come from the whole catalog pool and may repeat.
pub fn build_practice<R>(
    catalog: &Catalog,
    count: usize,
    rng: &mut R,
) -> Result<PracticePlan, SchedulingError>
where
    R: Rng + ?Sized,
{
    let images = sample(catalog.practice_images(), count, rng, "practice images")?;
    let sounds = catalog.sounds();
    if sounds.is_empty() {
        return Err(SchedulingError::insufficient("sounds", 1, 0));
    }
    let trials = images
        .into_iter()
        .map(|image_id| PracticeTrial {
            image_id,
            sound_id: sounds[rng.gen_range(0..sounds.len())].clone(),
        })
        .collect();
    let sound_check = sounds[rng.gen_range(0..sounds.len())].clone();
    Ok(PracticePlan {
        trials,
        sound_check,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairmem_kernel_contracts::catalog::{ImageCategory, Subcategory};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeSet;

    #[test]
    fn at_sampler_01_draws_distinct_elements() {
        let pool: Vec<u32> = (0..50).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let out = sample(&pool, 12, &mut rng, "numbers").unwrap();
        assert_eq!(out.len(), 12);
        let unique: BTreeSet<_> = out.iter().collect();
        assert_eq!(unique.len(), 12);
        assert!(out.iter().all(|v| pool.contains(v)));
    }

    #[test]
    fn at_sampler_02_oversized_request_fails() {
        let pool = vec!["a", "b"];
        let mut rng = StdRng::seed_from_u64(1);
        let err = sample(&pool, 3, &mut rng, "letters").unwrap_err();
        assert_eq!(
            err,
            SchedulingError::InsufficientAssets {
                pool: "letters".to_string(),
                requested: 3,
                available: 2,
            }
        );
    }

    #[test]
    fn at_sampler_03_same_seed_same_draw() {
        let pool: Vec<u32> = (0..100).collect();
        let a = sample(&pool, 30, &mut StdRng::seed_from_u64(42), "n").unwrap();
        let b = sample(&pool, 30, &mut StdRng::seed_from_u64(42), "n").unwrap();
        assert_eq!(a, b);
    }

    fn catalog() -> Catalog {
        let cat = |domain: &str, sub: &str, n: usize| {
            ImageCategory::v1(
                Domain::new(domain).unwrap(),
                Subcategory::new(sub).unwrap(),
                (0..n)
                    .map(|i| ImageId::new(format!("{domain}/{sub}/{i}.jpg")).unwrap())
                    .collect(),
            )
            .unwrap()
        };
        Catalog::v1(
            vec![cat("indoor", "gym", 20), cat("outdoor", "beach", 20)],
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn at_sampler_05_learning_images_carry_their_domain() {
        let cfg = ScheduleConfig {
            images_per_category: 5,
            ..ScheduleConfig::mvp_v1()
        };
        let out = sample_learning_images(&catalog(), &cfg, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(out.len(), 10);
        for img in &out {
            assert!(img.image_id.as_str().starts_with(img.domain.as_str()));
        }
        let unique: BTreeSet<_> = out.iter().map(|i| &i.image_id).collect();
        assert_eq!(unique.len(), 10);
    }

    #[test]
    fn at_sampler_06_unknown_configured_category_is_insufficient() {
        let cfg = ScheduleConfig {
            learning_categories: vec![CategoryKey::new(
                Domain::new("outdoor").unwrap(),
                Subcategory::new("desert").unwrap(),
            )],
            ..ScheduleConfig::mvp_v1()
        };
        let err = sample_learning_images(&catalog(), &cfg, &mut StdRng::seed_from_u64(9))
            .unwrap_err();
        assert!(matches!(err, SchedulingError::InsufficientAssets { .. }));
    }

    #[test]
    fn at_sampler_07_small_category_is_insufficient() {
        let cfg = ScheduleConfig {
            images_per_category: 21,
            ..ScheduleConfig::mvp_v1()
        };
        let err = sample_learning_images(&catalog(), &cfg, &mut StdRng::seed_from_u64(9))
            .unwrap_err();
        assert_eq!(
            err,
            SchedulingError::InsufficientAssets {
                pool: "images:indoor/gym".to_string(),
                requested: 21,
                available: 20,
            }
        );
    }

    #[test]
    fn at_sampler_04_full_draw_is_a_permutation() {
        let pool: Vec<u32> = (0..20).collect();
        let mut out = sample(&pool, 20, &mut StdRng::seed_from_u64(3), "n").unwrap();
        out.sort_unstable();
        assert_eq!(out, pool);
    }

    fn practice_catalog(practice: usize) -> Catalog {
        catalog()
            .with_practice_images(
                (0..practice)
                    .map(|i| ImageId::new(format!("practice/{i}.jpg")).unwrap())
                    .collect(),
            )
            .unwrap()
    }

    #[test]
    fn at_sampler_08_practice_needs_a_sound_pool() {
        let err = build_practice(&practice_catalog(10), 3, &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert_eq!(err, SchedulingError::insufficient("sounds", 1, 0));
    }

    #[test]
    fn at_sampler_09_practice_draws_from_its_own_pool() {
        let catalog = Catalog::v1(
            catalog().categories().to_vec(),
            (0..4)
                .map(|i| SoundId::new(format!("s{i}.wav")).unwrap())
                .collect(),
        )
        .unwrap()
        .with_practice_images(practice_catalog(10).practice_images().to_vec())
        .unwrap();

        let plan = build_practice(&catalog, 3, &mut StdRng::seed_from_u64(4)).unwrap();
        assert_eq!(plan.trials.len(), 3);
        let images: BTreeSet<_> = plan.trials.iter().map(|t| &t.image_id).collect();
        assert_eq!(images.len(), 3);
        for t in &plan.trials {
            assert!(catalog.practice_images().contains(&t.image_id));
            assert!(catalog.sounds().contains(&t.sound_id));
        }
        assert!(catalog.sounds().contains(&plan.sound_check));

        let err = build_practice(&catalog, 11, &mut StdRng::seed_from_u64(4)).unwrap_err();
        assert!(matches!(err, SchedulingError::InsufficientAssets { .. }));
    }
}
