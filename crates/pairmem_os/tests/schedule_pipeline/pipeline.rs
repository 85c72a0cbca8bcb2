#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use pairmem_engines::ScheduleConfig;
use pairmem_kernel_contracts::catalog::{Catalog, Domain, ImageCategory, ImageId, SoundId, Subcategory};
use pairmem_kernel_contracts::schedule::{AssociationKind, ConditionLabel, StimulusStatus};
use pairmem_os::{build_schedule, build_schedule_with_candidates};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

const INDOOR: [&str; 5] = ["kitchen", "bedroom", "office", "library", "gym"];
const OUTDOOR: [&str; 5] = ["beach", "forest", "street", "desert", "mountain"];

const PRACTICE: [&str; 10] = [
    "amusementpark", "bar", "barm", "bedroom", "bridge", "campsite", "coast",
    "conferenceroom", "empty", "studio",
];

/// 10 categories of 20 images, 40 sounds and a separate pool of 10 practice scenes.
fn lab_catalog() -> Catalog {
    let mut categories = Vec::new();
    for (domain, subs) in [("indoor", INDOOR), ("outdoor", OUTDOOR)] {
        for sub in subs {
            categories.push(
                ImageCategory::v1(
                    Domain::new(domain).unwrap(),
                    Subcategory::new(sub).unwrap(),
                    (0..20)
                        .map(|i| ImageId::new(format!("{domain}/{sub}/{sub}_{i:02}.jpg")).unwrap())
                        .collect(),
                )
                .unwrap(),
            );
        }
    }
    let sounds = (0..40)
        .map(|i| SoundId::new(format!("sounds/pattern_{i:02}.wav")).unwrap())
        .collect();
    let practice = PRACTICE
        .iter()
        .map(|p| ImageId::new(format!("practice/scenes/{p}.jpg")).unwrap())
        .collect();
    Catalog::v1(categories, sounds)
        .unwrap()
        .with_practice_images(practice)
        .unwrap()
}

fn lab_config() -> ScheduleConfig {
    ScheduleConfig {
        singleton_groups: 6,
        practice_count: 3,
        ..ScheduleConfig::mvp_v1()
    }
}

#[test]
fn at_pipeline_01_lab_scenario_counts() {
    let out = build_schedule(&lab_catalog(), &lab_config(), &mut StdRng::seed_from_u64(2026))
        .unwrap();
    assert_eq!(out.learning_trials.len(), 120);

    let pair_blocks: Vec<u32> = out
        .groups
        .iter()
        .filter(|g| g.is_pair())
        .map(|g| g.target_blocks)
        .collect();
    let single_blocks: Vec<u32> = out
        .groups
        .iter()
        .filter(|g| !g.is_pair())
        .map(|g| g.target_blocks)
        .collect();
    assert_eq!(pair_blocks, vec![14, 13, 13]);
    assert_eq!(single_blocks, vec![7, 7, 7, 7, 6, 6]);

    let mut realized: BTreeMap<_, u32> = BTreeMap::new();
    for t in &out.learning_trials {
        *realized.entry(t.association_id.clone()).or_default() += 1;
    }
    for g in &out.groups {
        assert_eq!(realized[&g.association_id], g.target_count);
    }

    let per_condition = |c: ConditionLabel| {
        out.learning_trials
            .iter()
            .filter(|t| t.condition == c)
            .count()
    };
    assert_eq!(per_condition(ConditionLabel::A), 40);
    assert_eq!(per_condition(ConditionLabel::B), 40);
    assert_eq!(per_condition(ConditionLabel::X), 40);

    assert_eq!(out.image_probes.len(), 150);
    assert_eq!(out.sound_probes.len(), 3);
}

#[test]
fn at_pipeline_02_learning_and_new_images_are_disjoint() {
    let out = build_schedule(&lab_catalog(), &lab_config(), &mut StdRng::seed_from_u64(7))
        .unwrap();
    let learned: BTreeSet<_> = out.learning_trials.iter().map(|t| &t.image_id).collect();
    assert_eq!(learned.len(), 120);
    let new: BTreeSet<_> = out
        .image_probes
        .iter()
        .filter(|p| p.status == StimulusStatus::New)
        .map(|p| &p.image_id)
        .collect();
    assert_eq!(new.len(), 30);
    assert!(learned.is_disjoint(&new));
}

#[test]
fn at_pipeline_03_sound_roles_are_disjoint() {
    let out = build_schedule(&lab_catalog(), &lab_config(), &mut StdRng::seed_from_u64(7))
        .unwrap();
    let mut pair_sounds = BTreeSet::new();
    let mut singleton_sounds = BTreeSet::new();
    for g in &out.groups {
        match &g.kind {
            AssociationKind::Pair { pair } => pair_sounds.extend(pair.members()),
            AssociationKind::Singleton { sound } => {
                singleton_sounds.insert(sound);
            }
        }
    }
    let new_pair_sounds: BTreeSet<_> = out
        .sound_probes
        .iter()
        .flat_map(|p| p.new_pair.members())
        .collect();
    assert_eq!(pair_sounds.len(), 6);
    assert_eq!(singleton_sounds.len(), 6);
    assert_eq!(new_pair_sounds.len(), 6);
    assert!(pair_sounds.is_disjoint(&singleton_sounds));
    assert!(pair_sounds.is_disjoint(&new_pair_sounds));
    assert!(singleton_sounds.is_disjoint(&new_pair_sounds));
}

#[test]
fn at_pipeline_06_practice_images_stay_out_of_learning_and_test() {
    let catalog = lab_catalog();
    let out = build_schedule(&catalog, &lab_config(), &mut StdRng::seed_from_u64(31)).unwrap();
    let practice: BTreeSet<_> = out.practice_trials.iter().map(|t| &t.image_id).collect();
    assert_eq!(practice.len(), 3);
    assert!(practice
        .iter()
        .all(|id| catalog.practice_images().contains(*id)));

    let learned: BTreeSet<_> = out.learning_trials.iter().map(|t| &t.image_id).collect();
    let tested: BTreeSet<_> = out.image_probes.iter().map(|p| &p.image_id).collect();
    assert!(practice.is_disjoint(&learned));
    assert!(practice.is_disjoint(&tested));
    for t in &out.practice_trials {
        assert!(catalog.sounds().contains(&t.sound_id));
    }
    assert!(catalog.sounds().contains(&out.sound_check));
}

#[test]
fn at_pipeline_04_catalog_too_small_for_new_images() {
    let cfg = ScheduleConfig {
        new_image_count: 81,
        ..lab_config()
    };
    let err = build_schedule(&lab_catalog(), &cfg, &mut StdRng::seed_from_u64(1)).unwrap_err();
    assert!(err.to_string().contains("unlearned images"));
}

#[test]
fn at_pipeline_05_candidates_are_seed_deterministic() {
    let cfg = ScheduleConfig {
        candidate_count: 4,
        ..lab_config()
    };
    let a = build_schedule_with_candidates(&lab_catalog(), &cfg, &mut StdRng::seed_from_u64(5))
        .unwrap();
    let b = build_schedule_with_candidates(&lab_catalog(), &cfg, &mut StdRng::seed_from_u64(5))
        .unwrap();
    assert_eq!(a.fingerprint, b.fingerprint);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn same_seed_same_schedule(seed in any::<u64>()) {
        let a = build_schedule(&lab_catalog(), &lab_config(), &mut StdRng::seed_from_u64(seed));
        let b = build_schedule(&lab_catalog(), &lab_config(), &mut StdRng::seed_from_u64(seed));
        let (a, b) = (a.unwrap(), b.unwrap());
        prop_assert_eq!(&a.learning_trials, &b.learning_trials);
        prop_assert_eq!(&a.fingerprint, &b.fingerprint);
    }
}
