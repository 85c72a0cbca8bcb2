#![forbid(unsafe_code)]

use pairmem_engines::assoc::assign_associations;
use pairmem_engines::recog::{build_image_probes, build_sound_probes};
use pairmem_engines::sampler::{build_practice, sample_learning_images, shuffle};
use pairmem_engines::trialseq::build_learning_trials;
use pairmem_engines::{ScheduleConfig, SchedulingError};
use pairmem_kernel_contracts::catalog::{Catalog, SoundId};
use pairmem_kernel_contracts::schedule::{
    AssociationGroup, AssociationMap, LearningTrial, PracticeTrial, RecognitionProbe,
    ResponseKeyBindings, SoundProbe, SCHEDULE_CONTRACT_VERSION,
};
use pairmem_kernel_contracts::{ContractViolation, SchemaVersion, Validate};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Everything the presentation layer needs for one participant session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub schema_version: SchemaVersion,
    /// Bindings the expected responses were computed with.
    pub keys: ResponseKeyBindings,
    pub groups: Vec<AssociationGroup>,
    pub learning_trials: Vec<LearningTrial>,
    pub image_probes: Vec<RecognitionProbe>,
    pub sound_probes: Vec<SoundProbe>,
    pub reserved_test_sounds: Vec<SoundId>,
    pub practice_trials: Vec<PracticeTrial>,
    pub sound_check: SoundId,
    /// Lowercase hex SHA-256 over trials and probes.
    pub fingerprint: String,
}

impl ScheduleResult {
    pub fn association_map(&self) -> Result<AssociationMap, ContractViolation> {
        AssociationMap::from_trials(&self.learning_trials)
    }

    pub fn fingerprint_matches(&self) -> bool {
        self.compute_fingerprint() == self.fingerprint
    }

    fn compute_fingerprint(&self) -> String {
        fingerprint(
            &self.learning_trials,
            &self.image_probes,
            &self.sound_probes,
            &self.practice_trials,
            &self.sound_check,
        )
    }
}

impl Validate for ScheduleResult {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != SCHEDULE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "schedule_result.schema_version",
                reason: "unsupported schedule schema version",
            });
        }
        self.keys.validate()?;
        for group in &self.groups {
            group.validate()?;
        }
        for probe in &self.sound_probes {
            probe.validate()?;
        }
        if !self.fingerprint_matches() {
            return Err(ContractViolation::InvalidValue {
                field: "schedule_result.fingerprint",
                reason: "does not match trials and probes",
            });
        }
        self.association_map().map(|_| ())
    }
}

/// Runs one complete scheduling pass. Draws from `rng` in a fixed order: sound pool shuffle,
/// per-category image samples, learning image shuffle, block token shuffle, new image sample,
/// old pair shuffle, new pair shuffle, one order draw per sound probe, practice image sample,
/// one sound per practice trial, sound-check sound. Practice draws come last so they never
/// shift the learning and test material drawn from the same seed.
pub fn build_schedule<R>(
    catalog: &Catalog,
    config: &ScheduleConfig,
    rng: &mut R,
) -> Result<ScheduleResult, SchedulingError>
where
    R: Rng + ?Sized,
{
    config.validate()?;

    let mut sounds = catalog.sounds().to_vec();
    shuffle(&mut sounds, rng);
    let images = sample_learning_images(catalog, config, rng)?;
    let plan = assign_associations(&sounds, config, images.len())?;
    let learning_trials = build_learning_trials(&plan.groups, &images, &config.keys, rng)?;
    let image_probes =
        build_image_probes(catalog, &images, config.new_image_count, &config.keys, rng)?;
    let sound_probes = build_sound_probes(&plan, &config.keys, rng)?;
    let practice = build_practice(catalog, config.practice_count, rng)?;

    let mut out = ScheduleResult {
        schema_version: SCHEDULE_CONTRACT_VERSION,
        keys: config.keys.clone(),
        groups: plan.groups,
        learning_trials,
        image_probes,
        sound_probes,
        reserved_test_sounds: plan.reserved_test_sounds,
        practice_trials: practice.trials,
        sound_check: practice.sound_check,
        fingerprint: String::new(),
    };
    out.fingerprint = out.compute_fingerprint();
    tracing::debug!(
        learning_trials = out.learning_trials.len(),
        image_probes = out.image_probes.len(),
        sound_probes = out.sound_probes.len(),
        practice_trials = out.practice_trials.len(),
        fingerprint = %out.fingerprint,
        "schedule built"
    );
    Ok(out)
}

/// Builds `config.candidate_count` schedules back to back from the same `rng`, then spends
/// one more draw to pick the one returned.
pub fn build_schedule_with_candidates<R>(
    catalog: &Catalog,
    config: &ScheduleConfig,
    rng: &mut R,
) -> Result<ScheduleResult, SchedulingError>
where
    R: Rng + ?Sized,
{
    config.validate()?;
    let mut candidates = Vec::with_capacity(config.candidate_count);
    for _ in 0..config.candidate_count {
        candidates.push(build_schedule(catalog, config, rng)?);
    }
    let picked = rng.gen_range(0..candidates.len());
    tracing::debug!(candidates = candidates.len(), picked, "schedule candidate picked");
    Ok(candidates.swap_remove(picked))
}

fn fingerprint(
    trials: &[LearningTrial],
    image_probes: &[RecognitionProbe],
    sound_probes: &[SoundProbe],
    practice_trials: &[PracticeTrial],
    sound_check: &SoundId,
) -> String {
    let mut h = Sha256::new();
    for t in trials {
        h.update(b"L\x1f");
        for part in [
            t.image_id.as_str(),
            t.domain.as_str(),
            t.sound_id.as_str(),
            t.condition.as_str(),
            t.association_id.as_str(),
        ] {
            h.update(part.as_bytes());
            h.update(b"\x1f");
        }
        if let Some(k) = t.expected_response {
            h.update(k.to_string().as_bytes());
        }
        h.update(b"\x1e");
    }
    for p in image_probes {
        h.update(b"I\x1f");
        h.update(p.image_id.as_str().as_bytes());
        h.update(b"\x1f");
        h.update(p.status.as_str().as_bytes());
        h.update(b"\x1f");
        h.update(p.expected_response.to_string().as_bytes());
        h.update(b"\x1e");
    }
    for p in sound_probes {
        h.update(b"S\x1f");
        h.update(p.old_pair.to_string().as_bytes());
        h.update(b"\x1f");
        h.update(p.new_pair.to_string().as_bytes());
        h.update(b"\x1f");
        h.update(p.presentation_order.to_string().as_bytes());
        h.update(b"\x1f");
        h.update(p.expected_response.to_string().as_bytes());
        h.update(b"\x1e");
    }
    for p in practice_trials {
        h.update(b"P\x1f");
        h.update(p.image_id.as_str().as_bytes());
        h.update(b"\x1f");
        h.update(p.sound_id.as_str().as_bytes());
        h.update(b"\x1e");
    }
    h.update(b"C\x1f");
    h.update(sound_check.as_str().as_bytes());
    h.update(b"\x1e");
    format!("{:x}", h.finalize())
}
