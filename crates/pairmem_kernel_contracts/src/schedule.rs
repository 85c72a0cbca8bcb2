#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{Domain, ImageId, SoundId};
use crate::common::validate_token;
use crate::{ContractViolation, SchemaVersion, Validate};

pub const SCHEDULE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// A single keyboard key as reported by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub struct ResponseKey(char);

impl ResponseKey {
    pub fn new(key: char) -> Result<Self, ContractViolation> {
        let v = Self(key);
        v.validate()?;
        Ok(v)
    }

    pub fn as_char(self) -> char {
        self.0
    }
}

impl Validate for ResponseKey {
    fn validate(&self) -> Result<(), ContractViolation> {
        if !(self.0.is_ascii_graphic() || self.0 == ' ') {
            return Err(ContractViolation::InvalidValue {
                field: "response_key",
                reason: "must be a printable ASCII key",
            });
        }
        Ok(())
    }
}

impl TryFrom<char> for ResponseKey {
    type Error = ContractViolation;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResponseKey> for char {
    fn from(value: ResponseKey) -> Self {
        value.0
    }
}

impl fmt::Display for ResponseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which keys mean what, for every judgement the experiment asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseKeyBindings {
    pub old: ResponseKey,
    pub new: ResponseKey,
    pub first_slot: ResponseKey,
    pub second_slot: ResponseKey,
    /// Learning-phase category judgement (e.g. indoor vs outdoor).
    pub domain_keys: BTreeMap<Domain, ResponseKey>,
}

impl ResponseKeyBindings {
    pub fn mvp_v1() -> Self {
        let j = ResponseKey('j');
        let k = ResponseKey('k');
        let mut domain_keys = BTreeMap::new();
        domain_keys.insert(Domain::from_static("indoor"), j);
        domain_keys.insert(Domain::from_static("outdoor"), k);
        Self {
            old: j,
            new: k,
            first_slot: j,
            second_slot: k,
            domain_keys,
        }
    }

    pub fn key_for_domain(&self, domain: &Domain) -> Option<ResponseKey> {
        self.domain_keys.get(domain).copied()
    }

    pub fn domain_for_key(&self, key: ResponseKey) -> Option<&Domain> {
        self.domain_keys
            .iter()
            .find(|(_, k)| **k == key)
            .map(|(d, _)| d)
    }

    pub fn slot_key(&self, slot: usize) -> ResponseKey {
        if slot == 0 {
            self.first_slot
        } else {
            self.second_slot
        }
    }
}

impl Validate for ResponseKeyBindings {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.old == self.new {
            return Err(ContractViolation::InvalidValue {
                field: "response_key_bindings.new",
                reason: "must differ from old key",
            });
        }
        if self.first_slot == self.second_slot {
            return Err(ContractViolation::InvalidValue {
                field: "response_key_bindings.second_slot",
                reason: "must differ from first_slot key",
            });
        }
        let mut seen = BTreeMap::new();
        for (domain, key) in &self.domain_keys {
            domain.validate()?;
            if let Some(prev) = seen.insert(*key, domain) {
                return Err(ContractViolation::Duplicate {
                    field: "response_key_bindings.domain_keys",
                    value: format!("{key} bound to {} and {}", prev.as_str(), domain.as_str()),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConditionLabel {
    /// First member of a learned pair.
    A,
    /// Second member of a learned pair.
    B,
    /// Singleton sound with no partner.
    X,
}

impl ConditionLabel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::X => "X",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[Self::A, Self::B, Self::X]
    }
}

impl fmt::Display for ConditionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssociationId(String);

impl AssociationId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for AssociationId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("association_id", &self.0, 64)
    }
}

impl TryFrom<String> for AssociationId {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AssociationId> for String {
    fn from(value: AssociationId) -> Self {
        value.0
    }
}

impl fmt::Display for AssociationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoundPair {
    pub first: SoundId,
    pub second: SoundId,
}

impl SoundPair {
    pub fn v1(first: SoundId, second: SoundId) -> Result<Self, ContractViolation> {
        let pair = Self { first, second };
        pair.validate()?;
        Ok(pair)
    }

    pub fn members(&self) -> [&SoundId; 2] {
        [&self.first, &self.second]
    }
}

impl Validate for SoundPair {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.first.validate()?;
        self.second.validate()?;
        if self.first == self.second {
            return Err(ContractViolation::InvalidValue {
                field: "sound_pair.second",
                reason: "pair members must be distinct",
            });
        }
        Ok(())
    }
}

impl fmt::Display for SoundPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.first, self.second)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssociationKind {
    Pair { pair: SoundPair },
    Singleton { sound: SoundId },
}

impl AssociationKind {
    pub fn trials_per_block(&self) -> u32 {
        match self {
            Self::Pair { .. } => 2,
            Self::Singleton { .. } => 1,
        }
    }

    /// Sub-trials of one block, in presentation order.
    pub fn block_members(&self) -> Vec<(&SoundId, ConditionLabel)> {
        match self {
            Self::Pair { pair } => vec![
                (&pair.first, ConditionLabel::A),
                (&pair.second, ConditionLabel::B),
            ],
            Self::Singleton { sound } => vec![(sound, ConditionLabel::X)],
        }
    }

    pub fn sounds(&self) -> Vec<&SoundId> {
        self.block_members().into_iter().map(|(s, _)| s).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationGroup {
    pub association_id: AssociationId,
    pub kind: AssociationKind,
    /// Quota: how many times the whole group is presented.
    pub target_blocks: u32,
    /// Learning trials the group fills (`target_blocks` x trials per block).
    pub target_count: u32,
}

impl AssociationGroup {
    pub fn v1(
        association_id: AssociationId,
        kind: AssociationKind,
        target_blocks: u32,
    ) -> Result<Self, ContractViolation> {
        let target_count = target_blocks
            .checked_mul(kind.trials_per_block())
            .ok_or(ContractViolation::InvalidValue {
                field: "association_group.target_blocks",
                reason: "target_count overflows u32",
            })?;
        let group = Self {
            association_id,
            kind,
            target_blocks,
            target_count,
        };
        group.validate()?;
        Ok(group)
    }

    pub fn is_pair(&self) -> bool {
        matches!(self.kind, AssociationKind::Pair { .. })
    }
}

impl Validate for AssociationGroup {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.association_id.validate()?;
        if let AssociationKind::Pair { pair } = &self.kind {
            pair.validate()?;
        }
        if u64::from(self.target_count)
            != u64::from(self.target_blocks) * u64::from(self.kind.trials_per_block())
        {
            return Err(ContractViolation::InvalidValue {
                field: "association_group.target_count",
                reason: "must equal target_blocks x trials_per_block",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningTrial {
    pub image_id: ImageId,
    pub domain: Domain,
    pub sound_id: SoundId,
    pub condition: ConditionLabel,
    pub association_id: AssociationId,
    /// Key for the domain judgement; `None` when the domain has no binding.
    pub expected_response: Option<ResponseKey>,
}

/// Warm-up presentation before learning. Practice responses are not scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeTrial {
    pub image_id: ImageId,
    pub sound_id: SoundId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulusStatus {
    Old,
    New,
}

impl StimulusStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Old => "old",
            Self::New => "new",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionProbe {
    pub image_id: ImageId,
    pub status: StimulusStatus,
    pub expected_response: ResponseKey,
}

impl RecognitionProbe {
    pub fn v1(image_id: ImageId, status: StimulusStatus, keys: &ResponseKeyBindings) -> Self {
        let expected_response = match status {
            StimulusStatus::Old => keys.old,
            StimulusStatus::New => keys.new,
        };
        Self {
            image_id,
            status,
            expected_response,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationOrder {
    OldFirst,
    NewFirst,
}

impl PresentationOrder {
    pub const fn slots(self) -> [StimulusStatus; 2] {
        match self {
            Self::OldFirst => [StimulusStatus::Old, StimulusStatus::New],
            Self::NewFirst => [StimulusStatus::New, StimulusStatus::Old],
        }
    }

    pub const fn old_slot(self) -> usize {
        match self {
            Self::OldFirst => 0,
            Self::NewFirst => 1,
        }
    }
}

impl fmt::Display for PresentationOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b] = self.slots();
        write!(f, "{}/{}", a.as_str(), b.as_str())
    }
}

/// Two-alternative forced choice between a learned pair and an unheard pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundProbe {
    pub old_pair: SoundPair,
    pub new_pair: SoundPair,
    pub presentation_order: PresentationOrder,
    pub expected_response: ResponseKey,
}

impl SoundProbe {
    pub fn v1(
        old_pair: SoundPair,
        new_pair: SoundPair,
        presentation_order: PresentationOrder,
        keys: &ResponseKeyBindings,
    ) -> Result<Self, ContractViolation> {
        let probe = Self {
            expected_response: keys.slot_key(presentation_order.old_slot()),
            old_pair,
            new_pair,
            presentation_order,
        };
        probe.validate()?;
        Ok(probe)
    }

    /// Pairs in the order they are played.
    pub fn played_pairs(&self) -> [&SoundPair; 2] {
        match self.presentation_order {
            PresentationOrder::OldFirst => [&self.old_pair, &self.new_pair],
            PresentationOrder::NewFirst => [&self.new_pair, &self.old_pair],
        }
    }
}

impl Validate for SoundProbe {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.old_pair.validate()?;
        self.new_pair.validate()?;
        let old = self.old_pair.members();
        if self.new_pair.members().iter().any(|s| old.contains(s)) {
            return Err(ContractViolation::InvalidValue {
                field: "sound_probe.new_pair",
                reason: "must not share sounds with old_pair",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationBinding {
    pub domain: Domain,
    pub condition: ConditionLabel,
    pub association_id: AssociationId,
    pub sound_id: SoundId,
}

/// Image id -> the association it was learned under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationMap {
    bindings: BTreeMap<ImageId, AssociationBinding>,
}

impl AssociationMap {
    pub fn from_trials(trials: &[LearningTrial]) -> Result<Self, ContractViolation> {
        let mut bindings = BTreeMap::new();
        for trial in trials {
            let binding = AssociationBinding {
                domain: trial.domain.clone(),
                condition: trial.condition,
                association_id: trial.association_id.clone(),
                sound_id: trial.sound_id.clone(),
            };
            if bindings.insert(trial.image_id.clone(), binding).is_some() {
                return Err(ContractViolation::Duplicate {
                    field: "association_map.image_id",
                    value: trial.image_id.as_str().to_string(),
                });
            }
        }
        Ok(Self { bindings })
    }

    pub fn get(&self, image_id: &ImageId) -> Option<&AssociationBinding> {
        self.bindings.get(image_id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
