#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::{validate_asset_id, validate_token};
use crate::{ContractViolation, SchemaVersion, Validate};

pub const CATALOG_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

const MAX_ASSET_ID_LEN: usize = 512;
const MAX_CATEGORY_TOKEN_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for ImageId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_asset_id("image_id", &self.0, MAX_ASSET_ID_LEN)
    }
}

impl TryFrom<String> for ImageId {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ImageId> for String {
    fn from(value: ImageId) -> Self {
        value.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SoundId(String);

impl SoundId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for SoundId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_asset_id("sound_id", &self.0, MAX_ASSET_ID_LEN)
    }
}

impl TryFrom<String> for SoundId {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SoundId> for String {
    fn from(value: SoundId) -> Self {
        value.0
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Top-level image domain, e.g. `indoor` / `outdoor`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn from_static(id: &'static str) -> Self {
        Self(id.to_string())
    }
}

impl Validate for Domain {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("domain", &self.0, MAX_CATEGORY_TOKEN_LEN)
    }
}

impl TryFrom<String> for Domain {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Domain> for String {
    fn from(value: Domain) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subcategory(String);

impl Subcategory {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for Subcategory {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("subcategory", &self.0, MAX_CATEGORY_TOKEN_LEN)
    }
}

impl TryFrom<String> for Subcategory {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Subcategory> for String {
    fn from(value: Subcategory) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryKey {
    pub domain: Domain,
    pub subcategory: Subcategory,
}

impl CategoryKey {
    pub fn new(domain: Domain, subcategory: Subcategory) -> Self {
        Self {
            domain,
            subcategory,
        }
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain.as_str(), self.subcategory.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCategory {
    pub domain: Domain,
    pub subcategory: Subcategory,
    pub images: Vec<ImageId>,
}

impl ImageCategory {
    pub fn v1(
        domain: Domain,
        subcategory: Subcategory,
        images: Vec<ImageId>,
    ) -> Result<Self, ContractViolation> {
        let category = Self {
            domain,
            subcategory,
            images,
        };
        category.validate()?;
        Ok(category)
    }

    pub fn key(&self) -> CategoryKey {
        CategoryKey::new(self.domain.clone(), self.subcategory.clone())
    }
}

impl Validate for ImageCategory {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.domain.validate()?;
        self.subcategory.validate()?;
        for image in &self.images {
            image.validate()?;
        }
        Ok(())
    }
}

/// Immutable session snapshot of every image and sound the experiment may draw from.
///
/// Category order and image order inside a category are preserved; they fix the order in
/// which the sampler walks the catalog and therefore matter for seeded reproducibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CatalogWire", into = "CatalogWire")]
pub struct Catalog {
    categories: Vec<ImageCategory>,
    sounds: Vec<SoundId>,
    practice_images: Vec<ImageId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogWire {
    schema_version: SchemaVersion,
    categories: Vec<ImageCategory>,
    sounds: Vec<SoundId>,
    #[serde(default)]
    practice_images: Vec<ImageId>,
}

impl TryFrom<CatalogWire> for Catalog {
    type Error = ContractViolation;

    fn try_from(wire: CatalogWire) -> Result<Self, Self::Error> {
        if wire.schema_version != CATALOG_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "catalog.schema_version",
                reason: "must match CATALOG_CONTRACT_VERSION",
            });
        }
        Catalog::v1(wire.categories, wire.sounds)?.with_practice_images(wire.practice_images)
    }
}

impl From<Catalog> for CatalogWire {
    fn from(catalog: Catalog) -> Self {
        Self {
            schema_version: CATALOG_CONTRACT_VERSION,
            categories: catalog.categories,
            sounds: catalog.sounds,
            practice_images: catalog.practice_images,
        }
    }
}

impl Catalog {
    pub fn v1(
        categories: Vec<ImageCategory>,
        sounds: Vec<SoundId>,
    ) -> Result<Self, ContractViolation> {
        let catalog = Self {
            categories,
            sounds,
            practice_images: Vec::new(),
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Adds the separate practice pool. Practice images never appear in a category.
    pub fn with_practice_images(
        mut self,
        practice_images: Vec<ImageId>,
    ) -> Result<Self, ContractViolation> {
        self.practice_images = practice_images;
        self.validate()?;
        Ok(self)
    }

    pub fn practice_images(&self) -> &[ImageId] {
        &self.practice_images
    }

    pub fn categories(&self) -> &[ImageCategory] {
        &self.categories
    }

    pub fn sounds(&self) -> &[SoundId] {
        &self.sounds
    }

    pub fn category(&self, key: &CategoryKey) -> Option<&ImageCategory> {
        self.categories
            .iter()
            .find(|c| c.domain == key.domain && c.subcategory == key.subcategory)
    }

    pub fn category_keys(&self) -> Vec<CategoryKey> {
        self.categories.iter().map(ImageCategory::key).collect()
    }

    /// Every image in catalog order.
    pub fn all_images(&self) -> impl Iterator<Item = &ImageId> + '_ {
        self.categories.iter().flat_map(|c| c.images.iter())
    }

    pub fn image_count(&self) -> usize {
        self.categories.iter().map(|c| c.images.len()).sum()
    }

    pub fn domain_of(&self, image_id: &ImageId) -> Option<&Domain> {
        self.categories
            .iter()
            .find(|c| c.images.contains(image_id))
            .map(|c| &c.domain)
    }
}

impl Validate for Catalog {
    fn validate(&self) -> Result<(), ContractViolation> {
        let mut keys = BTreeSet::new();
        let mut images = BTreeSet::new();
        for category in &self.categories {
            category.validate()?;
            let key = category.key();
            if !keys.insert(key.clone()) {
                return Err(ContractViolation::Duplicate {
                    field: "catalog.categories",
                    value: key.to_string(),
                });
            }
            for image in &category.images {
                if !images.insert(image) {
                    return Err(ContractViolation::Duplicate {
                        field: "catalog.images",
                        value: image.as_str().to_string(),
                    });
                }
            }
        }
        for image in &self.practice_images {
            image.validate()?;
            if !images.insert(image) {
                return Err(ContractViolation::Duplicate {
                    field: "catalog.practice_images",
                    value: image.as_str().to_string(),
                });
            }
        }
        let mut sounds = BTreeSet::new();
        for sound in &self.sounds {
            sound.validate()?;
            if !sounds.insert(sound) {
                return Err(ContractViolation::Duplicate {
                    field: "catalog.sounds",
                    value: sound.as_str().to_string(),
                });
            }
        }
        Ok(())
    }
}
