//! Explicit dataset registration for the training framework.
//!
//! A [`DatasetRegistry`] maps dataset names to lazy record producers plus
//! catalog metadata. Nothing registers itself at startup: the caller builds
//! a registry and calls [`register_cuhk_sysu`] with the dataset root when
//! ready, which exposes the two split datasets (`cuhk_sysu_train`,
//! `cuhk_sysu_test`). Producers run only when a dataset is first requested.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::{BoxXYXY, PersonId, PersonSearchDataset, Split};
use crate::error::SearchsetError;

/// Class names of the detection head: background plus the single foreground
/// category.
pub const THING_CLASSES: [&str; 2] = ["background", "person"];

/// Category ID of the "person" class in [`InstanceAnnotation`].
pub const PERSON_CATEGORY_ID: u32 = 1;

/// Evaluator tag attached to both split datasets.
pub const EVALUATOR_TYPE: &str = "cuhk_sysu";

/// One image in the record schema the training framework consumes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Resolved path of the image file.
    pub file_name: PathBuf,

    /// The image identifier (its name in the annotation listing).
    pub image_id: String,

    /// Image width in pixels.
    pub width: usize,

    /// Image height in pixels.
    pub height: usize,

    /// Ground-truth instances, in roidb order.
    pub annotations: Vec<InstanceAnnotation>,
}

/// One ground-truth instance: an absolute XYXY box with its category and
/// person identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceAnnotation {
    pub bbox: BoxXYXY,
    pub category_id: u32,
    pub person_id: PersonId,
}

/// Dataset-level metadata handed to the catalog alongside the records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub thing_classes: Vec<String>,
    pub root: PathBuf,
    pub evaluator_type: String,
}

/// A zero-argument producer that loads a dataset's records on demand.
pub type RecordProducer = Box<dyn Fn() -> Result<Vec<ImageRecord>, SearchsetError>>;

/// A catalog of named datasets with lazy producers.
#[derive(Default)]
pub struct DatasetRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

struct RegistryEntry {
    metadata: DatasetMetadata,
    producer: RecordProducer,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a dataset under `name`. Names are unique; re-registering
    /// is an error.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        metadata: DatasetMetadata,
        producer: RecordProducer,
    ) -> Result<(), SearchsetError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(SearchsetError::DatasetAlreadyRegistered(name));
        }
        self.entries.insert(name, RegistryEntry { metadata, producer });
        Ok(())
    }

    /// Runs the producer registered under `name`.
    pub fn produce(&self, name: &str) -> Result<Vec<ImageRecord>, SearchsetError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| SearchsetError::UnknownDataset(name.to_string()))?;
        (entry.producer)()
    }

    /// The metadata registered under `name`.
    pub fn metadata(&self, name: &str) -> Option<&DatasetMetadata> {
        self.entries.get(name).map(|entry| &entry.metadata)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

/// Registers both person-search splits against the given dataset root.
pub fn register_cuhk_sysu(
    registry: &mut DatasetRegistry,
    root: &Path,
) -> Result<(), SearchsetError> {
    for split in [Split::Train, Split::Test] {
        let metadata = DatasetMetadata {
            thing_classes: THING_CLASSES.iter().map(|c| c.to_string()).collect(),
            root: root.to_path_buf(),
            evaluator_type: EVALUATOR_TYPE.to_string(),
        };
        let producer_root = root.to_path_buf();
        registry.register(
            format!("cuhk_sysu_{split}"),
            metadata,
            Box::new(move || load_cuhk_sysu_instances(&producer_root, split)),
        )?;
    }
    Ok(())
}

/// Loads one split and converts its roidb into the framework record schema.
pub fn load_cuhk_sysu_instances(
    root: &Path,
    split: Split,
) -> Result<Vec<ImageRecord>, SearchsetError> {
    let dataset = PersonSearchDataset::open(root, split)?;

    let records = dataset
        .image_indexes()
        .iter()
        .zip(dataset.roidb())
        .map(|(image_id, record)| ImageRecord {
            file_name: record.image.clone(),
            image_id: image_id.clone(),
            width: record.width,
            height: record.height,
            annotations: record
                .boxes
                .iter()
                .zip(&record.pids)
                .map(|(&bbox, &person_id)| InstanceAnnotation {
                    bbox,
                    category_id: PERSON_CATEGORY_ID,
                    person_id,
                })
                .collect(),
        })
        .collect();

    Ok(records)
}
