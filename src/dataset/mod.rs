//! The dataset adapter: annotation files in, per-image records out.
//!
//! [`PersonSearchDataset::open`] reconciles the three independently indexed
//! annotation sources - the global image listing, the held-out test pool,
//! and the split's identity protocol - into one roidb, and extracts the
//! probe list for the test split. Everything runs once, synchronously, with
//! blocking I/O; the result is cached on disk per split (see [`cache`]).
//!
//! Two processes preparing the same split can race on cache creation. There
//! is no locking; this is a one-shot offline preparation step, and the
//! loser's write simply overwrites identical content.

mod cache;
mod model;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

pub use model::{BoxXYWH, BoxXYXY, PersonId, Probe, RoiRecord, Split};

use crate::error::SearchsetError;
use crate::protocol::{self, LabeledBox};

/// Image files live under this directory, relative to the dataset root.
pub const IMAGE_DIR: &str = "Image/SSM";
/// Roidb cache files live under this directory, relative to the dataset root.
pub const CACHE_DIR: &str = "cache";

/// One split of the person-search dataset, fully loaded.
#[derive(Debug)]
pub struct PersonSearchDataset {
    root: PathBuf,
    split: Split,
    image_indexes: Vec<String>,
    roidb: Vec<RoiRecord>,
    probes: Vec<Probe>,
}

impl PersonSearchDataset {
    /// Loads a split from the dataset root.
    ///
    /// Reads the image index list, then the roidb (from cache when the
    /// split's cache file exists), and for the test split the probe list.
    pub fn open(root: impl Into<PathBuf>, split: Split) -> Result<Self, SearchsetError> {
        let root = root.into();
        let image_indexes = load_image_indexes(&root, split)?;
        let roidb = load_roidb(&root, split, &image_indexes)?;
        let probes = match split {
            Split::Test => load_probes(&root)?,
            Split::Train => Vec::new(),
        };

        Ok(Self {
            root,
            split,
            image_indexes,
            roidb,
            probes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn split(&self) -> Split {
        self.split
    }

    pub fn num_images(&self) -> usize {
        self.image_indexes.len()
    }

    /// Image identifiers in record order.
    pub fn image_indexes(&self) -> &[String] {
        &self.image_indexes
    }

    /// Ground-truth records, parallel to [`image_indexes`](Self::image_indexes).
    pub fn roidb(&self) -> &[RoiRecord] {
        &self.roidb
    }

    /// Search queries. Empty for the train split.
    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    /// Resolves the path of the `index`-th image, failing if the file does
    /// not exist.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn image_path_at(&self, index: usize) -> Result<PathBuf, SearchsetError> {
        image_path(&self.root, &self.image_indexes[index])
    }

    /// Where the roidb cache for a split lives.
    pub fn cache_file(root: &Path, split: Split) -> PathBuf {
        root.join(CACHE_DIR).join(format!("{split}_roidb.json"))
    }
}

/// Loads the image identifier list for a split.
///
/// The test split is the pool listing verbatim; the train split is the
/// global image set minus the pool, sorted.
pub fn load_image_indexes(root: &Path, split: Split) -> Result<Vec<String>, SearchsetError> {
    let pool = protocol::load_pool(root)?;
    if split == Split::Test {
        return Ok(pool);
    }

    let pool: BTreeSet<String> = pool.into_iter().collect();
    let all_images: BTreeSet<String> = protocol::load_images(root)?
        .into_iter()
        .map(|image| image.name)
        .collect();

    Ok(all_images.difference(&pool).cloned().collect())
}

/// Loads the roidb for a split, trusting an existing cache file.
///
/// The cache contract is existence-based: no staleness check against the
/// annotation files is made. Delete `<root>/cache/<split>_roidb.json` to
/// force a rebuild.
pub fn load_roidb(
    root: &Path,
    split: Split,
    image_indexes: &[String],
) -> Result<Vec<RoiRecord>, SearchsetError> {
    let cache_path = PersonSearchDataset::cache_file(root, split);
    if cache_path.is_file() {
        return cache::read_roidb_cache(&cache_path);
    }

    let roidb = build_roidb(root, split, image_indexes)?;

    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent).map_err(SearchsetError::Io)?;
    }
    cache::write_roidb_cache(&cache_path, &roidb)?;
    info!("saved {split} roidb to {}", cache_path.display());

    Ok(roidb)
}

/// Per-image ground truth under construction: valid boxes plus their
/// identity labels.
type GroundTruth = BTreeMap<String, (Vec<BoxXYWH>, Vec<PersonId>)>;

fn build_roidb(
    root: &Path,
    split: Split,
    image_indexes: &[String],
) -> Result<Vec<RoiRecord>, SearchsetError> {
    let mut ground_truth = GroundTruth::new();
    for image in protocol::load_images(root)? {
        let boxes: Vec<BoxXYWH> = image.boxes.into_iter().filter(BoxXYWH::is_valid).collect();
        if boxes.is_empty() {
            return Err(SearchsetError::NoValidBoxes { image: image.name });
        }
        let pids = vec![PersonId::UNLABELED; boxes.len()];
        ground_truth.insert(image.name, (boxes, pids));
    }

    // Walk the split's identity protocol and label the matching boxes with
    // person IDs 0..N-1. Boxes no protocol entry claims stay unlabeled.
    match split {
        Split::Train => {
            for (index, identity) in protocol::load_train_identities(root)?.iter().enumerate() {
                let pid = PersonId::new(index as i32);
                for appearance in &identity.appearances {
                    assign_person_id(&mut ground_truth, appearance, pid);
                }
            }
        }
        Split::Test => {
            for (index, identity) in protocol::load_test_protocol(root)?.iter().enumerate() {
                let pid = PersonId::new(index as i32);
                assign_person_id(&mut ground_truth, &identity.query, pid);
                for appearance in &identity.gallery {
                    assign_person_id(&mut ground_truth, appearance, pid);
                }
            }
        }
    }

    let mut roidb = Vec::with_capacity(image_indexes.len());
    for name in image_indexes {
        let (boxes, pids) = ground_truth.get(name).ok_or_else(|| SearchsetError::MatSchema {
            path: root.join(protocol::IMAGES_MAT),
            message: format!("indexed image '{name}' is missing from the global listing"),
        })?;

        let path = image_path(root, name)?;
        let size = imagesize::size(&path).map_err(|source| SearchsetError::ImageDimensionRead {
            path: path.clone(),
            source,
        })?;

        roidb.push(RoiRecord {
            image: path,
            width: size.width,
            height: size.height,
            boxes: boxes.iter().map(BoxXYWH::to_xyxy).collect(),
            pids: pids.clone(),
        });
    }

    Ok(roidb)
}

/// Labels the box matching `appearance` in its image with `pid`.
///
/// Matching is an exact-equality linear scan over the image's box list,
/// O(boxes-per-image) per assignment; per-image counts are single digits to
/// low tens, so no spatial index is warranted. When an image holds duplicate
/// identical boxes the first match wins, an ambiguity inherited from the
/// source data. A box - or image - the global listing does not know is
/// data-quality noise: it is logged and skipped, never an error.
fn assign_person_id(ground_truth: &mut GroundTruth, appearance: &LabeledBox, pid: PersonId) {
    let Some((boxes, pids)) = ground_truth.get_mut(&appearance.image) else {
        warn!(
            "person {pid}: image '{}' not found in the global listing",
            appearance.image
        );
        return;
    };

    match boxes.iter().position(|gt_box| *gt_box == appearance.bbox) {
        Some(index) => pids[index] = pid,
        None => warn!(
            "person {pid}: box {:?} not found in image '{}'",
            appearance.bbox, appearance.image
        ),
    }
}

/// Loads the probe list: one query region per test identity.
pub fn load_probes(root: &Path) -> Result<Vec<Probe>, SearchsetError> {
    let identities = protocol::load_test_protocol(root)?;

    Ok(identities
        .into_iter()
        .map(|identity| Probe {
            image: root.join(IMAGE_DIR).join(&identity.query.image),
            roi: identity.query.bbox.to_xyxy(),
        })
        .collect())
}

fn image_path(root: &Path, name: &str) -> Result<PathBuf, SearchsetError> {
    let path = root.join(IMAGE_DIR).join(name);
    if !path.is_file() {
        return Err(SearchsetError::ImageMissing { path });
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ground_truth_for(name: &str, boxes: &[BoxXYWH]) -> GroundTruth {
        let mut ground_truth = GroundTruth::new();
        ground_truth.insert(
            name.to_string(),
            (boxes.to_vec(), vec![PersonId::UNLABELED; boxes.len()]),
        );
        ground_truth
    }

    #[test]
    fn assignment_matches_exact_box() {
        let mut ground_truth = ground_truth_for(
            "s1.jpg",
            &[BoxXYWH::new(1, 1, 3, 3), BoxXYWH::new(10, 10, 5, 5)],
        );
        let appearance = LabeledBox {
            image: "s1.jpg".to_string(),
            bbox: BoxXYWH::new(10, 10, 5, 5),
        };

        assign_person_id(&mut ground_truth, &appearance, PersonId::new(4));

        let (_, pids) = &ground_truth["s1.jpg"];
        assert_eq!(pids[0], PersonId::UNLABELED);
        assert_eq!(pids[1], PersonId::new(4));
    }

    #[test]
    fn unmatched_box_is_skipped_without_labeling() {
        let mut ground_truth = ground_truth_for("s1.jpg", &[BoxXYWH::new(10, 10, 5, 5)]);
        let appearance = LabeledBox {
            image: "s1.jpg".to_string(),
            bbox: BoxXYWH::new(1, 1, 3, 3),
        };

        assign_person_id(&mut ground_truth, &appearance, PersonId::new(0));

        let (_, pids) = &ground_truth["s1.jpg"];
        assert_eq!(pids, &vec![PersonId::UNLABELED]);
    }

    #[test]
    fn unknown_image_is_skipped() {
        let mut ground_truth = ground_truth_for("s1.jpg", &[BoxXYWH::new(10, 10, 5, 5)]);
        let appearance = LabeledBox {
            image: "nowhere.jpg".to_string(),
            bbox: BoxXYWH::new(10, 10, 5, 5),
        };

        assign_person_id(&mut ground_truth, &appearance, PersonId::new(0));

        let (_, pids) = &ground_truth["s1.jpg"];
        assert_eq!(pids, &vec![PersonId::UNLABELED]);
    }

    #[test]
    fn duplicate_boxes_take_first_match() {
        let duplicate = BoxXYWH::new(2, 2, 4, 4);
        let mut ground_truth = ground_truth_for("s1.jpg", &[duplicate, duplicate]);
        let appearance = LabeledBox {
            image: "s1.jpg".to_string(),
            bbox: duplicate,
        };

        assign_person_id(&mut ground_truth, &appearance, PersonId::new(7));

        let (_, pids) = &ground_truth["s1.jpg"];
        assert_eq!(pids[0], PersonId::new(7));
        assert_eq!(pids[1], PersonId::UNLABELED);
    }

    #[test]
    fn cache_file_is_keyed_by_split() {
        let train = PersonSearchDataset::cache_file(Path::new("/data"), Split::Train);
        let test = PersonSearchDataset::cache_file(Path::new("/data"), Split::Test);
        assert_eq!(train, Path::new("/data/cache/train_roidb.json"));
        assert_eq!(test, Path::new("/data/cache/test_roidb.json"));
    }
}
