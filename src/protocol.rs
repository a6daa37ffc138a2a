//! Typed loaders for the annotation protocol files.
//!
//! The dataset ships four MATLAB files at fixed locations under the root:
//!
//! - `annotation/pool.mat` - cell array `pool` of test image names.
//! - `annotation/Images.mat` - struct array `Img` (`imname`, `nAppear`,
//!   `box`); each `box` element carries an `idlocate` `(x, y, w, h)` vector.
//! - `annotation/test/train_test/Train.mat` - cell array `Train` of 1x1
//!   structs (`idname`, `nAppear`, `scene`); each scene names an image and a
//!   box belonging to that training identity.
//! - `annotation/test/train_test/TestG50.mat` - struct array `TestG50` with
//!   a `Query` struct and a `Gallery` struct array per test identity. An
//!   empty gallery `idlocate` terminates that identity's listing.
//!
//! A missing file is fatal; so is any shape mismatch, reported with the
//! offending path and a description of what was expected.

use std::path::{Path, PathBuf};

use crate::dataset::BoxXYWH;
use crate::error::SearchsetError;
use crate::mat::{read_mat, MatArray, MatFile, StructArray};

/// Test pool listing, relative to the dataset root.
pub const POOL_MAT: &str = "annotation/pool.mat";
/// Global image listing with per-image boxes.
pub const IMAGES_MAT: &str = "annotation/Images.mat";
/// Training identity protocol.
pub const TRAIN_MAT: &str = "annotation/test/train_test/Train.mat";
/// Test query/gallery protocol (gallery size 50).
pub const TEST_MAT: &str = "annotation/test/train_test/TestG50.mat";

/// One image of the global listing with its raw annotation boxes.
///
/// Boxes are as stored, unfiltered; validity is enforced when the roidb is
/// assembled.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedImage {
    pub name: String,
    pub boxes: Vec<BoxXYWH>,
}

/// A protocol box: an image name plus the `(x, y, w, h)` region a person
/// occupies in it.
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledBox {
    pub image: String,
    pub bbox: BoxXYWH,
}

/// One training identity and every scene it appears in.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainIdentity {
    pub name: String,
    pub appearances: Vec<LabeledBox>,
}

/// One test identity: the query region and its gallery appearances.
#[derive(Clone, Debug, PartialEq)]
pub struct TestIdentity {
    pub query: LabeledBox,
    pub gallery: Vec<LabeledBox>,
}

/// Loads the held-out pool: the image names reserved for the test split.
pub fn load_pool(root: &Path) -> Result<Vec<String>, SearchsetError> {
    let (path, file) = open_mat(root, POOL_MAT)?;
    let pool = require_variable(&file, &path, "pool")?;
    let cells = pool
        .as_cell()
        .ok_or_else(|| schema(&path, "'pool' is not a cell array"))?;

    cells
        .cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            cell.as_str()
                .map(str::to_string)
                .ok_or_else(|| schema(&path, format!("pool entry {i} is not a char array")))
        })
        .collect()
}

/// Loads the global image listing with per-image boxes.
pub fn load_images(root: &Path) -> Result<Vec<AnnotatedImage>, SearchsetError> {
    let (path, file) = open_mat(root, IMAGES_MAT)?;
    let img = require_variable(&file, &path, "Img")?;
    let entries = img
        .as_struct()
        .ok_or_else(|| schema(&path, "'Img' is not a struct array"))?;

    let mut images = Vec::with_capacity(entries.len());
    for index in 0..entries.len() {
        let name = field_str(entries, index, "imname", &path)?;

        let box_field = entries
            .field(index, "box")
            .ok_or_else(|| schema(&path, format!("image '{name}' has no 'box' field")))?;
        let box_entries = box_field
            .as_struct()
            .ok_or_else(|| schema(&path, format!("'box' of image '{name}' is not a struct array")))?;

        let mut boxes = Vec::with_capacity(box_entries.len());
        for box_index in 0..box_entries.len() {
            let locate = box_entries
                .field(box_index, "idlocate")
                .ok_or_else(|| schema(&path, format!("box of image '{name}' has no 'idlocate'")))?;
            boxes.push(parse_box(locate, &path, &name)?);
        }

        images.push(AnnotatedImage { name, boxes });
    }

    Ok(images)
}

/// Loads the training protocol. The position of an identity in the returned
/// list is its person ID.
pub fn load_train_identities(root: &Path) -> Result<Vec<TrainIdentity>, SearchsetError> {
    let (path, file) = open_mat(root, TRAIN_MAT)?;
    let train = require_variable(&file, &path, "Train")?;
    let cells = train
        .as_cell()
        .ok_or_else(|| schema(&path, "'Train' is not a cell array"))?;

    let mut identities = Vec::with_capacity(cells.cells.len());
    for (index, cell) in cells.cells.iter().enumerate() {
        let person = cell
            .as_struct()
            .filter(|s| s.len() == 1)
            .ok_or_else(|| schema(&path, format!("Train entry {index} is not a 1x1 struct")))?;

        let name = field_str(person, 0, "idname", &path)?;

        let scenes = person
            .field(0, "scene")
            .ok_or_else(|| schema(&path, format!("identity '{name}' has no 'scene' field")))?
            .as_struct()
            .ok_or_else(|| schema(&path, format!("'scene' of identity '{name}' is not a struct array")))?;

        let mut appearances = Vec::with_capacity(scenes.len());
        for scene_index in 0..scenes.len() {
            appearances.push(labeled_box(scenes, scene_index, &path)?);
        }

        identities.push(TrainIdentity { name, appearances });
    }

    Ok(identities)
}

/// Loads the test protocol. The position of an identity in the returned list
/// is its person ID; its query doubles as the probe for search evaluation.
pub fn load_test_protocol(root: &Path) -> Result<Vec<TestIdentity>, SearchsetError> {
    let (path, file) = open_mat(root, TEST_MAT)?;
    let protocol = require_variable(&file, &path, "TestG50")?;
    let entries = protocol
        .as_struct()
        .ok_or_else(|| schema(&path, "'TestG50' is not a struct array"))?;

    let mut identities = Vec::with_capacity(entries.len());
    for index in 0..entries.len() {
        let query = entries
            .field(index, "Query")
            .ok_or_else(|| schema(&path, format!("test entry {index} has no 'Query' field")))?
            .as_struct()
            .filter(|s| s.len() == 1)
            .ok_or_else(|| schema(&path, format!("'Query' of test entry {index} is not a 1x1 struct")))?;
        let query = labeled_box(query, 0, &path)?;

        let gallery_entries = entries
            .field(index, "Gallery")
            .ok_or_else(|| schema(&path, format!("test entry {index} has no 'Gallery' field")))?
            .as_struct()
            .ok_or_else(|| schema(&path, format!("'Gallery' of test entry {index} is not a struct array")))?;

        // The gallery slots are fixed-width; the first empty box marks the
        // end of this identity's appearances.
        let mut gallery = Vec::new();
        for gallery_index in 0..gallery_entries.len() {
            let locate = gallery_entries
                .field(gallery_index, "idlocate")
                .ok_or_else(|| schema(&path, format!("gallery of test entry {index} has no 'idlocate'")))?;
            if locate.is_empty() {
                break;
            }
            gallery.push(labeled_box(gallery_entries, gallery_index, &path)?);
        }

        identities.push(TestIdentity { query, gallery });
    }

    Ok(identities)
}

fn open_mat(root: &Path, relative: &str) -> Result<(PathBuf, MatFile), SearchsetError> {
    let path = root.join(relative);
    if !path.is_file() {
        return Err(SearchsetError::AnnotationMissing { path });
    }
    let file = read_mat(&path).map_err(|source| SearchsetError::Mat {
        path: path.clone(),
        source,
    })?;
    Ok((path, file))
}

fn require_variable<'a>(
    file: &'a MatFile,
    path: &Path,
    name: &str,
) -> Result<&'a MatArray, SearchsetError> {
    file.variable(name)
        .ok_or_else(|| schema(path, format!("missing variable '{name}'")))
}

fn schema(path: &Path, message: impl Into<String>) -> SearchsetError {
    SearchsetError::MatSchema {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn field_str(
    entries: &StructArray,
    index: usize,
    field: &str,
    path: &Path,
) -> Result<String, SearchsetError> {
    entries
        .field(index, field)
        .and_then(MatArray::as_str)
        .map(str::to_string)
        .ok_or_else(|| schema(path, format!("element {index} has no char field '{field}'")))
}

/// Reads an `imname` + `idlocate` pair out of a scene-shaped struct element.
fn labeled_box(
    entries: &StructArray,
    index: usize,
    path: &Path,
) -> Result<LabeledBox, SearchsetError> {
    let image = field_str(entries, index, "imname", path)?;
    let locate = entries
        .field(index, "idlocate")
        .ok_or_else(|| schema(path, format!("scene of '{image}' has no 'idlocate'")))?;
    let bbox = parse_box(locate, path, &image)?;
    Ok(LabeledBox { image, bbox })
}

fn parse_box(array: &MatArray, path: &Path, image: &str) -> Result<BoxXYWH, SearchsetError> {
    let values = array
        .as_numeric()
        .map(|numeric| numeric.to_i32_vec())
        .ok_or_else(|| schema(path, format!("box of image '{image}' is not numeric")))?;
    if values.len() != 4 {
        return Err(schema(
            path,
            format!(
                "box of image '{image}' has {} coordinates, expected 4",
                values.len()
            ),
        ));
    }
    Ok(BoxXYWH::new(values[0], values[1], values[2], values[3]))
}
