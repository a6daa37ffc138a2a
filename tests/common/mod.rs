#![allow(dead_code)]

//! Shared fixture helpers: synthesize a dataset tree on disk.
//!
//! The annotation files are produced with the crate's own `MatWriter`; the
//! image files are tiny BMPs, which `imagesize` can read dimensions from
//! without a real image stack.

use std::fs;
use std::path::Path;

use searchset::mat::{MatArray, MatWriter, StructArray};
use searchset::protocol::{IMAGES_MAT, POOL_MAT, TEST_MAT, TRAIN_MAT};

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    bytes.resize(file_size as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

/// Writes an image file under `Image/SSM/<name>`.
pub fn write_image_file(root: &Path, name: &str, width: u32, height: u32) {
    write_bmp(&root.join("Image/SSM").join(name), width, height);
}

/// Writes `annotation/pool.mat` listing the test image names.
pub fn write_pool(root: &Path, names: &[&str]) {
    let cells = names.iter().map(|name| MatArray::text(*name)).collect();
    let mut writer = MatWriter::new();
    writer.add("pool", &MatArray::cell_column(cells));
    write_mat(root, POOL_MAT, &writer);
}

/// Writes `annotation/Images.mat`: each entry is an image name with its
/// `(x, y, w, h)` boxes.
pub fn write_images(root: &Path, images: &[(&str, &[[i32; 4]])]) {
    let mut img = StructArray::with_fields(&["imname", "nAppear", "box"]);
    for (name, boxes) in images {
        let mut box_entries = StructArray::with_fields(&["idlocate", "ishard"]);
        for bbox in *boxes {
            box_entries.push_element(vec![box_row(*bbox), MatArray::scalar(0.0)]);
        }
        img.push_element(vec![
            MatArray::text(*name),
            MatArray::scalar(boxes.len() as f64),
            MatArray::Struct(box_entries),
        ]);
    }

    let mut writer = MatWriter::new();
    writer.add("Img", &MatArray::Struct(img));
    write_mat(root, IMAGES_MAT, &writer);
}

/// Writes `annotation/test/train_test/Train.mat`: each entry is an identity
/// name with its `(image, box)` appearances. Position in the slice is the
/// person ID.
pub fn write_train(root: &Path, identities: &[(&str, &[(&str, [i32; 4])])]) {
    let mut cells = Vec::with_capacity(identities.len());
    for (idname, appearances) in identities {
        let mut scene = StructArray::with_fields(&["imname", "idlocate", "ishard"]);
        for (image, bbox) in *appearances {
            scene.push_element(vec![
                MatArray::text(*image),
                box_row(*bbox),
                MatArray::scalar(0.0),
            ]);
        }

        let mut person = StructArray::with_fields(&["idname", "nAppear", "scene"]);
        person.push_element(vec![
            MatArray::text(*idname),
            MatArray::scalar(appearances.len() as f64),
            MatArray::Struct(scene),
        ]);
        cells.push(MatArray::Struct(person));
    }

    let mut writer = MatWriter::new();
    writer.add("Train", &MatArray::cell_column(cells));
    write_mat(root, TRAIN_MAT, &writer);
}

/// Writes `annotation/test/train_test/TestG50.mat`: one `(query, gallery)`
/// pair per test identity. A trailing empty gallery slot is appended after
/// the listed appearances, as in the real protocol tables.
pub fn write_test_protocol(
    root: &Path,
    cases: &[((&str, [i32; 4]), &[(&str, [i32; 4])])],
) {
    let mut protocol = StructArray::with_fields(&["Query", "Gallery"]);
    for ((query_image, query_box), gallery) in cases {
        let mut query = StructArray::with_fields(&["imname", "idlocate", "ishard"]);
        query.push_element(vec![
            MatArray::text(*query_image),
            box_row(*query_box),
            MatArray::scalar(0.0),
        ]);

        let mut gallery_entries = StructArray::with_fields(&["imname", "idlocate", "ishard"]);
        for (image, bbox) in *gallery {
            gallery_entries.push_element(vec![
                MatArray::text(*image),
                box_row(*bbox),
                MatArray::scalar(0.0),
            ]);
        }
        gallery_entries.push_element(vec![
            MatArray::text(""),
            MatArray::empty(),
            MatArray::scalar(0.0),
        ]);

        protocol.push_element(vec![
            MatArray::Struct(query),
            MatArray::Struct(gallery_entries),
        ]);
    }

    let mut writer = MatWriter::new();
    writer.add("TestG50", &MatArray::Struct(protocol));
    write_mat(root, TEST_MAT, &writer);
}

fn box_row(bbox: [i32; 4]) -> MatArray {
    MatArray::row(bbox.iter().map(|&v| v as f64).collect())
}

fn write_mat(root: &Path, relative: &str, writer: &MatWriter) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create annotation dirs");
    }
    writer.write_to(&path).expect("write mat file");
}

/// Builds the standard fixture dataset used across the integration tests.
///
/// Global listing: s1-s4, each 64x48. Pool (test split): s2, s4; train
/// split is therefore [s1, s3] after the sorted set difference.
///
/// Train protocol: identity 0 appears in s1 and s3 at (10,10,5,5); identity
/// 1 appears in s1 at (30,20,8,12). Test protocol: identity 0 queries s2 at
/// (4,4,6,6) with one gallery appearance in s4 at (8,8,2,2); identity 1
/// queries s4 at (20,10,6,9) with an empty gallery.
///
/// s2 carries one degenerate zero-width box that load-time filtering must
/// drop.
pub fn standard_dataset(root: &Path) {
    for name in ["s1.jpg", "s2.jpg", "s3.jpg", "s4.jpg"] {
        write_image_file(root, name, 64, 48);
    }

    write_pool(root, &["s2.jpg", "s4.jpg"]);
    write_images(
        root,
        &[
            ("s1.jpg", &[[10, 10, 5, 5], [30, 20, 8, 12]]),
            ("s2.jpg", &[[4, 4, 6, 6], [0, 0, 0, 5]]),
            ("s3.jpg", &[[10, 10, 5, 5]]),
            ("s4.jpg", &[[8, 8, 2, 2], [20, 10, 6, 9]]),
        ],
    );
    write_train(
        root,
        &[
            ("p0", &[("s1.jpg", [10, 10, 5, 5]), ("s3.jpg", [10, 10, 5, 5])]),
            ("p1", &[("s1.jpg", [30, 20, 8, 12])]),
        ],
    );
    write_test_protocol(
        root,
        &[
            (("s2.jpg", [4, 4, 6, 6]), &[("s4.jpg", [8, 8, 2, 2])]),
            (("s4.jpg", [20, 10, 6, 9]), &[]),
        ],
    );
}
