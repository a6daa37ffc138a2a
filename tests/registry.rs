//! Integration tests for the dataset registry and the framework record
//! schema.

use searchset::dataset::{BoxXYXY, PersonId};
use searchset::registry::{
    register_cuhk_sysu, DatasetRegistry, EVALUATOR_TYPE, PERSON_CATEGORY_ID,
};

mod common;

#[test]
fn registers_both_splits_with_metadata() {
    let temp = tempfile::tempdir().expect("create temp dir");
    common::standard_dataset(temp.path());

    let mut registry = DatasetRegistry::new();
    register_cuhk_sysu(&mut registry, temp.path()).expect("register");

    assert_eq!(registry.names(), vec!["cuhk_sysu_test", "cuhk_sysu_train"]);

    let metadata = registry.metadata("cuhk_sysu_train").expect("metadata");
    assert_eq!(metadata.thing_classes, vec!["background", "person"]);
    assert_eq!(metadata.root, temp.path());
    assert_eq!(metadata.evaluator_type, EVALUATOR_TYPE);
}

#[test]
fn registration_is_lazy() {
    // Registering against a root that does not exist succeeds; only
    // producing records touches the disk.
    let mut registry = DatasetRegistry::new();
    register_cuhk_sysu(&mut registry, std::path::Path::new("/nonexistent/root"))
        .expect("register without touching disk");

    assert!(registry.contains("cuhk_sysu_train"));
    assert!(registry.produce("cuhk_sysu_train").is_err());
}

#[test]
fn produced_records_follow_the_framework_schema() {
    let temp = tempfile::tempdir().expect("create temp dir");
    common::standard_dataset(temp.path());

    let mut registry = DatasetRegistry::new();
    register_cuhk_sysu(&mut registry, temp.path()).expect("register");

    let records = registry.produce("cuhk_sysu_train").expect("produce train");
    assert_eq!(records.len(), 2);

    let s1 = &records[0];
    assert_eq!(s1.image_id, "s1.jpg");
    assert!(s1.file_name.ends_with("Image/SSM/s1.jpg"));
    assert_eq!(s1.width, 64);
    assert_eq!(s1.height, 48);

    assert_eq!(s1.annotations.len(), 2);
    let first = &s1.annotations[0];
    assert_eq!(first.bbox, BoxXYXY { x1: 10, y1: 10, x2: 15, y2: 15 });
    assert_eq!(first.category_id, PERSON_CATEGORY_ID);
    assert_eq!(first.person_id, PersonId::new(0));
    assert_eq!(s1.annotations[1].person_id, PersonId::new(1));
}

#[test]
fn train_and_test_identity_counts_are_independent() {
    let temp = tempfile::tempdir().expect("create temp dir");
    common::standard_dataset(temp.path());

    let mut registry = DatasetRegistry::new();
    register_cuhk_sysu(&mut registry, temp.path()).expect("register");

    let labeled_ids = |records: &[searchset::registry::ImageRecord]| {
        let mut ids: Vec<i32> = records
            .iter()
            .flat_map(|record| &record.annotations)
            .filter(|ann| ann.person_id.is_labeled())
            .map(|ann| ann.person_id.as_i32())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    };

    let train = registry.produce("cuhk_sysu_train").expect("produce train");
    let test = registry.produce("cuhk_sysu_test").expect("produce test");

    // Both splits number their identities from zero independently.
    assert_eq!(labeled_ids(&train), vec![0, 1]);
    assert_eq!(labeled_ids(&test), vec![0, 1]);
}
