mod common;

use assert_matches::assert_matches;
use serde_json::json;

use catalog_week_sync::domain::{DatasetRecord, ResourceEntry};
use catalog_week_sync::error::SyncError;
use catalog_week_sync::resolver::{Resolution, ResourceResolver, Unresolved};

use common::{MockCatalog, file_resource};

const URI: &str = "https://catalog.test/api/1/datasets/shop-prices/";

#[test]
fn inline_list_is_returned_unchanged() {
    let mock = MockCatalog::new();
    let record = DatasetRecord::from_value(json!({
        "id": "d1",
        "resources": [file_resource("r1", "a.csv", "https://files.test/a", "2024-01-01")],
        "uri": URI,
    }))
    .unwrap();

    let resolution = ResourceResolver::new(&mock).resolve(&record).unwrap();

    assert_matches!(resolution, Resolution::Resources(entries) if entries.len() == 1);
    assert!(mock.calls().is_empty());
}

#[test]
fn placeholder_object_follows_the_uri() {
    let mock = MockCatalog::new().dataset(
        URI,
        json!({
            "id": "d1",
            "resources": [
                file_resource("r1", "a.csv", "https://files.test/a", "2024-01-01"),
                file_resource("r2", "b.csv", "https://files.test/b", "2024-01-01"),
            ]
        }),
    );
    let record = DatasetRecord::from_value(json!({
        "id": "d1",
        "resources": {"rel": "subsection", "href": "https://catalog.test/api/2/datasets/d1/resources/", "total": 2},
        "uri": URI,
    }))
    .unwrap();

    let resolution = ResourceResolver::new(&mock).resolve(&record).unwrap();

    let Resolution::Resources(entries) = resolution else {
        panic!("expected resources");
    };
    let ids: Vec<_> = entries
        .iter()
        .map(|entry| match entry {
            ResourceEntry::Record(record) => record.id.as_str().to_string(),
            ResourceEntry::Malformed(reason) => panic!("malformed: {reason}"),
        })
        .collect();
    assert_eq!(ids, vec!["r1", "r2"]);
    assert_eq!(mock.count_calls("dataset"), 1);
}

#[test]
fn missing_uri_yields_nothing_without_fetching() {
    let mock = MockCatalog::new();
    let record = DatasetRecord::from_value(json!({
        "id": "d1",
        "resources": {"total": 2},
    }))
    .unwrap();

    let resolution = ResourceResolver::new(&mock).resolve(&record).unwrap();

    assert_eq!(resolution, Resolution::Unavailable(Unresolved::MissingUri));
    assert!(mock.calls().is_empty());
}

#[test]
fn still_not_a_list_after_indirection() {
    let mock = MockCatalog::new().dataset(URI, json!({"id": "d1", "resources": {"total": 0}}));
    let record = DatasetRecord::from_value(json!({
        "id": "d1",
        "resources": {"total": 0},
        "uri": URI,
    }))
    .unwrap();

    let resolution = ResourceResolver::new(&mock).resolve(&record).unwrap();

    assert_matches!(resolution, Resolution::Unavailable(Unresolved::NotAList { .. }));
}

#[test]
fn indirection_transport_error_propagates() {
    let mock = MockCatalog::new();
    let record = DatasetRecord::from_value(json!({
        "id": "d1",
        "resources": {"total": 1},
        "uri": URI,
    }))
    .unwrap();

    let err = ResourceResolver::new(&mock).resolve(&record).unwrap_err();

    assert_matches!(err, SyncError::CatalogStatus { status: 404, .. });
}

#[test]
fn scalar_entries_are_marked_malformed() {
    let mock = MockCatalog::new();
    let record = DatasetRecord::from_value(json!({
        "id": "d1",
        "resources": ["oops", file_resource("r1", "a.csv", "https://files.test/a", "2024-01-01")],
    }))
    .unwrap();

    let Resolution::Resources(entries) = ResourceResolver::new(&mock).resolve(&record).unwrap()
    else {
        panic!("expected resources");
    };

    assert_matches!(entries[0], ResourceEntry::Malformed(_));
    assert_matches!(entries[1], ResourceEntry::Record(_));
}
