mod common;

use std::collections::HashSet;

use assert_matches::assert_matches;
use serde_json::json;

use catalog_week_sync::error::SyncError;
use catalog_week_sync::poller::{DatasetIndex, DedupPoller, PollPolicy};

use common::MockCatalog;

const A: &str = "https://catalog.test/api/1/datasets/?q=prices";
const B: &str = "https://catalog.test/api/2/datasets/?q=prices";

fn ids(range: std::ops::RangeInclusive<u32>) -> Vec<String> {
    range.map(|n| format!("d{n}")).collect()
}

fn page(mock: MockCatalog, url: &str, range: std::ops::RangeInclusive<u32>) -> MockCatalog {
    let ids = ids(range);
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    mock.page(url, &refs)
}

fn mirrors() -> Vec<String> {
    vec![A.to_string(), B.to_string()]
}

#[test]
fn stops_once_target_reached_and_not_before() {
    let mock = MockCatalog::new();
    let mock = page(mock, A, 1..=10);
    let mock = page(mock, B, 6..=15);
    let mock = page(mock, A, 1..=12);
    let mock = page(mock, B, 13..=22);
    let mock = page(mock, A, 18..=27);
    let mock = page(mock, B, 20..=27);

    let mirrors = mirrors();
    let mut index = DatasetIndex::new();
    let outcome = DedupPoller::new(&mock, &mirrors, PollPolicy::until(27))
        .poll(&mut index)
        .unwrap();

    assert_eq!(outcome.rounds, 3);
    assert!(outcome.reached_target);
    assert_eq!(index.len(), 27);
    assert_eq!(mock.count_calls("catalog"), 6);
}

#[test]
fn index_holds_each_identity_once() {
    let mock = MockCatalog::new();
    let mock = page(mock, A, 1..=8);
    let mock = page(mock, B, 4..=12);

    let mirrors = mirrors();
    let mut index = DatasetIndex::new();
    DedupPoller::new(&mock, &mirrors, PollPolicy::until(12))
        .poll(&mut index)
        .unwrap();

    let distinct: HashSet<_> = index.records().iter().map(|record| record.id.clone()).collect();
    assert_eq!(distinct.len(), index.len());
    assert_eq!(index.len(), 12);
}

#[test]
fn max_rounds_bounds_a_short_catalog() {
    let mock = page(page(MockCatalog::new(), A, 1..=3), B, 2..=3);
    let mirrors = mirrors();
    let mut index = DatasetIndex::new();
    let policy = PollPolicy {
        target: 5,
        max_rounds: Some(4),
        stable_rounds: None,
    };

    let err = DedupPoller::new(&mock, &mirrors, policy)
        .poll(&mut index)
        .unwrap_err();

    assert_matches!(
        err,
        SyncError::DiscoveryExhausted {
            found: 3,
            target: 5,
            rounds: 4
        }
    );
    assert_eq!(mock.count_calls("catalog"), 8);
}

#[test]
fn stable_rounds_accepts_a_settled_catalog() {
    let mock = page(page(MockCatalog::new(), A, 1..=3), B, 1..=3);
    let mirrors = mirrors();
    let mut index = DatasetIndex::new();
    let policy = PollPolicy {
        target: 10,
        max_rounds: None,
        stable_rounds: Some(2),
    };

    let outcome = DedupPoller::new(&mock, &mirrors, policy)
        .poll(&mut index)
        .unwrap();

    assert_eq!(outcome.rounds, 3);
    assert!(!outcome.reached_target);
    assert_eq!(index.len(), 3);
}

#[test]
fn zero_stable_rounds_keeps_polling_a_growing_catalog() {
    let mock = page(page(MockCatalog::new(), A, 1..=3), A, 1..=5);
    let mirrors = vec![A.to_string()];
    let mut index = DatasetIndex::new();
    let policy = PollPolicy {
        target: 5,
        max_rounds: None,
        stable_rounds: Some(0),
    };

    let outcome = DedupPoller::new(&mock, &mirrors, policy)
        .poll(&mut index)
        .unwrap();

    assert_eq!(outcome.rounds, 2);
    assert!(outcome.reached_target);
    assert_eq!(index.len(), 5);
}

#[test]
fn transport_error_aborts_discovery() {
    let mock = page(MockCatalog::new(), A, 1..=3);
    let mirrors = mirrors();
    let mut index = DatasetIndex::new();

    let err = DedupPoller::new(&mock, &mirrors, PollPolicy::until(3))
        .poll(&mut index)
        .unwrap_err();

    assert_matches!(err, SyncError::CatalogHttp(_));
}

#[test]
fn response_without_data_list_is_fatal() {
    let mock = MockCatalog::new().page_value(A, json!({"data": {"oops": true}}));
    let mirrors = vec![A.to_string()];
    let mut index = DatasetIndex::new();

    let err = DedupPoller::new(&mock, &mirrors, PollPolicy::until(1))
        .poll(&mut index)
        .unwrap_err();

    assert_matches!(err, SyncError::CatalogShape(_));
}

#[test]
fn entries_without_identity_are_dropped() {
    let mock = MockCatalog::new().page_value(
        A,
        json!({"data": [{"id": "d1"}, {"title": "no id"}, {"id": 7}]}),
    );
    let mirrors = vec![A.to_string()];
    let mut index = DatasetIndex::new();

    DedupPoller::new(&mock, &mirrors, PollPolicy::until(2))
        .poll(&mut index)
        .unwrap();

    let ids: Vec<&str> = index.records().iter().map(|record| record.id.as_str()).collect();
    assert_eq!(ids, vec!["d1", "7"]);
}
