//! End-to-end search pipeline tests: raw criteria through `compile`, the
//! backend's per-field passes, and the store's identity deduplication.
//!
//! These tests run against the seeded application catalog, so expectations
//! name concrete descriptors rather than synthetic fixtures.

#![allow(clippy::expect_used, clippy::panic)]

use appdir_storage::testutil::seed_applications;
use appdir_storage::{
    APPLICATION_SEARCH, Attributes, Collection, MemoryBackend, Record, StorageBackend,
    StorageConfig, StorageError, Store, compile,
};
use serde_json::{Value, json};

async fn seeded_store() -> Store {
    let config = StorageConfig::builder().backend("memory").build().expect("config");
    let store = Store::from_config(&config).expect("store construction");
    store.connect().await.expect("connect");
    for record in seed_applications() {
        store.create(record).await.expect("seed create");
    }
    store
}

fn criteria(value: Value) -> Attributes {
    let Value::Object(map) = value else {
        unreachable!("criteria fixtures are JSON objects");
    };
    map
}

fn identities(records: &[Record]) -> Vec<&str> {
    records.iter().map(|record| record.identity()).collect()
}

// ============================================================================
// Single-field matching
// ============================================================================

/// Title search is case-insensitive substring containment.
#[tokio::test]
async fn title_search_is_case_insensitive_substring() {
    let store = seeded_store().await;
    let apps = Collection::applications();

    for raw in ["work", "WORK", "  Workbench  "] {
        let query =
            compile(APPLICATION_SEARCH, &criteria(json!({ "title": raw }))).expect("compile");
        let hits = store.search(&apps, &query).await.expect("search");
        assert_eq!(identities(&hits), ["fdc3-workbench"], "criteria {raw:?}");
    }
}

/// Identity search matches by containment too, so a fragment of an app id
/// finds the descriptor.
#[tokio::test]
async fn app_id_search_matches_fragments() {
    let store = seeded_store().await;
    let apps = Collection::applications();

    let query =
        compile(APPLICATION_SEARCH, &criteria(json!({ "appId": "view" }))).expect("compile");
    let hits = store.search(&apps, &query).await.expect("search");
    assert_eq!(identities(&hits), ["trading-view"]);
}

/// Description search reaches the descriptor's free text.
#[tokio::test]
async fn description_search_hits_free_text() {
    let store = seeded_store().await;
    let apps = Collection::applications();

    let query = compile(APPLICATION_SEARCH, &criteria(json!({ "description": "real-time" })))
        .expect("compile");
    let hits = store.search(&apps, &query).await.expect("search");
    assert_eq!(identities(&hits), ["market-data"]);
}

/// A full dotted version matches without any warning.
#[tokio::test]
async fn full_version_matches_cleanly() {
    let store = seeded_store().await;
    let apps = Collection::applications();

    let query =
        compile(APPLICATION_SEARCH, &criteria(json!({ "version": "1.5.0" }))).expect("compile");
    assert!(query.warnings().is_empty(), "full version needs no warning");

    let hits = store.search(&apps, &query).await.expect("search");
    assert_eq!(identities(&hits), ["market-data"]);
}

/// A partial version degrades to substring matching with a warning rather
/// than failing the whole search.
#[tokio::test]
async fn partial_version_degrades_to_substring() {
    let store = seeded_store().await;
    let apps = Collection::applications();

    let query =
        compile(APPLICATION_SEARCH, &criteria(json!({ "version": "1.5" }))).expect("compile");
    assert_eq!(query.warnings().len(), 1);
    assert!(
        query.warnings()[0].contains("major.minor.patch"),
        "warning should name the expected shape: {:?}",
        query.warnings()[0]
    );

    let hits = store.search(&apps, &query).await.expect("search");
    assert_eq!(identities(&hits), ["market-data"]);
}

/// Category terms match whole entries case-insensitively, never substrings.
#[tokio::test]
async fn categories_match_on_whole_entries() {
    let store = seeded_store().await;
    let apps = Collection::applications();

    let query = compile(APPLICATION_SEARCH, &criteria(json!({ "categories": ["analytics"] })))
        .expect("compile");
    let hits = store.search(&apps, &query).await.expect("search");
    assert_eq!(identities(&hits), ["market-data", "trading-view"]);

    let query = compile(APPLICATION_SEARCH, &criteria(json!({ "categories": ["ANALYT"] })))
        .expect("compile");
    let hits = store.search(&apps, &query).await.expect("search");
    assert!(hits.is_empty(), "category fragments must not match");
}

// ============================================================================
// Disjunction and deduplication
// ============================================================================

/// Multiple criteria fields widen the result: a record matching any field is
/// returned.
#[tokio::test]
async fn multi_field_criteria_are_disjunctive() {
    let store = seeded_store().await;
    let apps = Collection::applications();

    let query = compile(
        APPLICATION_SEARCH,
        &criteria(json!({ "title": "market", "categories": ["TESTING"] })),
    )
    .expect("compile");

    let hits = store.search(&apps, &query).await.expect("search");
    assert_eq!(identities(&hits), ["market-data", "fdc3-workbench"]);
}

/// A record matching several fields surfaces once from the store even though
/// the backend reports one hit per field.
#[tokio::test]
async fn multi_field_hits_collapse_to_one() {
    let store = seeded_store().await;
    let apps = Collection::applications();

    let query = compile(
        APPLICATION_SEARCH,
        &criteria(json!({ "title": "trading", "categories": ["TRADING"] })),
    )
    .expect("compile");

    let hits = store.search(&apps, &query).await.expect("search");
    assert_eq!(identities(&hits), ["trading-view"]);
}

/// The same double-match seen at the backend layer still carries duplicates,
/// pinning where deduplication happens.
#[tokio::test]
async fn backend_layer_reports_duplicates() {
    let backend = MemoryBackend::new();
    backend.connect().await.expect("connect");
    for record in seed_applications() {
        backend.create(record).await.expect("seed create");
    }

    let query = compile(
        APPLICATION_SEARCH,
        &criteria(json!({ "title": "trading", "categories": ["TRADING"] })),
    )
    .expect("compile");

    let raw = backend
        .search(&Collection::applications(), &query)
        .await
        .expect("backend search");
    assert_eq!(raw.len(), 2, "one hit per matching field at the backend");
    assert!(raw.iter().all(|record| record.identity() == "trading-view"));
}

// ============================================================================
// Degradation and failure
// ============================================================================

/// Malformed fields degrade one by one; the surviving field still searches.
#[tokio::test]
async fn malformed_fields_degrade_with_warnings() {
    let store = seeded_store().await;
    let apps = Collection::applications();

    let query = compile(
        APPLICATION_SEARCH,
        &criteria(json!({ "title": "   ", "version": 2, "categories": ["TRADING", ""] })),
    )
    .expect("one usable field remains");

    // Blank title, non-string version, blank category entry.
    assert_eq!(query.warnings().len(), 3, "warnings: {:?}", query.warnings());
    assert_eq!(query.matchers().len(), 1);

    let hits = store.search(&apps, &query).await.expect("search");
    assert_eq!(identities(&hits), ["trading-view"]);
}

/// When every field degrades, compilation fails and the error carries the
/// warnings explaining why.
#[tokio::test]
async fn fully_degraded_criteria_fail_with_warnings() {
    let result = compile(
        APPLICATION_SEARCH,
        &criteria(json!({ "title": "   ", "version": 7 })),
    );

    match result {
        Err(StorageError::InvalidSearchCriteria { warnings }) => {
            assert_eq!(warnings.len(), 2, "warnings: {warnings:?}");
        },
        other => panic!("expected InvalidSearchCriteria, got {other:?}"),
    }
}

/// Criteria fields outside the search schema are ignored entirely.
#[tokio::test]
async fn unknown_criteria_fields_are_ignored() {
    let store = seeded_store().await;
    let apps = Collection::applications();

    let query = compile(
        APPLICATION_SEARCH,
        &criteria(json!({ "publisher": "FINOS", "title": "workbench" })),
    )
    .expect("compile");
    assert!(query.warnings().is_empty(), "unknown fields are not warnings");

    let hits = store.search(&apps, &query).await.expect("search");
    assert_eq!(identities(&hits), ["fdc3-workbench"]);
}

/// Criteria made up entirely of unknown fields compile to nothing and fail,
/// with no warnings to show for it.
#[tokio::test]
async fn only_unknown_fields_fail_compilation() {
    let result = compile(APPLICATION_SEARCH, &criteria(json!({ "publisher": "FINOS" })));

    match result {
        Err(StorageError::InvalidSearchCriteria { warnings }) => {
            assert!(warnings.is_empty(), "unknown fields degrade silently: {warnings:?}");
        },
        other => panic!("expected InvalidSearchCriteria, got {other:?}"),
    }
}

/// A valid query that matches nothing returns an empty list.
#[tokio::test]
async fn no_hits_is_an_empty_result() {
    let store = seeded_store().await;
    let apps = Collection::applications();

    let query = compile(APPLICATION_SEARCH, &criteria(json!({ "title": "nonexistent" })))
        .expect("compile");
    let hits = store.search(&apps, &query).await.expect("search");
    assert!(hits.is_empty(), "got {hits:?}");
}
