//! Conformance suite for [`StorageBackend`] implementations.
//!
//! Every backend that claims to implement the storage contract should pass
//! this suite. The functions are generic over the backend type, so an engine
//! crate can wire them up against its own adapter without depending on the
//! in-memory reference implementation.
//!
//! Each function expects a *fresh* backend instance and drives the connection
//! lifecycle itself, so the same list of calls works for engines that need a
//! real handshake and for engines where `connect` is a no-op.
//!
//! # Usage
//!
//! ```no_run
//! use appdir_storage::{MemoryBackend, conformance};
//!
//! #[tokio::test]
//! async fn memory_backend_round_trips_records() {
//!     conformance::create_then_find_round_trips(&MemoryBackend::new()).await;
//! }
//! ```
//!
//! # Test Categories
//!
//! | Category     | Functions | What they pin down                              |
//! |--------------|-----------|-------------------------------------------------|
//! | Lifecycle    | 4         | connect/disconnect idempotency, health, gating  |
//! | CRUD         | 6         | round-trips, images, conflicts, identity guard  |
//! | Filters      | 4         | conjunctive matching, first-match, bulk deletes |
//! | Search       | 2         | per-field hits, empty results                   |
//! | Transactions | 5         | atomicity, isolation, handle resolution         |

use serde_json::{Value, json};

use crate::{
    assert_conflict,
    assert_invalid_transaction,
    backend::StorageBackend,
    error::StorageError,
    query::{APPLICATION_SEARCH, Filter, compile},
    record::{Attributes, Collection, Patch},
    testutil::application,
};

fn criteria(value: Value) -> Attributes {
    let Value::Object(map) = value else {
        unreachable!("search criteria fixtures are JSON objects");
    };
    map
}

// ============================================================================
// Lifecycle (4 functions)
// ============================================================================

/// `connect` may be called repeatedly without error.
pub async fn connect_is_idempotent<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("first connect failed");
    backend.connect().await.expect("second connect failed");

    let report = backend.check_health().await.expect("check_health failed");
    assert!(
        report.is_healthy(),
        "backend should report healthy after connect, got {report:?}"
    );
}

/// `disconnect` on a never-connected backend is a no-op.
pub async fn disconnect_without_connect_is_noop<B: StorageBackend>(backend: &B) {
    backend
        .disconnect()
        .await
        .expect("disconnect on a fresh backend failed");
}

/// `check_health` reflects the connection state and never errors for a
/// merely-disconnected backend.
pub async fn health_reflects_connection<B: StorageBackend>(backend: &B) {
    let report = backend.check_health().await.expect("check_health failed");
    assert!(
        !report.is_healthy(),
        "fresh backend should report unhealthy, got {report:?}"
    );

    backend.connect().await.expect("connect failed");
    let report = backend.check_health().await.expect("check_health failed");
    assert!(
        report.is_healthy(),
        "connected backend should report healthy, got {report:?}"
    );

    backend.disconnect().await.expect("disconnect failed");
    let report = backend.check_health().await.expect("check_health failed");
    assert!(
        !report.is_healthy(),
        "disconnected backend should report unhealthy, got {report:?}"
    );
}

/// Data operations against a disconnected backend fail with `Unavailable`.
pub async fn operations_require_connection<B: StorageBackend>(backend: &B) {
    let result = backend
        .find_by_id(&Collection::applications(), "conf-disconnected")
        .await;
    assert!(
        matches!(result, Err(StorageError::Unavailable { .. })),
        "find_by_id on a disconnected backend should be Unavailable, got {result:?}"
    );

    let result = backend.create(application("conf-disconnected", "Nope")).await;
    assert!(
        matches!(result, Err(StorageError::Unavailable { .. })),
        "create on a disconnected backend should be Unavailable, got {result:?}"
    );
}

// ============================================================================
// CRUD (6 functions)
// ============================================================================

/// A created record comes back from `find_by_id` with every caller-supplied
/// attribute intact.
pub async fn create_then_find_round_trips<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    let mut record = application("conf-round-trip", "Round Trip");
    record
        .set("description", json!("checks attribute preservation"))
        .expect("setting a non-identity attribute failed");

    let created = backend.create(record.clone()).await.expect("create failed");
    let found = backend
        .find_by_id(&Collection::applications(), "conf-round-trip")
        .await
        .expect("find_by_id failed")
        .expect("created record should be findable");

    for (field, value) in record.attributes() {
        assert_eq!(
            found.attributes().get(field),
            Some(value),
            "attribute {field:?} should survive the round trip"
        );
    }
    assert_eq!(created.identity(), found.identity());
}

/// `find_by_id` returns `None` for an id that was never created.
pub async fn find_by_id_missing_returns_none<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    let found = backend
        .find_by_id(&Collection::applications(), "conf-never-created")
        .await
        .expect("find_by_id failed");
    assert!(found.is_none(), "expected None, got {found:?}");
}

/// Creating two records with the same identity is a conflict, and the first
/// record is untouched.
pub async fn duplicate_create_conflicts<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    backend
        .create(application("conf-duplicate", "First"))
        .await
        .expect("first create failed");
    let result = backend.create(application("conf-duplicate", "Second")).await;
    assert_conflict!(result);

    let survivor = backend
        .find_by_id(&Collection::applications(), "conf-duplicate")
        .await
        .expect("find_by_id failed")
        .expect("original record should still exist");
    assert_eq!(survivor.attributes().get("title"), Some(&json!("First")));
}

/// `update_by_id` returns the post-image, and `None` for a missing id.
pub async fn update_returns_post_image<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    backend
        .create(application("conf-update", "Before"))
        .await
        .expect("create failed");

    let patch = Patch::new().set("title", json!("After"));
    let updated = backend
        .update_by_id(&Collection::applications(), "conf-update", patch.clone())
        .await
        .expect("update_by_id failed")
        .expect("existing record should be updated");
    assert_eq!(updated.attributes().get("title"), Some(&json!("After")));

    let missing = backend
        .update_by_id(&Collection::applications(), "conf-update-missing", patch)
        .await
        .expect("update_by_id failed");
    assert!(missing.is_none(), "expected None, got {missing:?}");
}

/// `delete_by_id` returns the removed record once, then `None`.
pub async fn delete_returns_pre_image<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    backend
        .create(application("conf-delete", "Doomed"))
        .await
        .expect("create failed");

    let removed = backend
        .delete_by_id(&Collection::applications(), "conf-delete")
        .await
        .expect("delete_by_id failed")
        .expect("existing record should be deleted");
    assert_eq!(removed.attributes().get("title"), Some(&json!("Doomed")));

    let gone = backend
        .find_by_id(&Collection::applications(), "conf-delete")
        .await
        .expect("find_by_id failed");
    assert!(gone.is_none(), "deleted record should not be findable");

    let again = backend
        .delete_by_id(&Collection::applications(), "conf-delete")
        .await
        .expect("delete_by_id failed");
    assert!(again.is_none(), "second delete should return None");
}

/// A patch naming the identity field is rejected and the record is unchanged.
pub async fn update_rejects_identity_patch<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    backend
        .create(application("conf-immutable", "Immutable"))
        .await
        .expect("create failed");

    let patch = Patch::new().set("appId", json!("conf-renamed"));
    let result = backend
        .update_by_id(&Collection::applications(), "conf-immutable", patch)
        .await;
    assert!(
        matches!(result, Err(StorageError::ImmutableIdentity { .. })),
        "identity patch should be rejected, got {result:?}"
    );

    let unchanged = backend
        .find_by_id(&Collection::applications(), "conf-immutable")
        .await
        .expect("find_by_id failed");
    assert!(unchanged.is_some(), "record should survive a rejected patch");
}

// ============================================================================
// Filters (4 functions)
// ============================================================================

/// An empty filter matches every record in the collection.
pub async fn empty_filter_matches_all<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    backend
        .create(application("conf-all-a", "A"))
        .await
        .expect("create failed");
    backend
        .create(application("conf-all-b", "B"))
        .await
        .expect("create failed");

    let found = backend
        .find(&Collection::applications(), &Filter::new())
        .await
        .expect("find failed");
    assert_eq!(found.len(), 2, "empty filter should match both records");
}

/// Multi-clause filters are conjunctive: a record must match every clause.
pub async fn filters_are_conjunctive<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    let mut matching = application("conf-conj-match", "Shared Title");
    matching
        .set("publisher", json!("Example Corp"))
        .expect("set failed");
    backend.create(matching).await.expect("create failed");

    let mut near_miss = application("conf-conj-miss", "Shared Title");
    near_miss
        .set("publisher", json!("Other Corp"))
        .expect("set failed");
    backend.create(near_miss).await.expect("create failed");

    let filter = Filter::new()
        .field("title", json!("Shared Title"))
        .field("publisher", json!("Example Corp"));
    let found = backend
        .find(&Collection::applications(), &filter)
        .await
        .expect("find failed");
    assert_eq!(found.len(), 1, "only the record matching every clause");
    assert_eq!(found[0].identity(), "conf-conj-match");
}

/// `find_one` returns a record matching the filter, or `None` when nothing
/// matches.
pub async fn find_one_returns_a_match<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    backend
        .create(application("conf-one", "Single"))
        .await
        .expect("create failed");

    let found = backend
        .find_one(&Collection::applications(), &Filter::new().field("title", json!("Single")))
        .await
        .expect("find_one failed")
        .expect("a matching record exists");
    assert_eq!(found.identity(), "conf-one");

    let missing = backend
        .find_one(&Collection::applications(), &Filter::new().field("title", json!("Absent")))
        .await
        .expect("find_one failed");
    assert!(missing.is_none(), "expected None, got {missing:?}");
}

/// `delete_many` removes exactly the matching records and reports the count.
pub async fn delete_many_reports_count<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    for (id, title) in [
        ("conf-bulk-a", "Purge"),
        ("conf-bulk-b", "Purge"),
        ("conf-bulk-c", "Keep"),
    ] {
        backend
            .create(application(id, title))
            .await
            .expect("create failed");
    }

    let removed = backend
        .delete_many(&Collection::applications(), &Filter::new().field("title", json!("Purge")))
        .await
        .expect("delete_many failed");
    assert_eq!(removed, 2, "two records match the purge filter");

    let remaining = backend
        .find(&Collection::applications(), &Filter::new())
        .await
        .expect("find failed");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].identity(), "conf-bulk-c");
}

// ============================================================================
// Search (2 functions)
// ============================================================================

/// A record matching several fields appears once per matching field in the
/// raw backend results. Deduplication is the caller's concern.
pub async fn search_reports_one_hit_per_field<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    let mut record = application("conf-search", "Ledger Workbench");
    record
        .set("description", json!("A ledger for everything"))
        .expect("set failed");
    backend.create(record).await.expect("create failed");

    let criteria = criteria(json!({ "title": "ledger", "description": "ledger" }));
    let query = compile(APPLICATION_SEARCH, &criteria).expect("criteria should compile");

    let hits = backend
        .search(&Collection::applications(), &query)
        .await
        .expect("search failed");
    assert_eq!(
        hits.len(),
        2,
        "one hit per matching field, got {hits:?}"
    );
    assert!(hits.iter().all(|record| record.identity() == "conf-search"));
}

/// A query that matches nothing returns an empty list, not an error.
pub async fn search_without_matches_is_empty<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    backend
        .create(application("conf-search-miss", "Telemetry"))
        .await
        .expect("create failed");

    let criteria = criteria(json!({ "title": "ledger" }));
    let query = compile(APPLICATION_SEARCH, &criteria).expect("criteria should compile");

    let hits = backend
        .search(&Collection::applications(), &query)
        .await
        .expect("search failed");
    assert!(hits.is_empty(), "expected no hits, got {hits:?}");
}

// ============================================================================
// Transactions (5 functions)
// ============================================================================

/// Buffered writes are visible to reads through the same handle before
/// commit.
pub async fn transaction_reads_its_own_writes<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    let mut txn = backend.transaction().await.expect("transaction failed");
    txn.create(application("conf-txn-read", "Buffered"))
        .expect("buffering a create failed");

    let seen = txn
        .find_by_id(&Collection::applications(), "conf-txn-read")
        .await
        .expect("transactional find failed")
        .expect("buffered create should be visible in the handle");
    assert_eq!(seen.attributes().get("title"), Some(&json!("Buffered")));

    txn.abort().await.expect("abort failed");
}

/// Nothing a transaction buffers is visible until commit, and everything is
/// visible after.
pub async fn transaction_commit_applies_atomically<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    let mut txn = backend.transaction().await.expect("transaction failed");
    txn.create(application("conf-txn-a", "First"))
        .expect("buffering failed");
    txn.create(application("conf-txn-b", "Second"))
        .expect("buffering failed");

    for id in ["conf-txn-a", "conf-txn-b"] {
        let visible = backend
            .find_by_id(&Collection::applications(), id)
            .await
            .expect("find_by_id failed");
        assert!(
            visible.is_none(),
            "{id} should not be visible before commit"
        );
    }

    txn.commit().await.expect("commit failed");

    for id in ["conf-txn-a", "conf-txn-b"] {
        let visible = backend
            .find_by_id(&Collection::applications(), id)
            .await
            .expect("find_by_id failed");
        assert!(visible.is_some(), "{id} should be visible after commit");
    }
}

/// Aborting discards every buffered operation.
pub async fn transaction_abort_discards_buffer<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    let mut txn = backend.transaction().await.expect("transaction failed");
    txn.create(application("conf-txn-aborted", "Discarded"))
        .expect("buffering failed");
    txn.abort().await.expect("abort failed");

    let visible = backend
        .find_by_id(&Collection::applications(), "conf-txn-aborted")
        .await
        .expect("find_by_id failed");
    assert!(visible.is_none(), "aborted create should not be applied");
}

/// A conflicting buffered create rejects the whole unit at commit.
pub async fn transaction_conflict_rejects_whole_unit<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    backend
        .create(application("conf-txn-taken", "Occupied"))
        .await
        .expect("create failed");

    let mut txn = backend.transaction().await.expect("transaction failed");
    txn.create(application("conf-txn-fresh", "Innocent"))
        .expect("buffering failed");
    txn.create(application("conf-txn-taken", "Usurper"))
        .expect("buffering failed");

    let result = txn.commit().await;
    assert_conflict!(result);

    let innocent = backend
        .find_by_id(&Collection::applications(), "conf-txn-fresh")
        .await
        .expect("find_by_id failed");
    assert!(
        innocent.is_none(),
        "no part of a rejected unit should be applied"
    );
    let occupant = backend
        .find_by_id(&Collection::applications(), "conf-txn-taken")
        .await
        .expect("find_by_id failed")
        .expect("pre-existing record should survive");
    assert_eq!(occupant.attributes().get("title"), Some(&json!("Occupied")));
}

/// A committed or aborted handle rejects every further operation.
pub async fn resolved_transaction_rejects_operations<B: StorageBackend>(backend: &B) {
    backend.connect().await.expect("connect failed");

    let mut txn = backend.transaction().await.expect("transaction failed");
    txn.commit().await.expect("commit of an empty unit failed");

    assert_invalid_transaction!(txn.create(application("conf-txn-late", "Late")));
    assert_invalid_transaction!(txn.commit().await);
    assert_invalid_transaction!(txn.abort().await);
    assert_invalid_transaction!(txn.find_by_id(&Collection::applications(), "conf-txn-late").await);
}

// ============================================================================
// Full suite
// ============================================================================

/// Runs every conformance function in sequence, each against a fresh backend
/// from the factory.
///
/// This is the completeness check: a function added to this module but not
/// wired into a caller's per-test list still runs here.
pub async fn run_all<B, F>(factory: F)
where
    B: StorageBackend,
    F: Fn() -> B,
{
    connect_is_idempotent(&factory()).await;
    disconnect_without_connect_is_noop(&factory()).await;
    health_reflects_connection(&factory()).await;
    operations_require_connection(&factory()).await;
    create_then_find_round_trips(&factory()).await;
    find_by_id_missing_returns_none(&factory()).await;
    duplicate_create_conflicts(&factory()).await;
    update_returns_post_image(&factory()).await;
    delete_returns_pre_image(&factory()).await;
    update_rejects_identity_patch(&factory()).await;
    empty_filter_matches_all(&factory()).await;
    filters_are_conjunctive(&factory()).await;
    find_one_returns_a_match(&factory()).await;
    delete_many_reports_count(&factory()).await;
    search_reports_one_hit_per_field(&factory()).await;
    search_without_matches_is_empty(&factory()).await;
    transaction_reads_its_own_writes(&factory()).await;
    transaction_commit_applies_atomically(&factory()).await;
    transaction_abort_discards_buffer(&factory()).await;
    transaction_conflict_rejects_whole_unit(&factory()).await;
    resolved_transaction_rejects_operations(&factory()).await;
}
