//! Concurrent access stress tests for `MemoryBackend`.
//!
//! These tests exercise the storage backend under realistic multi-task
//! workloads to detect data races, deadlocks, and lost updates. They are
//! ignored by default for CI runtime control:
//!
//! ```bash
//! cargo test -p appdir-storage --test concurrent_stress -- --ignored
//! ```

#![allow(clippy::expect_used, clippy::panic)]

use appdir_storage::testutil::{application, seed_applications};
use appdir_storage::{
    APPLICATION_SEARCH, Collection, Filter, MemoryBackend, Patch, StorageBackend, StorageError,
    compile,
};
use serde_json::json;
use tokio::task::JoinSet;

/// Number of concurrent tasks for most tests.
const CONCURRENCY: usize = 16;

/// Number of contended-create rounds for the exactly-one-winner tests.
const ROUNDS: usize = 25;

/// Number of operations each task performs in mixed workload tests.
const OPS_PER_TASK: usize = 50;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn task_app_id(task: usize, i: usize) -> String {
    format!("app-{task:02}-{i:04}")
}

async fn connected() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.connect().await.expect("connect");
    backend
}

// ---------------------------------------------------------------------------
// Test: Parallel creators on distinct identities
// ---------------------------------------------------------------------------

/// Spawns `CONCURRENCY` tasks that each create `OPS_PER_TASK` records with
/// distinct identities. Every create must succeed and every record must be
/// present afterwards.
#[tokio::test]
#[ignore] // Run with --ignored
async fn parallel_creators_distinct_identities() {
    let backend = connected().await;

    let mut set = JoinSet::new();
    for task_id in 0..CONCURRENCY {
        let backend = backend.clone();
        set.spawn(async move {
            for i in 0..OPS_PER_TASK {
                let id = task_app_id(task_id, i);
                backend
                    .create(application(&id, "Parallel Create"))
                    .await
                    .expect("distinct-identity create should succeed");
            }
        });
    }
    while let Some(result) = set.join_next().await {
        result.expect("task should not panic");
    }

    let all = backend
        .find(&Collection::applications(), &Filter::new())
        .await
        .expect("find all");
    assert_eq!(all.len(), CONCURRENCY * OPS_PER_TASK, "no create may be lost");
}

// ---------------------------------------------------------------------------
// Test: Contended create — exactly one winner per round
// ---------------------------------------------------------------------------

/// In each round, `CONCURRENCY` tasks race to create the same identity.
/// Exactly one must succeed; all others must receive `StorageError::Conflict`.
#[tokio::test]
#[ignore]
async fn contended_create_exactly_one_winner() {
    let backend = connected().await;

    for round in 0..ROUNDS {
        let id = format!("contested-{round:03}");

        let mut set = JoinSet::new();
        for task_id in 0..CONCURRENCY {
            let backend = backend.clone();
            let id = id.clone();
            set.spawn(async move {
                backend.create(application(&id, &format!("Winner {task_id}"))).await
            });
        }

        let mut successes = 0usize;
        let mut conflicts = 0usize;
        while let Some(result) = set.join_next().await {
            match result.expect("task should not panic") {
                Ok(_) => successes += 1,
                Err(StorageError::Conflict { .. }) => conflicts += 1,
                Err(e) => panic!("unexpected error in round {round}: {e}"),
            }
        }

        assert_eq!(successes, 1, "round {round}: exactly one create should win");
        assert_eq!(conflicts, CONCURRENCY - 1, "round {round}: the rest should conflict");
    }
}

// ---------------------------------------------------------------------------
// Test: Contended transactions — exactly one winner per round
// ---------------------------------------------------------------------------

/// Like the contended create, but each task buffers its create in a
/// transaction. Commit-time validation must admit exactly one unit per round.
#[tokio::test]
#[ignore]
async fn contended_transactions_exactly_one_winner() {
    let backend = connected().await;

    for round in 0..ROUNDS {
        let id = format!("txn-contested-{round:03}");

        let mut set = JoinSet::new();
        for task_id in 0..CONCURRENCY {
            let backend = backend.clone();
            let id = id.clone();
            set.spawn(async move {
                let mut txn = backend.transaction().await.expect("transaction");
                txn.create(application(&id, &format!("Winner {task_id}")))
                    .expect("buffer create");
                txn.commit().await
            });
        }

        let mut successes = 0usize;
        let mut conflicts = 0usize;
        while let Some(result) = set.join_next().await {
            match result.expect("task should not panic") {
                Ok(()) => successes += 1,
                Err(StorageError::Conflict { .. }) => conflicts += 1,
                Err(e) => panic!("unexpected error in round {round}: {e}"),
            }
        }

        assert_eq!(successes, 1, "round {round}: exactly one commit should win");
        assert_eq!(conflicts, CONCURRENCY - 1, "round {round}: the rest should conflict");
    }
}

// ---------------------------------------------------------------------------
// Test: Mixed read/write workload
// ---------------------------------------------------------------------------

/// Each task runs a create/read/update cycle over its own identity space,
/// deleting every third record. No operation may fail and the final record
/// count must be exact.
#[tokio::test]
#[ignore]
async fn mixed_read_write_workload() {
    let backend = connected().await;
    let apps = Collection::applications();

    let mut set = JoinSet::new();
    for task_id in 0..CONCURRENCY {
        let backend = backend.clone();
        let apps = apps.clone();
        set.spawn(async move {
            for i in 0..OPS_PER_TASK {
                let id = task_app_id(task_id, i);
                backend
                    .create(application(&id, "Fresh"))
                    .await
                    .expect("create");
                let found = backend.find_by_id(&apps, &id).await.expect("find");
                assert!(found.is_some(), "own create must be visible");
                backend
                    .update_by_id(&apps, &id, Patch::new().set("title", json!("Updated")))
                    .await
                    .expect("update")
                    .expect("own record must still exist");
                if i % 3 == 0 {
                    backend
                        .delete_by_id(&apps, &id)
                        .await
                        .expect("delete")
                        .expect("own record must be deletable");
                }
            }
        });
    }
    while let Some(result) = set.join_next().await {
        result.expect("task should not panic");
    }

    let deleted_per_task = OPS_PER_TASK.div_ceil(3);
    let expected = CONCURRENCY * (OPS_PER_TASK - deleted_per_task);
    let all = backend.find(&apps, &Filter::new()).await.expect("find all");
    assert_eq!(all.len(), expected);
}

// ---------------------------------------------------------------------------
// Test: Searches racing with writes
// ---------------------------------------------------------------------------

/// Reader tasks run compiled searches while writer tasks insert matching
/// records. Searches must never error and every hit must be well-formed.
#[tokio::test]
#[ignore]
async fn searches_race_with_writes() {
    let backend = connected().await;
    let apps = Collection::applications();

    let Some(criteria) = json!({ "title": "racing" }).as_object().cloned() else {
        unreachable!("criteria literal is an object");
    };
    let query = compile(APPLICATION_SEARCH, &criteria).expect("compile");

    let mut set = JoinSet::new();
    for task_id in 0..CONCURRENCY / 2 {
        let backend = backend.clone();
        set.spawn(async move {
            for i in 0..OPS_PER_TASK {
                let id = task_app_id(task_id, i);
                backend
                    .create(application(&id, "Racing Record"))
                    .await
                    .expect("create");
            }
        });
    }
    for _ in 0..CONCURRENCY / 2 {
        let backend = backend.clone();
        let apps = apps.clone();
        let query = query.clone();
        set.spawn(async move {
            for _ in 0..OPS_PER_TASK {
                let hits = backend.search(&apps, &query).await.expect("search");
                for hit in hits {
                    assert_eq!(hit.get("title"), Some(&json!("Racing Record")));
                    assert!(hit.identity().starts_with("app-"));
                }
            }
        });
    }
    while let Some(result) = set.join_next().await {
        result.expect("task should not panic");
    }

    let hits = backend.search(&apps, &query).await.expect("final search");
    assert_eq!(hits.len(), (CONCURRENCY / 2) * OPS_PER_TASK, "all writes visible at the end");
}

// ---------------------------------------------------------------------------
// Test: Deletes racing with reads
// ---------------------------------------------------------------------------

/// One task deletes seeded records while readers look them up. A lookup must
/// observe either the complete record or nothing, never an error.
#[tokio::test]
#[ignore]
async fn deletes_race_with_reads() {
    let backend = connected().await;
    let apps = Collection::applications();

    let ids: Vec<String> = (0..OPS_PER_TASK).map(|i| task_app_id(0, i)).collect();
    for id in &ids {
        backend
            .create(application(id, "Disappearing"))
            .await
            .expect("seed create");
    }

    let mut set = JoinSet::new();
    {
        let backend = backend.clone();
        let apps = apps.clone();
        let ids = ids.clone();
        set.spawn(async move {
            for id in &ids {
                backend
                    .delete_by_id(&apps, id)
                    .await
                    .expect("delete")
                    .expect("seeded record must exist");
            }
        });
    }
    for _ in 0..CONCURRENCY {
        let backend = backend.clone();
        let apps = apps.clone();
        let ids = ids.clone();
        set.spawn(async move {
            for id in &ids {
                let seen = backend.find_by_id(&apps, id).await.expect("find never errors");
                if let Some(record) = seen {
                    assert_eq!(record.get("title"), Some(&json!("Disappearing")));
                }
            }
        });
    }
    while let Some(result) = set.join_next().await {
        result.expect("task should not panic");
    }

    let all = backend.find(&apps, &Filter::new()).await.expect("find all");
    assert!(all.is_empty(), "every record was deleted");
}

// ---------------------------------------------------------------------------
// Test: High-concurrency parallel reads
// ---------------------------------------------------------------------------

/// Many readers over the seeded catalog must all observe identical data.
#[tokio::test]
#[ignore]
async fn high_concurrency_parallel_reads() {
    let backend = connected().await;
    for record in seed_applications() {
        backend.create(record).await.expect("seed create");
    }
    let apps = Collection::applications();

    let baseline = backend.find(&apps, &Filter::new()).await.expect("baseline find");

    let mut set = JoinSet::new();
    for _ in 0..CONCURRENCY * 2 {
        let backend = backend.clone();
        let apps = apps.clone();
        let baseline = baseline.clone();
        set.spawn(async move {
            for _ in 0..OPS_PER_TASK {
                let all = backend.find(&apps, &Filter::new()).await.expect("find");
                assert_eq!(all, baseline, "readers must observe identical data");

                let one = backend
                    .find_by_id(&apps, "fdc3-workbench")
                    .await
                    .expect("find_by_id")
                    .expect("seeded record exists");
                assert_eq!(one.get("title"), Some(&json!("FDC3 Workbench")));
            }
        });
    }
    while let Some(result) = set.join_next().await {
        result.expect("task should not panic");
    }
}
