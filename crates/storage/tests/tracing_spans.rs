//! Integration test verifying that `#[instrument]` annotations produce
//! the expected span names on `MemoryBackend` operations.

#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use appdir_storage::testutil::application;
use appdir_storage::{
    APPLICATION_SEARCH, Collection, Filter, MemoryBackend, Patch, StorageBackend, compile,
};
use serde_json::json;
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Collecting layer — records span names as they are created
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }
}

async fn connected() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.connect().await.expect("connect should succeed");
    backend
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_backend_create_creates_span() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let backend = connected().await;
    backend
        .create(application("span-app", "Span App"))
        .await
        .expect("create should succeed");

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "create"), "expected a 'create' span, got: {recorded:?}");
}

#[tokio::test]
async fn memory_backend_find_by_id_creates_span() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let backend = connected().await;
    let _ = backend.find_by_id(&Collection::applications(), "missing").await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(
        recorded.iter().any(|s| s == "find_by_id"),
        "expected a 'find_by_id' span, got: {recorded:?}"
    );
}

#[tokio::test]
async fn memory_backend_search_creates_span() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let backend = connected().await;
    let Some(criteria) = json!({ "title": "workbench" }).as_object().cloned() else {
        unreachable!("criteria literal is an object");
    };
    let query = compile(APPLICATION_SEARCH, &criteria).expect("compile");
    let _ = backend.search(&Collection::applications(), &query).await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "search"), "expected a 'search' span, got: {recorded:?}");
}

#[tokio::test]
async fn memory_backend_transaction_creates_span() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let backend = connected().await;
    let _ = backend.transaction().await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(
        recorded.iter().any(|s| s == "transaction"),
        "expected a 'transaction' span, got: {recorded:?}"
    );
}

#[tokio::test]
async fn memory_backend_check_health_creates_span() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let backend = MemoryBackend::new();
    let _ = backend.check_health().await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(
        recorded.iter().any(|s| s == "check_health"),
        "expected a 'check_health' span, got: {recorded:?}"
    );
}

#[tokio::test]
async fn all_contract_operations_produce_distinct_spans() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let backend = MemoryBackend::new();
    let apps = Collection::applications();

    // Exercise the full contract surface
    backend.connect().await.expect("connect");
    backend.create(application("spans", "Spans")).await.expect("create");
    let _ = backend.find_by_id(&apps, "spans").await;
    let _ = backend.update_by_id(&apps, "spans", Patch::new().set("title", json!("S"))).await;
    let _ = backend.find(&apps, &Filter::new()).await;
    let _ = backend.find_one(&apps, &Filter::new()).await;
    let _ = backend.find_one_and_update(&apps, &Filter::new(), Patch::new()).await;
    let _ = backend.find_one_and_delete(&apps, &Filter::new()).await;
    let _ = backend.delete_by_id(&apps, "spans").await;
    let _ = backend.delete_many(&apps, &Filter::new()).await;
    let Some(criteria) = json!({ "title": "spans" }).as_object().cloned() else {
        unreachable!("criteria literal is an object");
    };
    let query = compile(APPLICATION_SEARCH, &criteria).expect("compile");
    let _ = backend.search(&apps, &query).await;
    let _ = backend.transaction().await;
    let _ = backend.check_health().await;
    backend.disconnect().await.expect("disconnect");

    let recorded = spans.lock().expect("lock poisoned");
    let expected = [
        "connect",
        "create",
        "find_by_id",
        "update_by_id",
        "find",
        "find_one",
        "find_one_and_update",
        "find_one_and_delete",
        "delete_by_id",
        "delete_many",
        "search",
        "transaction",
        "check_health",
        "disconnect",
    ];

    for name in &expected {
        assert!(
            recorded.iter().any(|s| s == name),
            "missing span '{name}', recorded: {recorded:?}"
        );
    }
}
