//! Seeds a store with the well-known demo application descriptors.
//!
//! Each descriptor is created only if its identity is absent, so the example
//! is safe to run repeatedly against the same store. Finishes with a catalog
//! search to show the seeded records coming back out.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --example seed
//! ```

use appdir_storage::{
    APPLICATION_SEARCH, Collection, StorageConfig, Store, compile,
    testutil::seed_applications,
};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = StorageConfig::builder().backend("memory").build()?;
    let store = Store::from_config(&config)?;
    store.connect().await?;
    tracing::info!(backend = store.backend_name(), "store connected");

    let applications = Collection::applications();
    for record in seed_applications() {
        if store.find_by_id(&applications, record.identity()).await?.is_some() {
            tracing::info!(app_id = record.identity(), "descriptor already present");
            continue;
        }
        let created = store.create(record).await?;
        tracing::info!(app_id = created.identity(), "descriptor seeded");
    }

    let Some(criteria) = json!({ "categories": ["analytics"] }).as_object().cloned() else {
        unreachable!("criteria literal is an object");
    };
    let query = compile(APPLICATION_SEARCH, &criteria)?;
    let hits = store.search(&applications, &query).await?;
    tracing::info!(hits = hits.len(), "catalog search for analytics applications");
    for hit in &hits {
        tracing::info!(app_id = hit.identity(), "search hit");
    }

    store.disconnect().await?;
    Ok(())
}
