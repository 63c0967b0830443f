//! The storage orchestrator: backend selection, delegation, and the
//! process-global instance.
//!
//! A [`Store`] owns exactly one [`Backend`] and forwards every contract
//! operation to it. Two construction paths exist:
//!
//! - [`Store::from_config`] builds a private instance, for tests and embedded
//!   use.
//! - [`Store::init_global`] builds, connects, and installs the one
//!   process-wide instance at startup; [`Store::global`] looks it up
//!   thereafter. Initialization failures surface before any request is
//!   served, and installing twice is an error.
//!
//! # Example
//!
//! ```
//! use appdir_storage::{Collection, Record, StorageConfig, Store};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let config = StorageConfig::builder().backend("memory").build().unwrap();
//! let store = Store::from_config(&config).unwrap();
//! store.connect().await.unwrap();
//!
//! let apps = Collection::applications();
//! let record =
//!     Record::with_identity(apps.clone(), "fdc3-workbench", Default::default()).unwrap();
//! store.create(record).await.unwrap();
//! assert!(store.find_by_id(&apps, "fdc3-workbench").await.unwrap().is_some());
//! # });
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::OnceCell;

use crate::{
    backend::StorageBackend,
    config::{StorageConfig, MEMORY_BACKEND},
    error::{StorageError, StorageResult},
    health::HealthReport,
    memory::MemoryBackend,
    query::{Filter, SearchQuery, dedupe_by_identity},
    record::{Collection, Patch, Record},
    transaction::Transaction,
};

/// The one process-wide orchestrator, installed by [`Store::init_global`].
static GLOBAL: OnceCell<Arc<Store>> = OnceCell::new();

/// The set of backends this build can construct, selected by the
/// configuration's `backend` string.
///
/// Every variant implements the full [`StorageBackend`] contract; the enum
/// itself does too, by delegation, so a [`Store`] is generic over engines
/// without dynamic dispatch.
#[derive(Debug)]
pub enum Backend {
    /// The in-process document engine ([`MemoryBackend`]).
    Memory(MemoryBackend),
}

impl Backend {
    /// Constructs the backend named by the configuration's selector.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnsupportedBackend`] for a selector this build
    /// does not know. This is a configuration error and fatal to startup.
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        match config.backend() {
            MEMORY_BACKEND => Ok(Self::Memory(MemoryBackend::new())),
            other => Err(StorageError::unsupported_backend(other)),
        }
    }
}

#[async_trait]
impl StorageBackend for Backend {
    fn name(&self) -> &'static str {
        match self {
            Self::Memory(backend) => backend.name(),
        }
    }

    async fn connect(&self) -> StorageResult<()> {
        match self {
            Self::Memory(backend) => backend.connect().await,
        }
    }

    async fn disconnect(&self) -> StorageResult<()> {
        match self {
            Self::Memory(backend) => backend.disconnect().await,
        }
    }

    async fn check_health(&self) -> StorageResult<HealthReport> {
        match self {
            Self::Memory(backend) => backend.check_health().await,
        }
    }

    async fn create(&self, record: Record) -> StorageResult<Record> {
        match self {
            Self::Memory(backend) => backend.create(record).await,
        }
    }

    async fn find_by_id(
        &self,
        collection: &Collection,
        id: &str,
    ) -> StorageResult<Option<Record>> {
        match self {
            Self::Memory(backend) => backend.find_by_id(collection, id).await,
        }
    }

    async fn update_by_id(
        &self,
        collection: &Collection,
        id: &str,
        patch: Patch,
    ) -> StorageResult<Option<Record>> {
        match self {
            Self::Memory(backend) => backend.update_by_id(collection, id, patch).await,
        }
    }

    async fn delete_by_id(
        &self,
        collection: &Collection,
        id: &str,
    ) -> StorageResult<Option<Record>> {
        match self {
            Self::Memory(backend) => backend.delete_by_id(collection, id).await,
        }
    }

    async fn find(&self, collection: &Collection, filter: &Filter) -> StorageResult<Vec<Record>> {
        match self {
            Self::Memory(backend) => backend.find(collection, filter).await,
        }
    }

    async fn find_one(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> StorageResult<Option<Record>> {
        match self {
            Self::Memory(backend) => backend.find_one(collection, filter).await,
        }
    }

    async fn find_one_and_update(
        &self,
        collection: &Collection,
        filter: &Filter,
        patch: Patch,
    ) -> StorageResult<Option<Record>> {
        match self {
            Self::Memory(backend) => {
                backend.find_one_and_update(collection, filter, patch).await
            },
        }
    }

    async fn find_one_and_delete(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> StorageResult<Option<Record>> {
        match self {
            Self::Memory(backend) => backend.find_one_and_delete(collection, filter).await,
        }
    }

    async fn delete_many(&self, collection: &Collection, filter: &Filter) -> StorageResult<u64> {
        match self {
            Self::Memory(backend) => backend.delete_many(collection, filter).await,
        }
    }

    async fn search(
        &self,
        collection: &Collection,
        query: &SearchQuery,
    ) -> StorageResult<Vec<Record>> {
        match self {
            Self::Memory(backend) => backend.search(collection, query).await,
        }
    }

    // The enum must forward explicitly; the trait's failing default would
    // otherwise shadow an engine that does support transactions.
    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        match self {
            Self::Memory(backend) => backend.transaction().await,
        }
    }
}

/// Process-wide coordinator owning one backend instance.
#[derive(Debug)]
pub struct Store {
    backend: Backend,
}

impl Store {
    /// Wraps an already-constructed backend.
    #[must_use]
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Selects and constructs the backend named by the configuration.
    ///
    /// The instance is not yet connected; callers run
    /// [`connect`](Self::connect) themselves (or use
    /// [`init_global`](Self::init_global), which does both).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnsupportedBackend`] for an unknown selector.
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        let backend = Backend::from_config(config)?;
        tracing::debug!(backend = backend.name(), "storage backend selected");
        Ok(Self::new(backend))
    }

    /// Constructs, connects, and installs the process-wide instance.
    ///
    /// Call once during startup, before serving requests; any failure here
    /// means the process must not begin serving.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnsupportedBackend`] for an unknown selector,
    /// [`StorageError::Unavailable`] if the backend fails to connect, and
    /// [`StorageError::Internal`] if an instance is already installed.
    pub async fn init_global(config: &StorageConfig) -> StorageResult<Arc<Self>> {
        let store = Arc::new(Self::from_config(config)?);
        store.connect().await?;
        GLOBAL
            .set(Arc::clone(&store))
            .map_err(|_| StorageError::internal("global store is already initialized"))?;
        tracing::info!(backend = store.backend_name(), "global store initialized");
        Ok(store)
    }

    /// Looks up the instance installed by [`init_global`](Self::init_global).
    ///
    /// Every call returns the same instance.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if [`init_global`](Self::init_global)
    /// has not run.
    pub fn global() -> StorageResult<Arc<Self>> {
        GLOBAL
            .get()
            .cloned()
            .ok_or_else(|| StorageError::internal("global store is not initialized"))
    }

    /// The name of the selected backend.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Connects the backend.
    pub async fn connect(&self) -> StorageResult<()> {
        self.backend.connect().await
    }

    /// Disconnects the backend.
    pub async fn disconnect(&self) -> StorageResult<()> {
        self.backend.disconnect().await
    }

    /// Reports the backend's health.
    pub async fn check_health(&self) -> StorageResult<HealthReport> {
        self.backend.check_health().await
    }

    /// Persists a new record.
    pub async fn create(&self, record: Record) -> StorageResult<Record> {
        self.backend.create(record).await
    }

    /// Looks a record up by identity.
    pub async fn find_by_id(
        &self,
        collection: &Collection,
        id: &str,
    ) -> StorageResult<Option<Record>> {
        self.backend.find_by_id(collection, id).await
    }

    /// Patches a record by identity, returning the post-image.
    pub async fn update_by_id(
        &self,
        collection: &Collection,
        id: &str,
        patch: Patch,
    ) -> StorageResult<Option<Record>> {
        self.backend.update_by_id(collection, id, patch).await
    }

    /// Deletes a record by identity, returning the removed record.
    pub async fn delete_by_id(
        &self,
        collection: &Collection,
        id: &str,
    ) -> StorageResult<Option<Record>> {
        self.backend.delete_by_id(collection, id).await
    }

    /// Lists the records matching a filter, in identity order.
    pub async fn find(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> StorageResult<Vec<Record>> {
        self.backend.find(collection, filter).await
    }

    /// Returns the first record matching a filter.
    pub async fn find_one(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> StorageResult<Option<Record>> {
        self.backend.find_one(collection, filter).await
    }

    /// Patches the first record matching a filter, returning the post-image.
    pub async fn find_one_and_update(
        &self,
        collection: &Collection,
        filter: &Filter,
        patch: Patch,
    ) -> StorageResult<Option<Record>> {
        self.backend.find_one_and_update(collection, filter, patch).await
    }

    /// Deletes the first record matching a filter, returning the removed
    /// record.
    pub async fn find_one_and_delete(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> StorageResult<Option<Record>> {
        self.backend.find_one_and_delete(collection, filter).await
    }

    /// Deletes every record matching a filter, returning the removed count.
    pub async fn delete_many(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> StorageResult<u64> {
        self.backend.delete_many(collection, filter).await
    }

    /// Executes a compiled search and deduplicates the hits by identity.
    ///
    /// The backend reports one hit per matching field; this is where the
    /// duplicates collapse, keeping each identity's first position and last
    /// value.
    pub async fn search(
        &self,
        collection: &Collection,
        query: &SearchQuery,
    ) -> StorageResult<Vec<Record>> {
        let hits = self.backend.search(collection, query).await?;
        Ok(dedupe_by_identity(hits))
    }

    /// Starts a unit of work, returning its handle.
    ///
    /// The handle carries the session state; concurrent callers each hold an
    /// independent handle. See [`Transaction`] for the buffering and commit
    /// semantics.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unimplemented`] if the selected backend has no
    /// transaction support.
    pub async fn transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        self.backend.transaction().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        query::{APPLICATION_SEARCH, compile},
        record::Attributes,
    };

    fn memory_config() -> StorageConfig {
        StorageConfig::builder().backend("memory").build().unwrap()
    }

    fn attrs(value: serde_json::Value) -> Attributes {
        let serde_json::Value::Object(map) = value else {
            unreachable!("test attributes must be JSON objects");
        };
        map
    }

    async fn connected_store() -> Store {
        let store = Store::from_config(&memory_config()).unwrap();
        store.connect().await.unwrap();
        store
    }

    #[test]
    fn from_config_selects_memory() {
        let store = Store::from_config(&memory_config()).unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn from_config_rejects_unknown_selector() {
        let config = StorageConfig::builder().backend("oracle").build().unwrap();
        let err = Store::from_config(&config).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported backend: \"oracle\"");
    }

    #[tokio::test]
    async fn store_round_trips_records() {
        let store = connected_store().await;
        let apps = Collection::applications();

        let record = Record::new(
            apps.clone(),
            attrs(json!({ "appId": "fdc3-workbench", "title": "FDC3 Workbench" })),
        )
        .unwrap();
        store.create(record).await.unwrap();

        let found = store.find_by_id(&apps, "fdc3-workbench").await.unwrap().unwrap();
        assert_eq!(found.get("title"), Some(&json!("FDC3 Workbench")));

        let patch = Patch::new().set("title", "Renamed");
        let updated = store.update_by_id(&apps, "fdc3-workbench", patch).await.unwrap().unwrap();
        assert_eq!(updated.get("title"), Some(&json!("Renamed")));

        let deleted = store.delete_by_id(&apps, "fdc3-workbench").await.unwrap().unwrap();
        assert_eq!(deleted.identity(), "fdc3-workbench");
        assert!(store.find_by_id(&apps, "fdc3-workbench").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_search_deduplicates_multi_field_hits() {
        let store = connected_store().await;
        let apps = Collection::applications();

        let record = Record::new(
            apps.clone(),
            attrs(json!({
                "appId": "fdc3-workbench",
                "title": "FDC3 Workbench",
                "categories": ["DEVELOPER_TOOLS", "TESTING"],
            })),
        )
        .unwrap();
        store.create(record).await.unwrap();

        let criteria = attrs(json!({ "title": "workbench", "categories": ["testing"] }));
        let query = compile(APPLICATION_SEARCH, &criteria).unwrap();

        // Both matchers hit the same record; the store reports it once.
        let results = store.search(&apps, &query).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].identity(), "fdc3-workbench");
    }

    #[tokio::test]
    async fn store_transaction_delegates_to_backend() {
        let store = connected_store().await;
        let apps = Collection::applications();

        let mut txn = store.transaction().await.unwrap();
        let record = Record::new(
            apps.clone(),
            attrs(json!({ "appId": "trading-view", "title": "Trading View" })),
        )
        .unwrap();
        txn.create(record).unwrap();
        txn.commit().await.unwrap();

        assert!(store.find_by_id(&apps, "trading-view").await.unwrap().is_some());
    }
}
