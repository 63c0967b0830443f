//! Storage backend trait definition.
//!
//! This module defines the [`StorageBackend`] trait, the capability contract
//! every persistence backend must satisfy. The contract is deliberately a
//! single, explicit interface: it lists every operation the
//! [`Store`](crate::store::Store) delegates, so an adapter either implements
//! the whole surface or fails fast with
//! [`Unimplemented`](crate::StorageError::Unimplemented) - it can never
//! silently no-op a call the orchestration layer depends on.
//!
//! # Design Philosophy
//!
//! The contract is document-oriented, not key-value:
//! - **Records, not bytes**: operations exchange [`Record`]s (JSON attribute maps tagged with
//!   their [`Collection`]); marshalling to the engine's native representation is the adapter's
//!   job.
//! - **Async by default**: every operation is async; suspension happens only at the engine I/O
//!   boundary.
//! - **Missing is not an error**: lookups return `Ok(None)` for absent records.
//! - **Transactional**: multi-operation units of work run through a buffered [`Transaction`]
//!   handle.
//!
//! Field-level schema validation lives above this layer; route handling and
//! auth live above that. Backends see only shaped records.
//!
//! # Implementing a Backend
//!
//! To implement a new storage backend:
//!
//! 1. Implement the [`StorageBackend`] trait
//! 2. Implement a corresponding [`Transaction`] type (or inherit the failing default if the
//!    engine has no atomic multi-operation support)
//! 3. Map engine-specific errors to [`StorageError`](crate::StorageError)
//!
//! See [`MemoryBackend`](crate::MemoryBackend) for a reference implementation.

use async_trait::async_trait;

use crate::{
    error::{StorageError, StorageResult},
    health::HealthReport,
    query::{Filter, SearchQuery},
    record::{Collection, Patch, Record},
    transaction::Transaction,
};

/// Abstract storage backend for record operations.
///
/// This trait defines the interface that all storage backends must implement.
/// Backends are expected to be thread-safe (`Send + Sync`) and to tolerate
/// concurrent operations without external locking.
///
/// # Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`connect`](StorageBackend::connect) | Establish the engine connection (idempotent) |
/// | [`disconnect`](StorageBackend::disconnect) | Tear the connection down (idempotent) |
/// | [`check_health`](StorageBackend::check_health) | Report liveness without failing |
/// | [`create`](StorageBackend::create) | Insert a new record |
/// | [`find_by_id`](StorageBackend::find_by_id) | Look a record up by identity |
/// | [`update_by_id`](StorageBackend::update_by_id) | Patch a record by identity |
/// | [`delete_by_id`](StorageBackend::delete_by_id) | Remove a record by identity |
/// | [`find`](StorageBackend::find) | All records matching a filter map |
/// | [`find_one`](StorageBackend::find_one) | First record matching a filter map |
/// | [`find_one_and_update`](StorageBackend::find_one_and_update) | Patch the first match |
/// | [`find_one_and_delete`](StorageBackend::find_one_and_delete) | Remove the first match |
/// | [`delete_many`](StorageBackend::delete_many) | Remove every match, returning the count |
/// | [`search`](StorageBackend::search) | Execute a compiled disjunctive search |
/// | [`transaction`](StorageBackend::transaction) | Begin a buffered unit of work |
///
/// # Example
///
/// ```
/// use appdir_storage::{Collection, MemoryBackend, Record, StorageBackend};
/// use serde_json::json;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
/// backend.connect().await.unwrap();
///
/// let apps = Collection::applications();
/// let mut attributes = serde_json::Map::new();
/// attributes.insert("title".to_owned(), json!("FDC3 Workbench"));
/// let record = Record::with_identity(apps.clone(), "fdc3-workbench", attributes).unwrap();
///
/// backend.create(record).await.unwrap();
/// let found = backend.find_by_id(&apps, "fdc3-workbench").await.unwrap();
/// assert_eq!(found.unwrap().get("title"), Some(&json!("FDC3 Workbench")));
/// # });
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// The backend's registered name (e.g. `"memory"`), used in health
    /// reports and log fields.
    fn name(&self) -> &'static str;

    /// Establishes the connection to the underlying engine.
    ///
    /// Idempotent: connecting an already-connected backend succeeds without
    /// side effects. Data operations issued before `connect` fail with
    /// [`Unavailable`](StorageError::Unavailable).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn connect(&self) -> StorageResult<()>;

    /// Tears the engine connection down.
    ///
    /// Idempotent: disconnecting a never-connected backend is a no-op.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn disconnect(&self) -> StorageResult<()>;

    /// Reports whether the backend can serve traffic.
    ///
    /// A merely-disconnected backend is reported as unhealthy in the
    /// [`HealthReport`], not as an `Err` - only an unrecoverable internal
    /// fault fails the check itself.
    #[must_use = "health check results indicate backend availability and must be inspected"]
    async fn check_health(&self) -> StorageResult<HealthReport>;

    /// Inserts a new record into its collection.
    ///
    /// The target collection is the record's tag; its identity must not
    /// already exist. Returns the stored record (the adapter may add
    /// attributes of its own, such as write timestamps).
    ///
    /// # Errors
    ///
    /// - [`Conflict`](StorageError::Conflict) - the identity already exists
    /// - [`Unavailable`](StorageError::Unavailable) - the backend is not connected
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn create(&self, record: Record) -> StorageResult<Record>;

    /// Looks a record up by its identity.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))` if the identity exists
    /// - `Ok(None)` if it doesn't - a missing record is never an error here
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn find_by_id(&self, collection: &Collection, id: &str)
        -> StorageResult<Option<Record>>;

    /// Applies a patch to the record with the given identity.
    ///
    /// Returns the updated record (post-image), or `Ok(None)` if the identity
    /// does not exist.
    ///
    /// # Errors
    ///
    /// - [`ImmutableIdentity`](StorageError::ImmutableIdentity) - the patch names the
    ///   collection's identity field
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn update_by_id(
        &self,
        collection: &Collection,
        id: &str,
        patch: Patch,
    ) -> StorageResult<Option<Record>>;

    /// Removes the record with the given identity.
    ///
    /// Returns the removed record, or `Ok(None)` if the identity does not
    /// exist.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete_by_id(
        &self,
        collection: &Collection,
        id: &str,
    ) -> StorageResult<Option<Record>>;

    /// Returns every record matching the filter map.
    ///
    /// Filter maps are conjunctive exact matches; an empty filter matches the
    /// whole collection. Results are in identity order.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn find(&self, collection: &Collection, filter: &Filter) -> StorageResult<Vec<Record>>;

    /// Returns the first record matching the filter map, in identity order.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn find_one(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> StorageResult<Option<Record>>;

    /// Applies a patch to the first record matching the filter map.
    ///
    /// Returns the updated record (post-image), or `Ok(None)` if nothing
    /// matched. Same identity-field restriction as
    /// [`update_by_id`](StorageBackend::update_by_id).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn find_one_and_update(
        &self,
        collection: &Collection,
        filter: &Filter,
        patch: Patch,
    ) -> StorageResult<Option<Record>>;

    /// Removes the first record matching the filter map and returns it.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn find_one_and_delete(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> StorageResult<Option<Record>>;

    /// Removes every record matching the filter map.
    ///
    /// Returns the number of records removed. An empty filter clears the
    /// collection.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete_many(&self, collection: &Collection, filter: &Filter) -> StorageResult<u64>;

    /// Executes a compiled search query.
    ///
    /// The query's matchers are evaluated as a disjunction, one pass per
    /// matcher: a record matching several fields appears once per matching
    /// field in the result. Callers deduplicate by identity -
    /// [`Store::search`](crate::store::Store::search) does this, or use
    /// [`dedupe_by_identity`](crate::query::dedupe_by_identity) directly.
    ///
    /// # Errors
    ///
    /// - [`InvalidSearchCriteria`](StorageError::InvalidSearchCriteria) - the query carries zero
    ///   matchers; queries built by [`compile`](crate::query::compile) never do, but adapters
    ///   translating foreign query shapes may reject here
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn search(
        &self,
        collection: &Collection,
        query: &SearchQuery,
    ) -> StorageResult<Vec<Record>>;

    /// Begins a new unit of work.
    ///
    /// Returns a [`Transaction`] handle that buffers operations and applies
    /// them atomically at [`commit`](Transaction::commit). Each caller gets
    /// its own handle; handles never share state through the backend.
    ///
    /// The default implementation fails with
    /// [`Unimplemented`](StorageError::Unimplemented): an engine without
    /// atomic multi-operation support must fail fast here rather than hand
    /// out a handle whose commit guarantees it cannot honor.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        Err(StorageError::unimplemented("transaction"))
    }
}
