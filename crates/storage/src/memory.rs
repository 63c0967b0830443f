//! In-memory storage backend implementation.
//!
//! This module provides [`MemoryBackend`], an in-memory implementation of
//! [`StorageBackend`] suitable for testing and development.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **Identity-ordered**: Each collection keeps its documents in a [`BTreeMap`]
//!   keyed by identity, so scans are deterministic
//! - **Document encoding**: Attributes are stored as JSON-encoded [`Bytes`],
//!   the same marshalling a remote backend would perform
//! - **Transaction support**: Buffered units of work with read-your-writes
//!
//! # Example
//!
//! ```
//! use appdir_storage::{Collection, MemoryBackend, Record, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MemoryBackend::new();
//!     backend.connect().await.unwrap();
//!
//!     let apps = Collection::applications();
//!     let record =
//!         Record::with_identity(apps.clone(), "fdc3-workbench", Default::default()).unwrap();
//!     backend.create(record).await.unwrap();
//!
//!     let found = backend.find_by_id(&apps, "fdc3-workbench").await.unwrap();
//!     assert!(found.is_some());
//! }
//! ```
//!
//! # Performance Characteristics
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | create | O(log n) |
//! | find_by_id | O(log n) |
//! | delete_by_id | O(log n) |
//! | find / delete_many | O(n) full scan |
//! | search | O(m * n) - one full scan per matcher |
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits
//! - No replication or distributed features
//! - Filters and search matchers are evaluated by scanning; there are no
//!   secondary indexes

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use parking_lot::RwLock;
use serde_json::Value;

use crate::{
    backend::StorageBackend,
    config::MEMORY_BACKEND,
    error::{StorageError, StorageResult},
    health::HealthReport,
    query::{Filter, Matcher, SearchQuery},
    record::{Attributes, Collection, Patch, Record},
    transaction::{Transaction, TransactionState},
};

/// Attribute stamped once, when a record is first written.
const CREATED_AT: &str = "createdAt";
/// Attribute refreshed on every write.
const UPDATED_AT: &str = "updatedAt";

/// Current wall-clock time in the catalog's millisecond ISO-8601 form.
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn stamp_created(attributes: &mut Attributes, now: &str) {
    attributes.insert(CREATED_AT.to_owned(), Value::from(now));
    attributes.insert(UPDATED_AT.to_owned(), Value::from(now));
}

fn stamp_updated(attributes: &mut Attributes, now: &str) {
    attributes.insert(UPDATED_AT.to_owned(), Value::from(now));
}

fn encode(attributes: &Attributes) -> StorageResult<Bytes> {
    let encoded = serde_json::to_vec(attributes).map_err(|err| {
        StorageError::serialization_with_source("encoding record attributes", err)
    })?;
    Ok(Bytes::from(encoded))
}

fn decode(collection: &Collection, encoded: &Bytes) -> StorageResult<Record> {
    let attributes: Attributes = serde_json::from_slice(encoded)
        .map_err(|err| StorageError::serialization_with_source("decoding stored record", err))?;
    Record::new(collection.clone(), attributes)
}

fn identity_field_mismatch(collection: &Collection, registered: &str) -> StorageError {
    StorageError::internal(format!(
        "collection {:?} is keyed by {:?}, not {:?}",
        collection.name(),
        registered,
        collection.identity_field()
    ))
}

/// One collection's documents, keyed and iterated by identity.
#[derive(Debug)]
struct CollectionStore {
    identity_field: String,
    docs: BTreeMap<String, Bytes>,
}

/// Looks a collection up without registering it; unknown collections read as
/// empty.
fn registered<'a>(
    collections: &'a HashMap<String, CollectionStore>,
    collection: &Collection,
) -> StorageResult<Option<&'a CollectionStore>> {
    let Some(store) = collections.get(collection.name()) else {
        return Ok(None);
    };
    if store.identity_field != collection.identity_field() {
        return Err(identity_field_mismatch(collection, &store.identity_field));
    }
    Ok(Some(store))
}

fn registered_mut<'a>(
    collections: &'a mut HashMap<String, CollectionStore>,
    collection: &Collection,
) -> StorageResult<Option<&'a mut CollectionStore>> {
    let Some(store) = collections.get_mut(collection.name()) else {
        return Ok(None);
    };
    if store.identity_field != collection.identity_field() {
        return Err(identity_field_mismatch(collection, &store.identity_field));
    }
    Ok(Some(store))
}

/// Looks a collection up, registering it on first write.
///
/// The identity field recorded at registration is the contract for every later
/// access; a lookup under a different identity field is a caller bug and
/// surfaces as [`StorageError::Internal`].
fn register<'a>(
    collections: &'a mut HashMap<String, CollectionStore>,
    collection: &Collection,
) -> StorageResult<&'a mut CollectionStore> {
    let store = collections.entry(collection.name().to_owned()).or_insert_with(|| {
        CollectionStore {
            identity_field: collection.identity_field().to_owned(),
            docs: BTreeMap::new(),
        }
    });
    if store.identity_field != collection.identity_field() {
        return Err(identity_field_mismatch(collection, &store.identity_field));
    }
    Ok(store)
}

/// Whether one field matcher accepts a record.
///
/// Missing attributes and attributes of the wrong shape never match; the
/// criteria side has already been cleaned by the compiler, so a mismatch here
/// reflects the record's shape, not the caller's input.
fn matcher_hits(record: &Record, field: &str, matcher: &Matcher) -> bool {
    let Some(value) = record.get(field) else {
        return false;
    };
    match matcher {
        Matcher::Contains(needle) => {
            value.as_str().is_some_and(|text| text.to_lowercase().contains(needle))
        },
        Matcher::AnyOf(needles) => value.as_array().is_some_and(|entries| {
            entries.iter().filter_map(Value::as_str).any(|entry| {
                let entry = entry.trim().to_lowercase();
                needles.iter().any(|needle| *needle == entry)
            })
        }),
    }
}

/// In-memory storage backend keyed by collection and identity.
///
/// This backend is primarily intended for testing but can also be used for
/// development or small-scale deployments where persistence is not required.
/// It honors the full backend contract, including transactions.
///
/// # Cloning
///
/// `MemoryBackend` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying data store and connection flag.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    collections: Arc<RwLock<HashMap<String, CollectionStore>>>,
    connected: Arc<AtomicBool>,
}

impl MemoryBackend {
    /// Creates a new, empty, disconnected backend.
    ///
    /// Data operations fail with [`StorageError::Unavailable`] until
    /// [`connect`](StorageBackend::connect) is called.
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    fn ensure_connected(&self) -> StorageResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }
        Err(StorageError::unavailable("memory backend is not connected"))
    }

    /// Validates and applies one transaction's buffered operations under a
    /// single write acquisition.
    ///
    /// Validation walks the buffer in issue order against an overlay of
    /// planned existence, so a create following a buffered delete of the same
    /// identity is accepted, while a create over a live or already-planned
    /// identity rejects the whole unit before any document is touched.
    fn apply_unit(&self, ops: Vec<BufferedOp>) -> StorageResult<()> {
        self.ensure_connected()?;
        let now = timestamp();
        let mut collections = self.collections.write();

        let mut planned: HashMap<String, bool> = HashMap::new();
        for op in &ops {
            let collection = op.collection();
            if let Some(store) = collections.get(collection.name()) {
                if store.identity_field != collection.identity_field() {
                    return Err(identity_field_mismatch(collection, &store.identity_field));
                }
            }
            match op {
                BufferedOp::Create(record) => {
                    let key = collection.qualified_key(record.identity());
                    let exists = planned.get(&key).copied().unwrap_or_else(|| {
                        collections
                            .get(collection.name())
                            .is_some_and(|store| store.docs.contains_key(record.identity()))
                    });
                    if exists {
                        return Err(StorageError::conflict(
                            collection.name(),
                            record.identity(),
                        ));
                    }
                    planned.insert(key, true);
                },
                BufferedOp::Update { .. } => {},
                BufferedOp::Delete { collection, id } => {
                    planned.insert(collection.qualified_key(id), false);
                },
            }
        }

        // Apply in issue order. Updates and deletes whose target vanished
        // since buffering are no-ops, matching the matched-nothing behavior
        // of the single-record write operations.
        for op in ops {
            match op {
                BufferedOp::Create(record) => {
                    let collection = record.collection().clone();
                    let store = register(&mut collections, &collection)?;
                    let id = record.identity().to_owned();
                    let mut attributes = record.into_attributes();
                    stamp_created(&mut attributes, &now);
                    store.docs.insert(id, encode(&attributes)?);
                },
                BufferedOp::Update { collection, id, patch } => {
                    let Some(store) = registered_mut(&mut collections, &collection)? else {
                        continue;
                    };
                    let Some(encoded) = store.docs.get(&id) else {
                        continue;
                    };
                    let mut attributes = decode(&collection, encoded)?.into_attributes();
                    patch.apply_to(&mut attributes);
                    stamp_updated(&mut attributes, &now);
                    store.docs.insert(id, encode(&attributes)?);
                },
                BufferedOp::Delete { collection, id } => {
                    if let Some(store) = registered_mut(&mut collections, &collection)? {
                        store.docs.remove(&id);
                    }
                },
            }
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        MEMORY_BACKEND
    }

    #[tracing::instrument(skip(self))]
    async fn connect(&self) -> StorageResult<()> {
        if !self.connected.swap(true, Ordering::SeqCst) {
            tracing::info!(backend = MEMORY_BACKEND, "storage backend connected");
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn disconnect(&self) -> StorageResult<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            tracing::info!(backend = MEMORY_BACKEND, "storage backend disconnected");
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn check_health(&self) -> StorageResult<HealthReport> {
        // Taking the read lock verifies the store is not deadlocked.
        let _unused = self.collections.read();
        let report = if self.connected.load(Ordering::SeqCst) {
            HealthReport::healthy(MEMORY_BACKEND).with_status("connected")
        } else {
            HealthReport::unhealthy(MEMORY_BACKEND).with_status("disconnected")
        };
        Ok(report)
    }

    #[tracing::instrument(
        skip(self, record),
        fields(collection = %record.collection(), id = %record.identity())
    )]
    async fn create(&self, record: Record) -> StorageResult<Record> {
        self.ensure_connected()?;
        let now = timestamp();
        let mut collections = self.collections.write();
        let store = register(&mut collections, record.collection())?;
        if store.docs.contains_key(record.identity()) {
            return Err(StorageError::conflict(record.collection().name(), record.identity()));
        }
        let collection = record.collection().clone();
        let id = record.identity().to_owned();
        let mut attributes = record.into_attributes();
        stamp_created(&mut attributes, &now);
        store.docs.insert(id, encode(&attributes)?);
        Record::new(collection, attributes)
    }

    #[tracing::instrument(skip(self, collection), fields(collection = %collection))]
    async fn find_by_id(
        &self,
        collection: &Collection,
        id: &str,
    ) -> StorageResult<Option<Record>> {
        self.ensure_connected()?;
        let collections = self.collections.read();
        let Some(store) = registered(&collections, collection)? else {
            return Ok(None);
        };
        store.docs.get(id).map(|encoded| decode(collection, encoded)).transpose()
    }

    #[tracing::instrument(skip(self, collection, patch), fields(collection = %collection))]
    async fn update_by_id(
        &self,
        collection: &Collection,
        id: &str,
        patch: Patch,
    ) -> StorageResult<Option<Record>> {
        self.ensure_connected()?;
        if patch.touches(collection.identity_field()) {
            return Err(StorageError::immutable_identity(
                collection.name(),
                collection.identity_field(),
            ));
        }
        let now = timestamp();
        let mut collections = self.collections.write();
        let Some(store) = registered_mut(&mut collections, collection)? else {
            return Ok(None);
        };
        let Some(encoded) = store.docs.get(id) else {
            return Ok(None);
        };
        let mut attributes = decode(collection, encoded)?.into_attributes();
        patch.apply_to(&mut attributes);
        stamp_updated(&mut attributes, &now);
        store.docs.insert(id.to_owned(), encode(&attributes)?);
        Record::new(collection.clone(), attributes).map(Some)
    }

    #[tracing::instrument(skip(self, collection), fields(collection = %collection))]
    async fn delete_by_id(
        &self,
        collection: &Collection,
        id: &str,
    ) -> StorageResult<Option<Record>> {
        self.ensure_connected()?;
        let mut collections = self.collections.write();
        let Some(store) = registered_mut(&mut collections, collection)? else {
            return Ok(None);
        };
        store.docs.remove(id).map(|encoded| decode(collection, &encoded)).transpose()
    }

    #[tracing::instrument(skip(self, collection, filter), fields(collection = %collection))]
    async fn find(&self, collection: &Collection, filter: &Filter) -> StorageResult<Vec<Record>> {
        self.ensure_connected()?;
        let collections = self.collections.read();
        let Some(store) = registered(&collections, collection)? else {
            return Ok(Vec::new());
        };
        let mut matches = Vec::new();
        for encoded in store.docs.values() {
            let record = decode(collection, encoded)?;
            if filter.matches(record.attributes()) {
                matches.push(record);
            }
        }
        Ok(matches)
    }

    #[tracing::instrument(skip(self, collection, filter), fields(collection = %collection))]
    async fn find_one(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> StorageResult<Option<Record>> {
        self.ensure_connected()?;
        let collections = self.collections.read();
        let Some(store) = registered(&collections, collection)? else {
            return Ok(None);
        };
        for encoded in store.docs.values() {
            let record = decode(collection, encoded)?;
            if filter.matches(record.attributes()) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    #[tracing::instrument(skip(self, collection, filter, patch), fields(collection = %collection))]
    async fn find_one_and_update(
        &self,
        collection: &Collection,
        filter: &Filter,
        patch: Patch,
    ) -> StorageResult<Option<Record>> {
        self.ensure_connected()?;
        if patch.touches(collection.identity_field()) {
            return Err(StorageError::immutable_identity(
                collection.name(),
                collection.identity_field(),
            ));
        }
        let now = timestamp();
        let mut collections = self.collections.write();
        let Some(store) = registered_mut(&mut collections, collection)? else {
            return Ok(None);
        };
        let mut target = None;
        for (id, encoded) in &store.docs {
            let record = decode(collection, encoded)?;
            if filter.matches(record.attributes()) {
                target = Some((id.clone(), record));
                break;
            }
        }
        let Some((id, record)) = target else {
            return Ok(None);
        };
        let mut attributes = record.into_attributes();
        patch.apply_to(&mut attributes);
        stamp_updated(&mut attributes, &now);
        store.docs.insert(id, encode(&attributes)?);
        Record::new(collection.clone(), attributes).map(Some)
    }

    #[tracing::instrument(skip(self, collection, filter), fields(collection = %collection))]
    async fn find_one_and_delete(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> StorageResult<Option<Record>> {
        self.ensure_connected()?;
        let mut collections = self.collections.write();
        let Some(store) = registered_mut(&mut collections, collection)? else {
            return Ok(None);
        };
        let mut target = None;
        for (id, encoded) in &store.docs {
            let record = decode(collection, encoded)?;
            if filter.matches(record.attributes()) {
                target = Some((id.clone(), record));
                break;
            }
        }
        let Some((id, record)) = target else {
            return Ok(None);
        };
        store.docs.remove(&id);
        Ok(Some(record))
    }

    #[tracing::instrument(skip(self, collection, filter), fields(collection = %collection))]
    async fn delete_many(&self, collection: &Collection, filter: &Filter) -> StorageResult<u64> {
        self.ensure_connected()?;
        let mut collections = self.collections.write();
        let Some(store) = registered_mut(&mut collections, collection)? else {
            return Ok(0);
        };
        let mut doomed = Vec::new();
        for (id, encoded) in &store.docs {
            let record = decode(collection, encoded)?;
            if filter.matches(record.attributes()) {
                doomed.push(id.clone());
            }
        }
        for id in &doomed {
            store.docs.remove(id);
        }
        Ok(doomed.len() as u64)
    }

    #[tracing::instrument(
        skip(self, collection, query),
        fields(collection = %collection, matchers = query.matchers().len())
    )]
    async fn search(
        &self,
        collection: &Collection,
        query: &SearchQuery,
    ) -> StorageResult<Vec<Record>> {
        self.ensure_connected()?;
        let collections = self.collections.read();
        let Some(store) = registered(&collections, collection)? else {
            return Ok(Vec::new());
        };
        // One pass per matcher. A record matching several fields is reported
        // once per field; the orchestration layer deduplicates.
        let mut hits = Vec::new();
        for field_matcher in query.matchers() {
            for encoded in store.docs.values() {
                let record = decode(collection, encoded)?;
                if matcher_hits(&record, field_matcher.field(), field_matcher.matcher()) {
                    hits.push(record);
                }
            }
        }
        Ok(hits)
    }

    #[tracing::instrument(skip(self))]
    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        self.ensure_connected()?;
        Ok(Box::new(MemoryTransaction::new(self.clone())))
    }
}

/// A write buffered by a [`MemoryTransaction`] for atomic commit.
#[derive(Debug, Clone)]
enum BufferedOp {
    Create(Record),
    Update { collection: Collection, id: String, patch: Patch },
    Delete { collection: Collection, id: String },
}

impl BufferedOp {
    fn collection(&self) -> &Collection {
        match self {
            Self::Create(record) => record.collection(),
            Self::Update { collection, .. } | Self::Delete { collection, .. } => collection,
        }
    }
}

/// In-memory transaction implementation.
///
/// Buffers writes until commit, providing read-your-writes semantics within
/// the unit of work. Nothing reaches the shared store until commit applies
/// the whole buffer under one write acquisition.
struct MemoryTransaction {
    backend: MemoryBackend,
    ops: Vec<BufferedOp>,
    state: TransactionState,
}

impl MemoryTransaction {
    fn new(backend: MemoryBackend) -> Self {
        Self { backend, ops: Vec::new(), state: TransactionState::Active }
    }

    fn ensure_active(&self, operation: &str) -> StorageResult<()> {
        if self.state.is_terminal() {
            return Err(StorageError::invalid_transaction(operation, self.state));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("state", &self.state)
            .field("buffered_ops", &self.ops.len())
            .finish()
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn state(&self) -> TransactionState {
        self.state
    }

    async fn find_by_id(
        &self,
        collection: &Collection,
        id: &str,
    ) -> StorageResult<Option<Record>> {
        self.ensure_active("read from")?;
        // Fold the buffer, in issue order, over the live document.
        let mut current = self.backend.find_by_id(collection, id).await?;
        for op in &self.ops {
            match op {
                BufferedOp::Create(record)
                    if record.collection() == collection && record.identity() == id =>
                {
                    current = Some(record.clone());
                },
                BufferedOp::Update { collection: target, id: target_id, patch }
                    if target == collection && target_id == id =>
                {
                    if let Some(record) = current.take() {
                        let mut attributes = record.into_attributes();
                        patch.apply_to(&mut attributes);
                        current = Some(Record::new(collection.clone(), attributes)?);
                    }
                },
                BufferedOp::Delete { collection: target, id: target_id }
                    if target == collection && target_id == id =>
                {
                    current = None;
                },
                _ => {},
            }
        }
        Ok(current)
    }

    fn create(&mut self, record: Record) -> StorageResult<()> {
        self.ensure_active("buffer a create in")?;
        self.ops.push(BufferedOp::Create(record));
        Ok(())
    }

    fn update_by_id(
        &mut self,
        collection: &Collection,
        id: &str,
        patch: Patch,
    ) -> StorageResult<()> {
        self.ensure_active("buffer an update in")?;
        if patch.touches(collection.identity_field()) {
            return Err(StorageError::immutable_identity(
                collection.name(),
                collection.identity_field(),
            ));
        }
        self.ops.push(BufferedOp::Update {
            collection: collection.clone(),
            id: id.to_owned(),
            patch,
        });
        Ok(())
    }

    fn delete_by_id(&mut self, collection: &Collection, id: &str) -> StorageResult<()> {
        self.ensure_active("buffer a delete in")?;
        self.ops.push(BufferedOp::Delete { collection: collection.clone(), id: id.to_owned() });
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(buffered_ops = self.ops.len()))]
    async fn commit(&mut self) -> StorageResult<()> {
        self.ensure_active("commit")?;
        let ops = std::mem::take(&mut self.ops);
        match self.backend.apply_unit(ops) {
            Ok(()) => {
                self.state = TransactionState::Committed;
                Ok(())
            },
            Err(err) => {
                // A rejected unit is not retryable through this handle; the
                // buffer is gone and the handle resolves aborted.
                self.state = TransactionState::Aborted;
                Err(err)
            },
        }
    }

    #[tracing::instrument(skip(self), fields(buffered_ops = self.ops.len()))]
    async fn abort(&mut self) -> StorageResult<()> {
        self.ensure_active("abort")?;
        self.ops.clear();
        self.state = TransactionState::Aborted;
        Ok(())
    }
}
