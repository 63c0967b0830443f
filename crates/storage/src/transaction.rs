//! Transaction handles and their state machine.
//!
//! A [`Transaction`] is an explicit handle for one unit of work, returned by
//! [`StorageBackend::transaction`](crate::backend::StorageBackend::transaction).
//! The handle - never the backend or the store - carries the session state, so
//! concurrent callers each own an independent unit of work and nothing bleeds
//! between them.
//!
//! # State machine
//!
//! ```text
//!        transaction()           commit()
//!   (no handle) ─────→ Active ──────────→ Committed
//!                        │
//!                        │ abort() / drop
//!                        └──────────→ Aborted
//! ```
//!
//! A handle starts `Active`. `commit`/`abort` resolve it to a terminal state;
//! any further buffered operation or second resolution fails with
//! [`InvalidTransaction`](crate::StorageError::InvalidTransaction) and leaves
//! the terminal state unchanged. There is no "idle" state: a caller outside a
//! unit of work simply holds no handle.
//!
//! # Buffering
//!
//! Writes issued on an `Active` handle are buffered, not applied. `commit`
//! validates and applies the whole buffer atomically; `abort` (or dropping the
//! handle unresolved) discards it, so an aborted unit of work has no durable
//! effect - rollback is the absence of apply.

use async_trait::async_trait;

use crate::{
    error::StorageResult,
    record::{Collection, Patch, Record},
};

/// Lifecycle state of a [`Transaction`] handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Started and accepting operations.
    Active,
    /// Resolved by a successful commit.
    Committed,
    /// Resolved by abort (or rejected at commit).
    Aborted,
}

impl TransactionState {
    /// True once the handle can accept no further operations.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        };
        f.write_str(state)
    }
}

/// A buffered unit of work against a storage backend.
///
/// # Isolation
///
/// - **Read-your-writes**: [`find_by_id`](Transaction::find_by_id) sees the handle's own buffered
///   creates, updates, and deletes before consulting the backend.
/// - **Live reads**: identities this handle has not touched are read straight from the backend;
///   there is no snapshot isolation, so two reads of an untouched identity may differ if another
///   writer commits in between.
///
/// # Commit semantics
///
/// Buffered operations are validated and applied in issue order under one
/// engine write acquisition:
///
/// - A buffered create whose identity exists at commit time (including one created by a
///   concurrently committed unit) fails the whole unit with
///   [`Conflict`](crate::StorageError::Conflict); nothing is applied.
/// - A buffered update or delete whose target no longer exists is a no-op, the same
///   matched-nothing outcome the single-record write operations report as `None`.
/// - On success every buffered operation is applied; there is no partial commit.
///
/// # Example
///
/// ```
/// use appdir_storage::{Collection, MemoryBackend, Record, StorageBackend, Transaction};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
/// backend.connect().await.unwrap();
/// let users = Collection::users();
///
/// let mut txn = backend.transaction().await.unwrap();
/// let ada = Record::with_identity(users.clone(), "ada@example.com", Default::default()).unwrap();
/// txn.create(ada).unwrap();
///
/// // Read-your-writes: visible inside the handle, invisible outside.
/// assert!(txn.find_by_id(&users, "ada@example.com").await.unwrap().is_some());
/// assert!(backend.find_by_id(&users, "ada@example.com").await.unwrap().is_none());
///
/// txn.commit().await.unwrap();
/// assert!(backend.find_by_id(&users, "ada@example.com").await.unwrap().is_some());
/// # });
/// ```
#[async_trait]
pub trait Transaction: Send {
    /// The handle's current lifecycle state.
    fn state(&self) -> TransactionState;

    /// Looks an identity up through the handle, seeing buffered writes first.
    ///
    /// # Errors
    ///
    /// Fails with [`InvalidTransaction`](crate::StorageError::InvalidTransaction)
    /// on a resolved handle.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn find_by_id(&self, collection: &Collection, id: &str)
        -> StorageResult<Option<Record>>;

    /// Buffers a create for atomic commit.
    ///
    /// # Errors
    ///
    /// Fails with [`InvalidTransaction`](crate::StorageError::InvalidTransaction)
    /// on a resolved handle. Identity uniqueness is checked at commit, not
    /// here.
    fn create(&mut self, record: Record) -> StorageResult<()>;

    /// Buffers a patch of the given identity for atomic commit.
    ///
    /// # Errors
    ///
    /// Fails with [`ImmutableIdentity`](crate::StorageError::ImmutableIdentity)
    /// if the patch names the collection's identity field, and with
    /// [`InvalidTransaction`](crate::StorageError::InvalidTransaction) on a
    /// resolved handle.
    fn update_by_id(
        &mut self,
        collection: &Collection,
        id: &str,
        patch: Patch,
    ) -> StorageResult<()>;

    /// Buffers a delete of the given identity for atomic commit.
    ///
    /// # Errors
    ///
    /// Fails with [`InvalidTransaction`](crate::StorageError::InvalidTransaction)
    /// on a resolved handle.
    fn delete_by_id(&mut self, collection: &Collection, id: &str) -> StorageResult<()>;

    /// Applies the buffered operations atomically and resolves the handle.
    ///
    /// Valid only while `Active`; a second commit fails with
    /// [`InvalidTransaction`](crate::StorageError::InvalidTransaction). If any
    /// buffered create conflicts at commit time the unit is rejected as a
    /// whole, the handle resolves to `Aborted`, and nothing is applied.
    #[must_use = "commit may be rejected and errors must be handled"]
    async fn commit(&mut self) -> StorageResult<()>;

    /// Discards the buffered operations and resolves the handle.
    ///
    /// Valid only while `Active`; aborting a resolved handle fails with
    /// [`InvalidTransaction`](crate::StorageError::InvalidTransaction) and the
    /// terminal state is unchanged.
    #[must_use = "abort may fail and errors must be handled"]
    async fn abort(&mut self) -> StorageResult<()>;
}

/// Aborts a transaction on an error path without masking the original error.
///
/// Abort must be attempted even when the unit of work is already in an
/// error-adjacent state, but its own failure is only ever logged - returning
/// it would shadow the error that triggered the abort in the first place.
///
/// ```
/// use appdir_storage::{
///     Collection, MemoryBackend, Record, StorageBackend, Transaction, abort_quietly,
/// };
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
/// backend.connect().await.unwrap();
///
/// let mut txn = backend.transaction().await.unwrap();
/// let record = Record::with_identity(Collection::users(), "ada@example.com", Default::default())
///     .unwrap();
/// if txn.create(record).is_err() {
///     abort_quietly(txn.as_mut()).await;
/// }
/// # txn.abort().await.unwrap();
/// # });
/// ```
pub async fn abort_quietly(txn: &mut dyn Transaction) {
    if let Err(error) = txn.abort().await {
        tracing::warn!(%error, "transaction abort failed; preserving the original error");
    }
}
