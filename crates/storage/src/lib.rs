//! Storage orchestration layer for the appdir record services.
//!
//! This crate provides the [`StorageBackend`] trait and related types that sit
//! between the HTTP service layer and whatever document engine actually holds
//! the records. Service code talks to a [`Store`]; the store delegates to a
//! selected backend; backends are interchangeable behind the trait.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                           │
//! │        (application catalog API, account handlers)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                         Store                               │
//! │   (backend selection, search dedup, process-global slot)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  StorageBackend trait                       │
//! │ (create, find, update, delete, search, transaction, health) │
//! ├──────────────────┬──────────────────────────────────────────┤
//! │  MemoryBackend   │          future engine adapters          │
//! │ (testing, demos) │          (document databases)            │
//! └──────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use appdir_storage::{Collection, Record, StorageConfig, Store};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Select a backend and bring it up
//!     let config = StorageConfig::builder().backend("memory").build()?;
//!     let store = Store::from_config(&config)?;
//!     store.connect().await?;
//!
//!     // Store an application descriptor
//!     let apps = Collection::applications();
//!     let mut record = Record::with_identity(apps.clone(), "fdc3-workbench", Default::default())?;
//!     record.set("title", json!("FDC3 Workbench"))?;
//!     store.create(record).await?;
//!
//!     // Retrieve it
//!     let found = store.find_by_id(&apps, "fdc3-workbench").await?;
//!     assert!(found.is_some());
//!
//!     // Use transactions for all-or-nothing write units
//!     let mut txn = store.transaction().await?;
//!     txn.create(Record::with_identity(apps.clone(), "trading-view", Default::default())?)?;
//!     txn.commit().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Available Backends
//!
//! | Backend | Use Case | Persistence |
//! |---------|----------|-------------|
//! | [`MemoryBackend`] | Testing, development, demos | No |
//!
//! # Implementing a Backend
//!
//! To implement a new storage backend:
//!
//! 1. Implement the [`StorageBackend`] trait
//! 2. Implement a corresponding [`Transaction`] type (or lean on the failing
//!    default if the engine has no multi-document atomicity)
//! 3. Map engine-specific errors to [`StorageError`]
//! 4. Register a selector for it in [`Backend::from_config`]
//!
//! See the [`memory`] module source for a reference implementation, and the
//! [`conformance`] module for the suite every backend should pass.
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`], which wraps potential
//! [`StorageError`] variants. Backends map their internal errors to these
//! standardized types; callers match on variants, not on message text.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module (record fixtures, seed
//!   catalog, assertion macros) and the `conformance` module (the backend
//!   contract suite). Enable this in `[dev-dependencies]` for integration
//!   tests.

#![deny(unsafe_code)]

pub mod backend;
pub mod config;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod conformance;
pub mod error;
pub mod health;
pub mod memory;
pub mod query;
pub mod record;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod transaction;

// Re-export primary types at crate root for convenience
pub use backend::StorageBackend;
pub use config::{MEMORY_BACKEND, StorageConfig};
pub use error::{BoxError, ConfigError, StorageError, StorageResult};
pub use health::HealthReport;
pub use memory::MemoryBackend;
pub use query::{
    APPLICATION_SEARCH, FieldMatcher, Filter, Matcher, SearchField, SearchFieldKind, SearchQuery,
    SearchSchema, compile, dedupe_by_identity,
};
pub use record::{Attributes, Collection, Patch, Record};
pub use store::{Backend, Store};
pub use transaction::{Transaction, TransactionState, abort_quietly};
