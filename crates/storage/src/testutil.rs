//! Shared test utilities for storage backend testing.
//!
//! This module provides record factories, a pre-seeded backend, and assertion
//! macros for [`StorageResult`] values. It is feature-gated behind `testutil`
//! to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! appdir-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use appdir_storage::testutil::{application, seeded_backend};
//! ```

use serde_json::{Value, json};

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    memory::MemoryBackend,
    record::{Attributes, Collection, Record},
};

fn object(value: Value) -> Attributes {
    let Value::Object(map) = value else {
        unreachable!("fixture values are JSON objects");
    };
    map
}

/// The three well-known directory applications, as full descriptors.
///
/// These match the catalog's stock seed set: `fdc3-workbench`,
/// `trading-view`, and `market-data`, each with icons, screenshots, and
/// contact metadata.
#[must_use]
pub fn seed_applications() -> Vec<Record> {
    let descriptors = [
        json!({
            "appId": "fdc3-workbench",
            "title": "FDC3 Workbench",
            "description": "A development and testing tool for FDC3 applications",
            "version": "1.0.0",
            "categories": ["DEVELOPER_TOOLS", "TESTING"],
            "icons": [
                {
                    "src": "https://fdc3.finos.org/toolbox/fdc3-workbench/icon-32x32.png",
                    "size": "32x32"
                },
                {
                    "src": "https://fdc3.finos.org/toolbox/fdc3-workbench/icon-64x64.png",
                    "size": "64x64"
                }
            ],
            "screenshots": [
                {
                    "src": "https://fdc3.finos.org/toolbox/fdc3-workbench/screenshot1.png",
                    "label": "Main Interface"
                }
            ],
            "contactEmail": "fdc3-maintainers@finos.org",
            "supportEmail": "fdc3-support@finos.org",
            "publisher": "FINOS",
            "moreInfo": "https://fdc3.finos.org/toolbox/fdc3-workbench",
            "details": { "url": "https://fdc3.finos.org/toolbox/fdc3-workbench/app" }
        }),
        json!({
            "appId": "trading-view",
            "title": "Trading View",
            "description": "Advanced financial visualization and trading platform",
            "version": "2.1.0",
            "categories": ["TRADING", "ANALYTICS"],
            "icons": [
                { "src": "https://example.com/trading-view/icon-32x32.png", "size": "32x32" }
            ],
            "screenshots": [
                {
                    "src": "https://example.com/trading-view/screenshot1.png",
                    "label": "Trading Dashboard"
                }
            ],
            "contactEmail": "contact@tradingview.com",
            "supportEmail": "support@tradingview.com",
            "publisher": "Trading View Inc",
            "moreInfo": "https://www.tradingview.com/about",
            "details": { "url": "https://www.tradingview.com" }
        }),
        json!({
            "appId": "market-data",
            "title": "Market Data Terminal",
            "description": "Real-time market data and analytics platform",
            "version": "1.5.0",
            "categories": ["MARKET_DATA", "ANALYTICS"],
            "icons": [
                { "src": "https://example.com/market-data/icon-32x32.png", "size": "32x32" }
            ],
            "screenshots": [
                {
                    "src": "https://example.com/market-data/screenshot1.png",
                    "label": "Market Overview"
                }
            ],
            "contactEmail": "contact@marketdata.com",
            "supportEmail": "support@marketdata.com",
            "publisher": "Market Data Solutions",
            "moreInfo": "https://www.marketdata.com/info",
            "details": { "url": "https://www.marketdata.com" }
        }),
    ];
    descriptors
        .into_iter()
        .map(|descriptor| {
            Record::new(Collection::applications(), object(descriptor))
                .expect("seed descriptors are valid")
        })
        .collect()
}

/// A minimal application record with just an identity and a title.
///
/// # Panics
///
/// Panics if `id` is empty.
#[must_use]
pub fn application(id: &str, title: &str) -> Record {
    Record::new(Collection::applications(), object(json!({ "appId": id, "title": title })))
        .expect("application fixture must carry a valid identity")
}

/// A minimal user record keyed by email.
///
/// # Panics
///
/// Panics if `email` is empty.
#[must_use]
pub fn user(email: &str, name: &str) -> Record {
    Record::new(
        Collection::users(),
        object(json!({ "email": email, "name": name, "age": 30 })),
    )
    .expect("user fixture must carry a valid identity")
}

/// A connected [`MemoryBackend`] pre-seeded with [`seed_applications`].
///
/// # Panics
///
/// Panics if connecting or seeding fails, which cannot happen on a fresh
/// backend.
pub async fn seeded_backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.connect().await.expect("connect memory backend");
    for record in seed_applications() {
        backend.create(record).await.expect("seed create failed");
    }
    backend
}

/// Assert that a [`StorageResult`] is `Ok`.
///
/// Returns the inner value on success, panics with a descriptive message
/// on failure.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use appdir_storage::{StorageResult, assert_storage_ok};
///
/// let result: StorageResult<i32> = Ok(42);
/// let value = assert_storage_ok!(result);
/// assert_eq!(value, 42);
/// ```
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}

/// Assert that a [`StorageResult`] is a [`StorageError::Conflict`].
#[macro_export]
macro_rules! assert_conflict {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Conflict { .. })),
            "expected StorageError::Conflict, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Conflict { .. })),
            "{}: expected StorageError::Conflict, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is a [`StorageError::InvalidSearchCriteria`].
#[macro_export]
macro_rules! assert_invalid_search {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::InvalidSearchCriteria { .. })),
            "expected StorageError::InvalidSearchCriteria, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::InvalidSearchCriteria { .. })),
            "{}: expected StorageError::InvalidSearchCriteria, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is a [`StorageError::InvalidTransaction`].
#[macro_export]
macro_rules! assert_invalid_transaction {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::InvalidTransaction { .. })),
            "expected StorageError::InvalidTransaction, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::InvalidTransaction { .. })),
            "{}: expected StorageError::InvalidTransaction, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Helper to verify that a result is a `Conflict` error.
///
/// This is a convenience for tests that need to match on error variants
/// without importing the error type directly.
pub fn is_conflict<T>(result: &StorageResult<T>) -> bool {
    matches!(result, Err(StorageError::Conflict { .. }))
}

/// Helper to verify that a result is an `InvalidTransaction` error.
pub fn is_invalid_transaction<T>(result: &StorageResult<T>) -> bool {
    matches!(result, Err(StorageError::InvalidTransaction { .. }))
}

/// Helper to verify that a result is an `Unavailable` error.
pub fn is_unavailable<T>(result: &StorageResult<T>) -> bool {
    matches!(result, Err(StorageError::Unavailable { .. }))
}
