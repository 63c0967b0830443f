//! The record model: collections, records, and patches.
//!
//! A [`Record`] is a JSON attribute map tagged with the [`Collection`] it
//! belongs to. Each collection names its identity field (`appId` for
//! applications, `email` for users), and the identity value lives inside the
//! attribute map like any other field - there is no storage-internal id.
//! Construction and mutation enforce the two shaping invariants the storage
//! layer relies on: the identity attribute is present and non-empty, and it
//! never changes after construction.
//!
//! Field-level schema validation (formats, lengths, allowed values) happens
//! above this layer; by the time an attribute map reaches [`Record::new`] it
//! is assumed schema-valid.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StorageError, StorageResult};

/// A record's attribute map: JSON field names to JSON values.
pub type Attributes = Map<String, Value>;

/// A logical grouping of same-shaped records, together with the name of the
/// field that carries each record's identity.
///
/// Collections are lightweight descriptors, not handles: the backend adapter
/// registers the engine-side collection on first reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Collection {
    name: String,
    identity_field: String,
}

impl Collection {
    /// Creates a collection descriptor with the given name and identity field.
    #[must_use]
    pub fn new(name: impl Into<String>, identity_field: impl Into<String>) -> Self {
        Self { name: name.into(), identity_field: identity_field.into() }
    }

    /// The application-descriptor collection, keyed by `appId`.
    #[must_use]
    pub fn applications() -> Self {
        Self::new("Application", "appId")
    }

    /// The user-account collection, keyed by `email`.
    #[must_use]
    pub fn users() -> Self {
        Self::new("User", "email")
    }

    /// The collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name of the field that carries a record's identity.
    #[must_use]
    pub fn identity_field(&self) -> &str {
        &self.identity_field
    }

    /// A `collection/identity` key for error messages and log fields.
    #[must_use]
    pub fn qualified_key(&self, identity: &str) -> String {
        format!("{}/{}", self.name, identity)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A stored entity: an attribute map tagged with its collection.
///
/// The identity value is an attribute (under the collection's identity field)
/// and is immutable once the record is constructed; [`Record::set`] refuses to
/// touch it. The collection tag is fixed at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    collection: Collection,
    attributes: Attributes,
}

impl Record {
    /// Creates a record from a schema-valid attribute map.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the collection's identity
    /// field is absent, not a string, or empty after trimming.
    pub fn new(collection: Collection, attributes: Attributes) -> StorageResult<Self> {
        match attributes.get(collection.identity_field()) {
            Some(Value::String(identity)) if !identity.trim().is_empty() => {
                Ok(Self { collection, attributes })
            },
            Some(Value::String(_)) => Err(StorageError::serialization(format!(
                "identity field {:?} of collection {:?} must be a non-empty string",
                collection.identity_field(),
                collection.name(),
            ))),
            Some(_) => Err(StorageError::serialization(format!(
                "identity field {:?} of collection {:?} must be a string",
                collection.identity_field(),
                collection.name(),
            ))),
            None => Err(StorageError::serialization(format!(
                "record in collection {:?} is missing identity field {:?}",
                collection.name(),
                collection.identity_field(),
            ))),
        }
    }

    /// Creates a record by inserting `identity` into the attribute map under
    /// the collection's identity field.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the map already carries a
    /// different value for the identity field, or if `identity` is empty.
    pub fn with_identity(
        collection: Collection,
        identity: impl Into<String>,
        mut attributes: Attributes,
    ) -> StorageResult<Self> {
        let identity = identity.into();
        if let Some(existing) = attributes.get(collection.identity_field()) {
            if existing != &Value::String(identity.clone()) {
                return Err(StorageError::serialization(format!(
                    "attribute {:?} disagrees with the supplied identity {:?}",
                    collection.identity_field(),
                    identity,
                )));
            }
        }
        attributes.insert(collection.identity_field().to_owned(), Value::String(identity));
        Self::new(collection, attributes)
    }

    /// The collection this record belongs to.
    #[must_use]
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// The record's identity value.
    #[must_use]
    pub fn identity(&self) -> &str {
        // Present and a string by construction; `set` refuses the field.
        match self.attributes.get(self.collection.identity_field()) {
            Some(Value::String(identity)) => identity,
            _ => unreachable!("identity attribute is guaranteed by construction"),
        }
    }

    /// The full attribute map, identity included.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// A single attribute value, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Sets an attribute.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ImmutableIdentity`] if `field` names the
    /// collection's identity field.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> StorageResult<()> {
        let field = field.into();
        if field == self.collection.identity_field() {
            return Err(StorageError::immutable_identity(self.collection.name(), field));
        }
        self.attributes.insert(field, value.into());
        Ok(())
    }

    /// Consumes the record, returning its attribute map.
    #[must_use]
    pub fn into_attributes(self) -> Attributes {
        self.attributes
    }
}

/// A partial attribute map applied to an existing record by the update
/// operations.
///
/// Patches merge field-by-field: each named field replaces the stored value
/// wholesale (there is no deep merge). A patch may not name the identity
/// field; adapters reject one that does with [`StorageError::ImmutableIdentity`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    changes: Attributes,
}

impl Patch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an attribute map as a patch.
    #[must_use]
    pub fn from_attributes(changes: Attributes) -> Self {
        Self { changes }
    }

    /// Adds a field change, replacing any previous change to the same field.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.changes.insert(field.into(), value.into());
        self
    }

    /// True if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// True if the patch names the given field.
    #[must_use]
    pub fn touches(&self, field: &str) -> bool {
        self.changes.contains_key(field)
    }

    /// The changed fields.
    #[must_use]
    pub fn changes(&self) -> &Attributes {
        &self.changes
    }

    /// Merges this patch into an attribute map.
    pub fn apply_to(&self, attributes: &mut Attributes) {
        for (field, value) in &self.changes {
            attributes.insert(field.clone(), value.clone());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn application_attributes() -> Attributes {
        let Value::Object(map) = json!({
            "appId": "fdc3-workbench",
            "title": "FDC3 Workbench",
            "version": "1.0.0",
            "categories": ["DEVELOPER_TOOLS", "TESTING"],
        }) else {
            unreachable!("literal is an object")
        };
        map
    }

    #[test]
    fn record_requires_identity_attribute() {
        let mut attributes = application_attributes();
        attributes.remove("appId");

        let err = Record::new(Collection::applications(), attributes).unwrap_err();
        assert!(matches!(err, StorageError::Serialization { .. }), "got {err:?}");
    }

    #[test]
    fn record_rejects_blank_identity() {
        let mut attributes = application_attributes();
        attributes.insert("appId".to_owned(), json!("   "));

        let err = Record::new(Collection::applications(), attributes).unwrap_err();
        assert!(matches!(err, StorageError::Serialization { .. }), "got {err:?}");
    }

    #[test]
    fn record_rejects_non_string_identity() {
        let mut attributes = application_attributes();
        attributes.insert("appId".to_owned(), json!(42));

        let err = Record::new(Collection::applications(), attributes).unwrap_err();
        assert!(matches!(err, StorageError::Serialization { .. }), "got {err:?}");
    }

    #[test]
    fn record_exposes_identity_and_attributes() {
        let record = Record::new(Collection::applications(), application_attributes()).unwrap();

        assert_eq!(record.identity(), "fdc3-workbench");
        assert_eq!(record.collection().name(), "Application");
        assert_eq!(record.get("title"), Some(&json!("FDC3 Workbench")));
    }

    #[test]
    fn with_identity_inserts_the_identity_attribute() {
        let mut attributes = application_attributes();
        attributes.remove("appId");

        let record =
            Record::with_identity(Collection::applications(), "fdc3-workbench", attributes)
                .unwrap();
        assert_eq!(record.identity(), "fdc3-workbench");
        assert_eq!(record.get("appId"), Some(&json!("fdc3-workbench")));
    }

    #[test]
    fn with_identity_rejects_a_disagreeing_attribute() {
        let attributes = application_attributes();

        let err = Record::with_identity(Collection::applications(), "other-app", attributes)
            .unwrap_err();
        assert!(matches!(err, StorageError::Serialization { .. }), "got {err:?}");
    }

    #[test]
    fn set_refuses_the_identity_field() {
        let mut record = Record::new(Collection::applications(), application_attributes()).unwrap();

        let err = record.set("appId", "renamed").unwrap_err();
        assert!(matches!(err, StorageError::ImmutableIdentity { .. }), "got {err:?}");
        assert_eq!(record.identity(), "fdc3-workbench");

        record.set("title", "Workbench v2").unwrap();
        assert_eq!(record.get("title"), Some(&json!("Workbench v2")));
    }

    #[test]
    fn patch_applies_field_by_field() {
        let patch = Patch::new().set("title", "Renamed").set("version", "2.0.0");

        let mut attributes = application_attributes();
        patch.apply_to(&mut attributes);

        assert_eq!(attributes.get("title"), Some(&json!("Renamed")));
        assert_eq!(attributes.get("version"), Some(&json!("2.0.0")));
        // Untouched fields survive.
        assert_eq!(attributes.get("appId"), Some(&json!("fdc3-workbench")));
    }

    #[test]
    fn patch_reports_touched_fields() {
        let patch = Patch::new().set("email", "new@example.com");
        assert!(patch.touches("email"));
        assert!(!patch.touches("name"));
        assert!(!Patch::new().touches("email"));
    }
}
