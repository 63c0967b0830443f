//! Filters and the search-criteria compiler.
//!
//! Two query surfaces coexist here:
//!
//! - [`Filter`] is the internal exact-match surface used by the CRUD
//!   operations (`find`, `find_one`, `delete_many`, ...). Every clause must
//!   hold for a record to match; an empty filter matches everything.
//! - [`SearchQuery`] is the compiled form of caller-supplied search criteria.
//!   Compilation is schema-driven and degrade-and-warn: malformed fields are
//!   skipped with a warning instead of failing the whole request, and only a
//!   request in which *no* field survives is rejected.
//!
//! Compiled matchers compose as a disjunction. Backends execute one pass per
//! matcher and concatenate the hits, so a record matching several fields
//! appears several times in the raw result; [`dedupe_by_identity`] collapses
//! those duplicates at the orchestration layer.

use std::collections::HashMap;

use serde_json::Value;

use crate::{
    error::{StorageError, StorageResult},
    record::{Attributes, Record},
};

// ============================================================================
// Exact-match filters
// ============================================================================

/// Conjunction of exact attribute matches.
///
/// ```
/// use appdir_storage::Filter;
/// use serde_json::json;
///
/// let filter = Filter::new()
///     .field("publisher", json!("FDC3 Working Group"))
///     .field("version", json!("1.0.0"));
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    /// An empty filter, which matches every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exact-match clause on `field`.
    #[must_use]
    pub fn field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    /// True if no clauses were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether every clause holds for the given attributes.
    ///
    /// A clause on an absent attribute never holds; an empty filter always
    /// does.
    #[must_use]
    pub fn matches(&self, attributes: &Attributes) -> bool {
        self.clauses
            .iter()
            .all(|(field, expected)| attributes.get(field) == Some(expected))
    }
}

// ============================================================================
// Compiled search criteria
// ============================================================================

/// One way a field value can match during search.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// Case-insensitive substring containment.
    Contains(String),
    /// Matches when any element of an array attribute equals any needle,
    /// case-insensitively.
    AnyOf(Vec<String>),
}

/// A [`Matcher`] bound to the attribute it inspects.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatcher {
    field: String,
    matcher: Matcher,
}

impl FieldMatcher {
    /// The attribute this matcher inspects.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// How the attribute value is matched.
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }
}

/// Compiled search criteria: a disjunction of per-field matchers plus the
/// warnings accumulated while degrading malformed input.
///
/// Only [`compile`] produces values of this type, so a `SearchQuery` in hand
/// is known to carry at least one matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    matchers: Vec<FieldMatcher>,
    warnings: Vec<String>,
}

impl SearchQuery {
    /// The per-field matchers, in schema order.
    #[must_use]
    pub fn matchers(&self) -> &[FieldMatcher] {
        &self.matchers
    }

    /// Warnings produced while compiling, one per degraded field or entry.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

// ============================================================================
// Search schemas
// ============================================================================

/// How a schema field's raw value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFieldKind {
    /// Identity token: trimmed, lowercased, matched by containment.
    Identity,
    /// Version token: like [`Identity`](Self::Identity), with an extra
    /// warning when the token is not a full dotted triple.
    Version,
    /// Free text, matched by case-insensitive containment.
    Text,
    /// Array of terms, matched when any record entry equals any needle.
    Terms,
}

/// One searchable field of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchField {
    /// Attribute name in both the criteria map and the stored record.
    pub name: &'static str,
    /// Interpretation of the raw criteria value.
    pub kind: SearchFieldKind,
}

/// The fixed set of fields one record shape can be searched by.
pub type SearchSchema = &'static [SearchField];

/// Searchable fields of the application catalog.
pub const APPLICATION_SEARCH: SearchSchema = &[
    SearchField { name: "appId", kind: SearchFieldKind::Identity },
    SearchField { name: "version", kind: SearchFieldKind::Version },
    SearchField { name: "title", kind: SearchFieldKind::Text },
    SearchField { name: "description", kind: SearchFieldKind::Text },
    SearchField { name: "categories", kind: SearchFieldKind::Terms },
];

// ============================================================================
// Compilation
// ============================================================================

/// Compiles caller-supplied search criteria against a schema.
///
/// Each schema field is looked up in `criteria`; absent fields are skipped
/// silently, malformed ones are skipped with a warning. Fields outside the
/// schema are ignored entirely.
///
/// ```
/// use appdir_storage::query::{APPLICATION_SEARCH, compile};
/// use serde_json::json;
///
/// let Some(criteria) = json!({"title": "Workbench", "version": 2}).as_object().cloned()
/// else { unreachable!() };
/// let query = compile(APPLICATION_SEARCH, &criteria).unwrap();
/// assert_eq!(query.matchers().len(), 1);
/// assert_eq!(query.warnings().len(), 1);
/// ```
///
/// # Errors
///
/// Fails with [`InvalidSearchCriteria`](StorageError::InvalidSearchCriteria),
/// carrying the accumulated warnings, when no field survives compilation.
pub fn compile(schema: SearchSchema, criteria: &Attributes) -> StorageResult<SearchQuery> {
    let mut matchers = Vec::new();
    let mut warnings = Vec::new();

    for field in schema {
        let Some(raw) = criteria.get(field.name) else {
            continue;
        };
        match field.kind {
            SearchFieldKind::Identity | SearchFieldKind::Version | SearchFieldKind::Text => {
                let Some(text) = raw.as_str() else {
                    warnings.push(format!(
                        "search field {:?} must be a string; skipping it",
                        field.name
                    ));
                    continue;
                };
                let needle = text.trim().to_lowercase();
                if needle.is_empty() {
                    warnings.push(format!(
                        "search field {:?} is blank; skipping it",
                        field.name
                    ));
                    continue;
                }
                if field.kind == SearchFieldKind::Version && !is_well_formed_version(&needle) {
                    warnings.push(format!(
                        "search field {:?} value {:?} is not a full major.minor.patch version; \
                         matching it as a substring",
                        field.name, needle
                    ));
                }
                matchers.push(FieldMatcher {
                    field: field.name.to_string(),
                    matcher: Matcher::Contains(needle),
                });
            },
            SearchFieldKind::Terms => {
                let Some(entries) = raw.as_array() else {
                    warnings.push(format!(
                        "search field {:?} must be an array; skipping it",
                        field.name
                    ));
                    continue;
                };
                let mut needles = Vec::with_capacity(entries.len());
                for entry in entries {
                    let Some(text) = entry.as_str() else {
                        warnings.push(format!(
                            "ignoring non-string entry in search field {:?}",
                            field.name
                        ));
                        continue;
                    };
                    let needle = text.trim().to_lowercase();
                    if needle.is_empty() {
                        warnings.push(format!(
                            "ignoring blank entry in search field {:?}",
                            field.name
                        ));
                        continue;
                    }
                    needles.push(needle);
                }
                if needles.is_empty() {
                    warnings.push(format!(
                        "search field {:?} has no usable entries; skipping it",
                        field.name
                    ));
                    continue;
                }
                matchers.push(FieldMatcher {
                    field: field.name.to_string(),
                    matcher: Matcher::AnyOf(needles),
                });
            },
        }
    }

    if matchers.is_empty() {
        return Err(StorageError::invalid_search_criteria(warnings));
    }
    Ok(SearchQuery { matchers, warnings })
}

/// Whether a lowercased token is a full `major.minor.patch` version.
fn is_well_formed_version(token: &str) -> bool {
    let mut parts = 0usize;
    for part in token.split('.') {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        parts += 1;
    }
    parts == 3
}

// ============================================================================
// Result deduplication
// ============================================================================

/// Collapses duplicate identities in a multi-pass search result.
///
/// Backends report one hit per matching field, so a record matching both its
/// title and a category appears twice. Each identity keeps the position of
/// its first appearance and the value of its last, so a record updated
/// between passes surfaces its freshest attributes without reordering.
#[must_use]
pub fn dedupe_by_identity(hits: Vec<Record>) -> Vec<Record> {
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(hits.len());
    let mut unique: Vec<Record> = Vec::with_capacity(hits.len());
    for record in hits {
        let key = record.collection().qualified_key(record.identity());
        match seen.get(&key) {
            Some(&index) => unique[index] = record,
            None => {
                seen.insert(key, unique.len());
                unique.push(record);
            },
        }
    }
    unique
}
