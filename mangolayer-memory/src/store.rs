//! In-memory storage implementation for Mango-dialect document stores.
//!
//! Documents live in a `BTreeMap` keyed by `_id` behind an async-aware read-write
//! lock, so an unsorted `find` returns documents in `_id` order.

use async_trait::async_trait;
use mea::rwlock::RwLock;
use serde_json::Value;
use std::{cmp::Ordering, collections::BTreeMap, sync::Arc};
use tracing::{debug, trace};
use uuid::Uuid;

use mangolayer_core::{
    backend::{FindResponse, StoreBackend, StoreBackendBuilder},
    document::{DELETED_FIELD, Document, ID_FIELD, REV_FIELD},
    error::ServiceResult,
    query::{NativeQuery, Sort, SortDirection},
    write::{WriteFailure, WriteFailureKind, WriteResponse, WriteSuccess},
};

use crate::evaluator::{DocumentEvaluator, collate, lookup};

const DEFAULT_NAME: &str = "memory";
const CONFLICT: &str = "Document update conflict";
const MISSING: &str = "missing";

/// One document revision, current or tombstoned.
#[derive(Debug, Clone)]
struct StoredDocument {
    rev: String,
    generation: u64,
    deleted: bool,
    body: Document,
}

impl StoredDocument {
    /// The document as `find` returns it: `_id`, the body, then `_rev`.
    fn materialize(&self, id: &str) -> Document {
        let mut document = Document::new();
        document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        document.extend(self.body.clone());
        document.insert(REV_FIELD.to_string(), Value::String(self.rev.clone()));
        document
    }
}

type StoreMap = BTreeMap<String, StoredDocument>;

/// Thread-safe in-memory MVCC document store.
///
/// Every write produces a new `_rev` of the form `<generation>-<32 hex>`. Updating
/// or deleting an existing document requires its current `_rev`; anything else is
/// rejected as a conflict. Deletions leave a tombstone that `find` never returns.
///
/// Clones share the same underlying data.
///
/// # Example
///
/// ```ignore
/// use mangolayer_memory::InMemoryStore;
/// use mangolayer::backend::StoreBackend;
/// use serde_json::json;
///
/// let store = InMemoryStore::new();
/// let written = store.post(json!({ "name": "Alice" }).as_object().cloned().unwrap()).await?;
/// assert!(written.rev.starts_with("1-"));
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    name: Arc<str>,
    store: Arc<RwLock<StoreMap>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::named(DEFAULT_NAME)
    }

    fn named(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// The database name, as reported in log fields.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live (non-deleted) documents.
    pub async fn doc_count(&self) -> usize {
        self.store
            .read()
            .await
            .values()
            .filter(|stored| !stored.deleted)
            .count()
    }
}

/// Applies one write to `store`, enforcing the revision check.
fn write_document(store: &mut StoreMap, mut document: Document) -> WriteResponse {
    let id = match document.remove(ID_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => id,
        None => Uuid::new_v4().simple().to_string(),
        Some(other) => {
            return WriteResponse::Failure(WriteFailure::new(
                None,
                WriteFailureKind::Invalid,
                format!("Document id must be a non-empty string, got {other}"),
            ));
        }
    };
    let failure = |kind, message: String| {
        WriteResponse::Failure(WriteFailure::new(Some(id.clone()), kind, message))
    };

    let rev = match document.remove(REV_FIELD) {
        None | Some(Value::Null) => None,
        Some(Value::String(rev)) => Some(rev),
        Some(other) => {
            return failure(WriteFailureKind::Invalid, format!("Invalid rev format: {other}"));
        }
    };
    let deleted = matches!(document.remove(DELETED_FIELD), Some(Value::Bool(true)));

    if let Some(member) = document.keys().find(|key| key.starts_with('_')) {
        return failure(
            WriteFailureKind::Invalid,
            format!("Bad special document member: {member}"),
        );
    }

    let generation = match (store.get(&id), rev.as_deref()) {
        (Some(current), Some(rev)) if current.rev == rev => current.generation + 1,
        (Some(current), None) if current.deleted => current.generation + 1,
        (Some(_), _) => return failure(WriteFailureKind::Conflict, CONFLICT.to_string()),
        (None, None) if !deleted => 1,
        (None, _) => return failure(WriteFailureKind::Missing, MISSING.to_string()),
    };

    let rev = format!("{generation}-{}", Uuid::new_v4().simple());
    trace!(%id, %rev, deleted, "Writing document revision");

    store.insert(
        id.clone(),
        StoredDocument {
            rev: rev.clone(),
            generation,
            deleted,
            body: document,
        },
    );

    WriteResponse::success(id, rev)
}

fn compare_by(sort: &[Sort], left: &Document, right: &Document) -> Ordering {
    for Sort { field, direction } in sort {
        let ordering = match (lookup(left, field), lookup(right, field)) {
            (Some(a), Some(b)) => collate(a, b),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let ordering = match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

/// Keeps only `fields` of `document`. Dotted names select nested members.
fn project(document: &Document, fields: &[String]) -> Document {
    let mut projected = Document::new();

    for field in fields {
        if let Some(value) = lookup(document, field) {
            let segments: Vec<&str> = field.split('.').collect();
            insert_path(&mut projected, &segments, value.clone());
        }
    }

    projected
}

fn insert_path(target: &mut Document, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            target.insert(last.to_string(), value);
        }
        [head, rest @ ..] => {
            let slot = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Document::new()));

            if let Value::Object(map) = slot {
                insert_path(map, rest, value);
            } else {
                let mut map = Document::new();
                insert_path(&mut map, rest, value);
                *slot = Value::Object(map);
            }
        }
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn post(&self, document: Document) -> ServiceResult<WriteSuccess> {
        let mut store = self.store.write().await;

        match write_document(&mut store, document) {
            WriteResponse::Success(success) => {
                debug!(database = %self.name, id = %success.id, "Posted document");
                Ok(success)
            }
            WriteResponse::Failure(failure) => Err(failure.into_error()),
        }
    }

    async fn bulk_docs(&self, documents: Vec<Document>) -> ServiceResult<Vec<WriteResponse>> {
        let mut store = self.store.write().await;

        let responses: Vec<WriteResponse> = documents
            .into_iter()
            .map(|document| write_document(&mut store, document))
            .collect();

        debug!(
            database = %self.name,
            count = responses.len(),
            failed = responses.iter().filter(|r| !r.is_success()).count(),
            "Applied bulk write"
        );

        Ok(responses)
    }

    async fn find(&self, query: NativeQuery) -> ServiceResult<FindResponse> {
        let store = self.store.read().await;

        let live = store
            .iter()
            .filter(|(_, stored)| !stored.deleted)
            .map(|(id, stored)| stored.materialize(id));
        let mut docs = DocumentEvaluator::filter_documents(live, &query.selector)?;
        drop(store);

        if let Some(sort) = query.sort.as_deref().filter(|sort| !sort.is_empty()) {
            docs.sort_by(|a, b| compare_by(sort, a, b));
        }

        let docs: Vec<Document> = docs
            .into_iter()
            .skip(query.skip.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|document| match &query.fields {
                Some(fields) => project(&document, fields),
                None => document,
            })
            .collect();

        trace!(database = %self.name, matched = docs.len(), "Evaluated find");

        Ok(FindResponse { docs })
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// ```ignore
/// use mangolayer_memory::InMemoryStore;
/// use mangolayer::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().name("todos").build().await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    name: Option<String>,
}

impl InMemoryStoreBuilder {
    /// Sets the database name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> ServiceResult<Self::Backend> {
        Ok(InMemoryStore::named(self.name.unwrap_or_else(|| DEFAULT_NAME.to_string())))
    }
}
