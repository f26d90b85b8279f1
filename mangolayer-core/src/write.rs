//! Write operations sent to the store and the per-document responses it returns.
//!
//! Every mutation is expressed as a batch of [`WriteOperation`]s submitted in one
//! bulk call. The store answers with one [`WriteResponse`] per operation, in the same
//! order. Successful responses carry the new `_id`/`_rev` pair, which
//! [`extract_metadata`] re-keys onto the returned document.

use serde_json::Value;

use crate::{
    document::{DELETED_FIELD, Document, DocumentExt, ID_FIELD, REV_FIELD},
    error::ServiceError,
};

/// What a write does to the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteIntent {
    /// Store a new document.
    Insert,
    /// Overwrite every field except identity and revision.
    Replace,
    /// Overlay fields onto the existing document.
    Merge,
    /// Mark the document as logically deleted.
    Tombstone,
}

/// A document paired with the intent of its write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOperation {
    intent: WriteIntent,
    document: Document,
}

impl WriteOperation {
    /// Inserts `document` as given.
    pub fn insert(document: Document) -> Self {
        Self { intent: WriteIntent::Insert, document }
    }

    /// Replaces `existing` with `data`, keeping `existing`'s identity and revision.
    pub fn replace(existing: &Document, data: &Document, id_field: &str) -> Self {
        let mut document = data.clone();
        document.remove(DELETED_FIELD);
        document.force_identity(existing, id_field);

        Self { intent: WriteIntent::Replace, document }
    }

    /// Shallow-merges `data` onto `existing`, keeping `existing`'s identity and revision.
    pub fn merge(existing: &Document, data: &Document, id_field: &str) -> Self {
        let mut document = existing.clone();
        document.overlay(data);
        document.remove(DELETED_FIELD);
        document.force_identity(existing, id_field);

        Self { intent: WriteIntent::Merge, document }
    }

    /// Marks `existing` as deleted without changing its fields.
    pub fn tombstone(existing: &Document) -> Self {
        Self { intent: WriteIntent::Tombstone, document: existing.clone() }
    }

    pub fn intent(&self) -> WriteIntent {
        self.intent
    }

    /// The document as the caller will see it once the write succeeds.
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// The document exactly as it must be sent to the store.
    pub fn to_store_document(&self) -> Document {
        let mut document = self.document.clone();
        if self.intent == WriteIntent::Tombstone {
            document.insert(DELETED_FIELD.to_string(), Value::Bool(true));
        }
        document
    }

    /// Completes the operation with the store's response metadata.
    ///
    /// The `_id`/`_rev` from `success` are applied after every other field.
    pub fn complete(self, success: &WriteSuccess) -> Document {
        let mut document = self.document;
        document.overlay(&extract_metadata(success));
        document
    }
}

/// A successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSuccess {
    /// The document's `_id`.
    pub id: String,
    /// The revision the write produced.
    pub rev: String,
}

/// Why the store rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFailureKind {
    /// The supplied revision is not the document's current revision.
    Conflict,
    /// The document is malformed.
    Invalid,
    /// The write refers to a document the store has never seen.
    Missing,
}

/// A rejected write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    /// The `_id` of the document, if one was known.
    pub id: Option<String>,
    pub kind: WriteFailureKind,
    /// The store's explanation.
    pub message: String,
}

impl WriteFailure {
    pub fn new(id: Option<String>, kind: WriteFailureKind, message: impl Into<String>) -> Self {
        Self { id, kind, message: message.into() }
    }

    /// Maps the failure onto the matching [`ServiceError`].
    pub fn into_error(self) -> ServiceError {
        match self.kind {
            WriteFailureKind::Conflict => ServiceError::Conflict(self.message),
            WriteFailureKind::Invalid => ServiceError::BadRequest(self.message),
            WriteFailureKind::Missing => ServiceError::NotFound(self.message),
        }
    }
}

/// The outcome of one operation in a bulk write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResponse {
    Success(WriteSuccess),
    Failure(WriteFailure),
}

impl WriteResponse {
    pub fn success(id: impl Into<String>, rev: impl Into<String>) -> Self {
        WriteResponse::Success(WriteSuccess { id: id.into(), rev: rev.into() })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WriteResponse::Success(_))
    }
}

/// Re-keys a write's store-assigned identity and revision as document metadata.
///
/// The result holds exactly `_id` and `_rev`.
pub fn extract_metadata(success: &WriteSuccess) -> Document {
    let mut metadata = Document::new();
    metadata.insert(ID_FIELD.to_string(), Value::String(success.id.clone()));
    metadata.insert(REV_FIELD.to_string(), Value::String(success.rev.clone()));
    metadata
}
