//! Storage backend abstraction.
//!
//! A [`StoreBackend`] is a single document database speaking the Mango dialect: it
//! finds documents by [`NativeQuery`] and writes documents in bulk, enforcing
//! optimistic concurrency on `_rev`. The service layer never talks to a store any
//! other way.
//!
//! # Contract
//!
//! - Every stored document carries `_id` and `_rev`. `find` returns both.
//! - Writing a document that already exists requires its current `_rev`; a stale or
//!   missing revision yields a [`WriteFailureKind::Conflict`](crate::write::WriteFailureKind)
//!   response for that document.
//! - A document written with `_deleted: true` becomes a tombstone and is no longer
//!   returned by `find`.
//! - `bulk_docs` returns exactly one response per input document, in input order.
//!   Each document succeeds or fails on its own.
//!
//! # Example
//!
//! ```ignore
//! use mangolayer::backend::StoreBackend;
//! use mangolayer::query::NativeQuery;
//! use serde_json::json;
//!
//! let responses = backend
//!     .bulk_docs(vec![json!({ "text": "hi" }).as_object().cloned().unwrap()])
//!     .await?;
//! let found = backend.find(NativeQuery::default()).await?;
//! ```

use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{
    document::Document,
    error::ServiceResult,
    query::NativeQuery,
    write::{WriteResponse, WriteSuccess},
};

/// Documents returned by [`StoreBackend::find`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindResponse {
    pub docs: Vec<Document>,
}

/// Abstract interface for a Mango-dialect MVCC document store.
///
/// Implementations must be safe to call concurrently. The service layer shares one
/// handle across every in-flight request and does not serialize access to it.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Writes a single document.
    ///
    /// # Errors
    ///
    /// A rejected write is returned as the error its
    /// [`WriteFailure::into_error`](crate::write::WriteFailure::into_error) maps to.
    async fn post(&self, document: Document) -> ServiceResult<WriteSuccess>;

    /// Writes many documents in one call.
    ///
    /// Returns one [`WriteResponse`] per document, positionally aligned with
    /// `documents`. A rejected document does not fail the call; only store-level
    /// errors do.
    async fn bulk_docs(&self, documents: Vec<Document>) -> ServiceResult<Vec<WriteResponse>>;

    /// Finds the live documents matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the selector is malformed or the store fails.
    async fn find(&self, query: NativeQuery) -> ServiceResult<FindResponse>;
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn post(&self, document: Document) -> ServiceResult<WriteSuccess> {
        (*self).post(document).await
    }

    async fn bulk_docs(&self, documents: Vec<Document>) -> ServiceResult<Vec<WriteResponse>> {
        (*self).bulk_docs(documents).await
    }

    async fn find(&self, query: NativeQuery) -> ServiceResult<FindResponse> {
        (*self).find(query).await
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn post(&self, document: Document) -> ServiceResult<WriteSuccess> {
        (**self).post(document).await
    }

    async fn bulk_docs(&self, documents: Vec<Document>) -> ServiceResult<Vec<WriteResponse>> {
        (**self).bulk_docs(documents).await
    }

    async fn find(&self, query: NativeQuery) -> ServiceResult<FindResponse> {
        (**self).find(query).await
    }
}

#[async_trait]
impl<B> StoreBackend for Box<B>
where
    B: StoreBackend + ?Sized,
{
    async fn post(&self, document: Document) -> ServiceResult<WriteSuccess> {
        (**self).post(document).await
    }

    async fn bulk_docs(&self, documents: Vec<Document>) -> ServiceResult<Vec<WriteResponse>> {
        (**self).bulk_docs(documents).await
    }

    async fn find(&self, query: NativeQuery) -> ServiceResult<FindResponse> {
        (**self).find(query).await
    }
}

/// Factory trait for creating backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> ServiceResult<Self::Backend>;
}
