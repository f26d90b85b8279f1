//! Pagination configuration and result shapes.
//!
//! A service configured with [`Paginate`] answers `find` with a [`Paginated`] page
//! instead of a bare list. The page size is clamped by [`compute_limit`].

use serde::{Deserialize, Serialize};
use std::cmp::min;

use crate::document::Document;

/// Page size configuration for a service.
///
/// # Example
///
/// ```ignore
/// use mangolayer::page::Paginate;
///
/// let paginate = Paginate::new(10).with_max(50);
/// assert_eq!(paginate.compute_limit(Some(100)), 50);
/// assert_eq!(paginate.compute_limit(None), 10);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginate {
    /// Page size used when the caller does not ask for one.
    pub default: usize,
    /// Upper bound on the page size, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
}

impl Paginate {
    /// Creates a configuration with the given default page size and no maximum.
    pub fn new(default: usize) -> Self {
        Self { default, max: None }
    }

    /// Sets the maximum page size.
    pub fn with_max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    /// See [`compute_limit`].
    pub fn compute_limit(&self, requested: Option<usize>) -> usize {
        compute_limit(requested, self)
    }
}

/// Resolves the page size for a request.
///
/// The requested limit wins over the configured default, and the result never
/// exceeds the configured maximum.
pub fn compute_limit(requested: Option<usize>, paginate: &Paginate) -> usize {
    let lower = requested.unwrap_or(paginate.default);
    let upper = paginate.max.unwrap_or(usize::MAX);

    min(lower, upper)
}

/// Per-call pagination setting, carried in request params.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PaginateOverride {
    /// Use the service's configuration.
    #[default]
    Inherit,
    /// Return a plain list even if the service is paginated.
    Disabled,
    /// Paginate with this configuration instead of the service's.
    Replace(Paginate),
}

impl PaginateOverride {
    /// Resolves the effective configuration given the service's own.
    pub fn resolve(&self, configured: Option<Paginate>) -> Option<Paginate> {
        match self {
            PaginateOverride::Inherit => configured,
            PaginateOverride::Disabled => None,
            PaginateOverride::Replace(paginate) => Some(*paginate),
        }
    }
}

/// One page of results.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    /// Number of documents matching the query, across all pages.
    pub total: usize,
    /// The page size that was applied.
    pub limit: usize,
    /// The number of documents skipped before this page.
    pub skip: usize,
    /// The documents on this page.
    pub data: Vec<T>,
}

impl<T> Paginated<T> {
    /// Applies `f` to every item on the page.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            total: self.total,
            limit: self.limit,
            skip: self.skip,
            data: self.data.into_iter().map(f).collect(),
        }
    }
}

/// The result of a `find` call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FindResult {
    /// A page of results, when pagination is in effect.
    Paginated(Paginated<Document>),
    /// All matching documents.
    Plain(Vec<Document>),
}

impl FindResult {
    /// The documents in this result.
    pub fn documents(&self) -> &[Document] {
        match self {
            FindResult::Paginated(page) => &page.data,
            FindResult::Plain(documents) => documents,
        }
    }

    /// Mutable access to the documents in this result.
    pub fn documents_mut(&mut self) -> &mut Vec<Document> {
        match self {
            FindResult::Paginated(page) => &mut page.data,
            FindResult::Plain(documents) => documents,
        }
    }

    /// Consumes the result, returning its documents.
    pub fn into_documents(self) -> Vec<Document> {
        match self {
            FindResult::Paginated(page) => page.data,
            FindResult::Plain(documents) => documents,
        }
    }

    /// Returns the page if this result is paginated.
    pub fn into_page(self) -> Option<Paginated<Document>> {
        match self {
            FindResult::Paginated(page) => Some(page),
            FindResult::Plain(_) => None,
        }
    }
}
