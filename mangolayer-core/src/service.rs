//! The resource service: create, find, get, update, patch and remove over a store.
//!
//! [`DocumentService`] implements the [`Service`] façade on top of any
//! [`StoreBackend`]. Reads translate the caller's generic query into the store's
//! native dialect. Mutations resolve their targets first, then submit a single bulk
//! write built from the resolved documents, so every write carries the revision the
//! store currently holds. Losing a revision race surfaces as
//! [`ServiceError::Conflict`]; the service never retries.
//!
//! # Example
//!
//! ```ignore
//! use mangolayer::prelude::*;
//! use mangolayer::memory::InMemoryStore;
//! use serde_json::json;
//!
//! let service = DocumentService::builder()
//!     .model(InMemoryStore::new())
//!     .paginate(Paginate::new(10).with_max(50))
//!     .build()?;
//!
//! let created = service
//!     .create(to_document(&json!({ "text": "hi" }))?.into(), Params::new())
//!     .await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{fmt, sync::Arc};
use tracing::{debug, trace};

use crate::{
    backend::StoreBackend,
    document::{Document, DocumentExt, ID_FIELD, OneOrMany},
    error::{ServiceError, ServiceResult},
    id::{HexIdGenerator, IdGenerator},
    page::{FindResult, Paginate, PaginateOverride, Paginated},
    query::{
        INDEX, LIMIT, NativeQuery, Query, SELECT, SKIP, SORT, convert_select, data_predicates,
        translate,
    },
    write::{WriteOperation, WriteResponse},
};

/// The six service methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Find,
    Get,
    Create,
    Update,
    Patch,
    Remove,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Find => "find",
            Method::Get => "get",
            Method::Create => "create",
            Method::Update => "update",
            Method::Patch => "patch",
            Method::Remove => "remove",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    /// The generic query, including control keys.
    pub query: Query,
    /// Per-call pagination setting for `find`.
    pub paginate: PaginateOverride,
}

impl Params {
    /// Creates empty params: no query, inherited pagination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates params carrying `query`.
    pub fn with_query(query: Query) -> Self {
        Self { query, ..Self::default() }
    }

    /// Sets the per-call pagination setting.
    pub fn paginate(mut self, paginate: PaginateOverride) -> Self {
        self.paginate = paginate;
        self
    }
}

/// The resource service contract.
///
/// Wrappers such as [`HookedService`](crate::hooks::HookedService) implement the same
/// trait and forward to an inner service, so customizations compose at construction.
#[async_trait]
pub trait Service: Send + Sync {
    /// Finds documents matching `params.query`.
    ///
    /// Returns a page when pagination is in effect, a plain list otherwise.
    async fn find(&self, params: Params) -> ServiceResult<FindResult>;

    /// Gets the document whose identity field equals `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if there is no such document.
    async fn get(&self, id: &str, params: Params) -> ServiceResult<Document>;

    /// Creates one or many documents.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::BadRequest`] if the store rejects any document.
    async fn create(
        &self,
        data: OneOrMany<Document>,
        params: Params,
    ) -> ServiceResult<OneOrMany<Document>>;

    /// Replaces the document `id`, or every document matching `params.query` when
    /// `id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if nothing matches, or
    /// [`ServiceError::Conflict`] if the store rejects any write.
    async fn update(
        &self,
        id: Option<&str>,
        data: Document,
        params: Params,
    ) -> ServiceResult<OneOrMany<Document>>;

    /// Merges `data` into the document `id`, or into every document matching
    /// `params.query` when `id` is `None`.
    ///
    /// # Errors
    ///
    /// As for [`Service::update`].
    async fn patch(
        &self,
        id: Option<&str>,
        data: Document,
        params: Params,
    ) -> ServiceResult<OneOrMany<Document>>;

    /// Removes the document `id`, or every document matching `params.query` when
    /// `id` is `None`.
    ///
    /// # Errors
    ///
    /// As for [`Service::update`].
    async fn remove(&self, id: Option<&str>, params: Params) -> ServiceResult<OneOrMany<Document>>;
}

/// The serializable part of a service's configuration.
///
/// # Example
///
/// ```ignore
/// let config: ServiceConfig = serde_json::from_value(json!({
///     "id": "uuid",
///     "paginate": { "default": 10, "max": 50 },
/// }))?;
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Name of the identity field.
    pub id: String,
    /// Custom event names. Stored for the host; not interpreted here.
    pub events: Vec<String>,
    /// Pagination; absent disables it.
    pub paginate: Option<Paginate>,
    /// Selector used when a caller's query has no data predicates.
    /// Defaults to "the identity field exists".
    pub query: Option<Query>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            id: ID_FIELD.to_string(),
            events: Vec::new(),
            paginate: None,
            query: None,
        }
    }
}

/// A [`Service`] backed by a [`StoreBackend`].
#[derive(Debug)]
pub struct DocumentService<B: StoreBackend> {
    model: B,
    id: String,
    events: Vec<String>,
    paginate: Option<Paginate>,
    default_query: Query,
    id_generator: Arc<dyn IdGenerator>,
}

impl<B: StoreBackend> DocumentService<B> {
    /// Creates a service over `model` with the default configuration.
    pub fn new(model: B) -> Self {
        Self {
            model,
            id: ID_FIELD.to_string(),
            events: Vec::new(),
            paginate: None,
            default_query: default_selector(ID_FIELD),
            id_generator: Arc::new(HexIdGenerator),
        }
    }

    /// Creates a builder for a configured service.
    pub fn builder() -> DocumentServiceBuilder<B> {
        DocumentServiceBuilder::new()
    }

    /// The store handle.
    pub fn model(&self) -> &B {
        &self.model
    }

    /// The name of the identity field.
    pub fn id_field(&self) -> &str {
        &self.id
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn paginate(&self) -> Option<Paginate> {
        self.paginate
    }

    /// The selector substituted for queries without data predicates.
    pub fn default_query(&self) -> &Query {
        &self.default_query
    }

    fn with_default(&self, mut query: Query) -> Query {
        if data_predicates(&query).is_empty() {
            for (key, value) in &self.default_query {
                query.insert(key.clone(), value.clone());
            }
        }
        query
    }

    /// The query resolving exactly the document `id`, keeping the caller's index hint.
    fn identity_query(&self, id: &str, query: &Query) -> Query {
        let mut resolved = Query::new();
        resolved.insert(self.id.clone(), Value::String(id.to_string()));
        if let Some(index) = query.get(INDEX) {
            resolved.insert(INDEX.to_string(), index.clone());
        }
        resolved
    }

    /// The query resolving mutation targets: by identity, or by selector without paging.
    fn target_query(&self, id: Option<&str>, query: &Query) -> Query {
        match id {
            Some(id) => self.identity_query(id, query),
            None => self.with_default(
                query
                    .iter()
                    .filter(|(key, _)| ![SELECT, SORT, SKIP, LIMIT].contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
        }
    }

    async fn resolve(&self, query: &Query) -> ServiceResult<Vec<Document>> {
        let mut native = translate(query)?;
        native.fields = None;

        let selector = Value::Object(native.selector.clone());
        trace!(%selector, "resolving documents");

        Ok(self.model.find(native).await?.docs)
    }

    async fn resolve_targets(
        &self,
        id: Option<&str>,
        query: &Query,
    ) -> ServiceResult<Vec<Document>> {
        let query = self.target_query(id, query);
        let documents = self.resolve(&query).await?;

        if documents.is_empty() {
            return Err(not_found(id, &query));
        }

        Ok(documents)
    }

    /// Submits `operations` as one bulk write and reconciles the responses.
    async fn bulk_write(
        &self,
        method: Method,
        operations: Vec<WriteOperation>,
    ) -> ServiceResult<Vec<Document>> {
        let responses = self
            .model
            .bulk_docs(
                operations
                    .iter()
                    .map(WriteOperation::to_store_document)
                    .collect(),
            )
            .await?;

        if responses.len() != operations.len() {
            return Err(ServiceError::Backend(format!(
                "Store returned {} responses for {} documents",
                responses.len(),
                operations.len()
            )));
        }

        operations
            .into_iter()
            .zip(responses)
            .map(|(operation, response)| match response {
                WriteResponse::Success(success) => Ok(operation.complete(&success)),
                WriteResponse::Failure(failure) => {
                    debug!(
                        %method,
                        id = ?failure.id,
                        kind = ?failure.kind,
                        "write rejected: {}",
                        failure.message
                    );

                    Err(match method {
                        Method::Create => ServiceError::BadRequest(failure.message),
                        _ => ServiceError::Conflict(failure.message),
                    })
                }
            })
            .collect()
    }

    fn project(&self, document: Document, select: Option<&[String]>) -> Document {
        match select {
            Some(fields) => document.select(fields, &self.id),
            None => document,
        }
    }

    fn project_all(&self, documents: Vec<Document>, select: Option<&[String]>) -> Vec<Document> {
        documents
            .into_iter()
            .map(|document| self.project(document, select))
            .collect()
    }

    async fn count(&self, native: &NativeQuery) -> ServiceResult<usize> {
        let query = NativeQuery {
            selector: native.selector.clone(),
            use_index: native.use_index.clone(),
            ..Default::default()
        };

        Ok(self.model.find(query).await?.docs.len())
    }
}

#[async_trait]
impl<B: StoreBackend> Service for DocumentService<B> {
    async fn find(&self, params: Params) -> ServiceResult<FindResult> {
        let paginate = params.paginate.resolve(self.paginate);
        let mut native = translate(&self.with_default(params.query))?;
        let select = native.fields.take();
        let skip = native.skip.unwrap_or(0);
        let limit = match paginate {
            Some(paginate) => Some(paginate.compute_limit(native.limit)),
            None => native.limit,
        };
        native.limit = limit;

        let documents = if limit.is_some_and(|limit| limit < 1) {
            trace!("limit below one, skipping document fetch");
            Vec::new()
        } else {
            self.model.find(native.clone()).await?.docs
        };
        let data = self.project_all(documents, select.as_deref());

        debug!(method = %Method::Find, count = data.len(), skip, ?limit, "found documents");

        match paginate {
            Some(_) => Ok(FindResult::Paginated(Paginated {
                total: self.count(&native).await?,
                limit: limit.unwrap_or_default(),
                skip,
                data,
            })),
            None => Ok(FindResult::Plain(data)),
        }
    }

    async fn get(&self, id: &str, params: Params) -> ServiceResult<Document> {
        let select = selection(&params.query)?;
        let query = self.identity_query(id, &params.query);

        let document = self
            .resolve(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(Some(id), &query))?;

        debug!(method = %Method::Get, id, "got document");

        Ok(self.project(document, select.as_deref()))
    }

    async fn create(
        &self,
        data: OneOrMany<Document>,
        params: Params,
    ) -> ServiceResult<OneOrMany<Document>> {
        let select = selection(&params.query)?;
        let mint = self.id != ID_FIELD;

        let operations = data
            .into_vec()
            .into_iter()
            .map(|mut document| {
                if mint && document.is_unset(&self.id) {
                    document.insert(self.id.clone(), Value::String(self.id_generator.generate()));
                }
                WriteOperation::insert(document)
            })
            .collect::<Vec<_>>();

        if operations.is_empty() {
            return Ok(OneOrMany::Many(Vec::new()));
        }

        debug!(method = %Method::Create, count = operations.len(), "creating documents");

        let documents = self.bulk_write(Method::Create, operations).await?;

        Ok(OneOrMany::collapse(self.project_all(documents, select.as_deref())))
    }

    async fn update(
        &self,
        id: Option<&str>,
        data: Document,
        params: Params,
    ) -> ServiceResult<OneOrMany<Document>> {
        let select = selection(&params.query)?;
        let operations = self
            .resolve_targets(id, &params.query)
            .await?
            .iter()
            .map(|existing| WriteOperation::replace(existing, &data, &self.id))
            .collect::<Vec<_>>();

        debug!(method = %Method::Update, ?id, count = operations.len(), "replacing documents");

        let documents = self.bulk_write(Method::Update, operations).await?;

        Ok(OneOrMany::collapse(self.project_all(documents, select.as_deref())))
    }

    async fn patch(
        &self,
        id: Option<&str>,
        data: Document,
        params: Params,
    ) -> ServiceResult<OneOrMany<Document>> {
        let select = selection(&params.query)?;
        let operations = self
            .resolve_targets(id, &params.query)
            .await?
            .iter()
            .map(|existing| WriteOperation::merge(existing, &data, &self.id))
            .collect::<Vec<_>>();

        debug!(method = %Method::Patch, ?id, count = operations.len(), "merging documents");

        let documents = self.bulk_write(Method::Patch, operations).await?;

        Ok(OneOrMany::collapse(self.project_all(documents, select.as_deref())))
    }

    async fn remove(&self, id: Option<&str>, params: Params) -> ServiceResult<OneOrMany<Document>> {
        let select = selection(&params.query)?;
        let operations = self
            .resolve_targets(id, &params.query)
            .await?
            .iter()
            .map(WriteOperation::tombstone)
            .collect::<Vec<_>>();

        debug!(method = %Method::Remove, ?id, count = operations.len(), "removing documents");

        let documents = self.bulk_write(Method::Remove, operations).await?;

        Ok(OneOrMany::collapse(self.project_all(documents, select.as_deref())))
    }
}

fn default_selector(id_field: &str) -> Query {
    let mut query = Query::new();
    query.insert(id_field.to_string(), json!({ "$exists": true }));
    query
}

fn selection(query: &Query) -> ServiceResult<Option<Vec<String>>> {
    query.get(SELECT).map(convert_select).transpose()
}

fn not_found(id: Option<&str>, query: &Query) -> ServiceError {
    match id {
        Some(id) => ServiceError::NotFound(format!("No record found for id '{id}'")),
        None => ServiceError::NotFound(format!(
            "No record found for query {}",
            Value::Object(query.clone())
        )),
    }
}

/// Builder for [`DocumentService`].
///
/// # Example
///
/// ```ignore
/// let service = DocumentService::builder()
///     .model(InMemoryStore::new())
///     .id("uuid")
///     .events(["testing"])
///     .paginate(Paginate::new(2).with_max(4))
///     .build()?;
/// ```
pub struct DocumentServiceBuilder<B> {
    model: Option<B>,
    config: ServiceConfig,
    id_generator: Option<Arc<dyn IdGenerator>>,
}

impl<B: StoreBackend> DocumentServiceBuilder<B> {
    /// Creates a builder with the default configuration and no store.
    pub fn new() -> Self {
        Self {
            model: None,
            config: ServiceConfig::default(),
            id_generator: None,
        }
    }

    /// Sets the store handle. Required.
    pub fn model(mut self, model: B) -> Self {
        self.model = Some(model);
        self
    }

    /// Replaces the whole serializable configuration.
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the identity field name.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = id.into();
        self
    }

    /// Sets the custom event names.
    pub fn events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.events = events.into_iter().map(Into::into).collect();
        self
    }

    /// Enables pagination.
    pub fn paginate(mut self, paginate: Paginate) -> Self {
        self.config.paginate = Some(paginate);
        self
    }

    /// Sets the selector used when a caller's query has no data predicates.
    pub fn query(mut self, query: Query) -> Self {
        self.config.query = Some(query);
        self
    }

    /// Sets the generator for identifiers minted by `create`.
    pub fn id_generator(mut self, id_generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Some(Arc::new(id_generator));
        self
    }

    /// Builds the service.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Initialization`] if no store was provided or the
    /// identity field name is empty.
    pub fn build(self) -> ServiceResult<DocumentService<B>> {
        let model = self.model.ok_or_else(|| {
            ServiceError::Initialization("Store `model` needs to be provided".to_string())
        })?;

        let ServiceConfig { id, events, paginate, query } = self.config;

        if id.is_empty() {
            return Err(ServiceError::Initialization(
                "Identity field name must not be empty".to_string(),
            ));
        }

        debug!(id_field = %id, ?paginate, "configured document service");

        Ok(DocumentService {
            model,
            default_query: query.unwrap_or_else(|| default_selector(&id)),
            id,
            events,
            paginate,
            id_generator: self
                .id_generator
                .unwrap_or_else(|| Arc::new(HexIdGenerator)),
        })
    }
}

impl<B: StoreBackend> Default for DocumentServiceBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}
