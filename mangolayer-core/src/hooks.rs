//! Composable service customization.
//!
//! [`HookedService`] wraps any [`Service`], runs [`ServiceHooks::before`] on the
//! params of every call and [`ServiceHooks::after`] on every document it returns.
//! Wrappers nest, so several customizations can be stacked at construction time.
//!
//! # Example
//!
//! ```ignore
//! use mangolayer::hooks::{HookedService, ServiceHooks};
//! use mangolayer::prelude::*;
//! use serde_json::json;
//!
//! /// Sorts every find by name unless the caller chose an order.
//! struct SortByName;
//!
//! impl ServiceHooks for SortByName {
//!     fn before(&self, method: Method, params: &mut Params) -> ServiceResult<()> {
//!         if method == Method::Find && !params.query.contains_key("$sort") {
//!             params.query.insert("$sort".into(), json!({ "name": 1 }));
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let people = HookedService::new(DocumentService::new(store), SortByName);
//! ```

use async_trait::async_trait;

use crate::{
    document::{Document, OneOrMany},
    error::ServiceResult,
    page::FindResult,
    service::{Method, Params, Service},
};

/// Adjustments applied around each service call.
///
/// Both hooks default to doing nothing. Returning an error from either aborts the
/// call with that error; an error from `before` means the inner service is never
/// called.
pub trait ServiceHooks: Send + Sync {
    /// Runs before the inner service sees `params`.
    fn before(&self, _method: Method, _params: &mut Params) -> ServiceResult<()> {
        Ok(())
    }

    /// Runs on every document the inner service returns.
    fn after(&self, _method: Method, _document: &mut Document) -> ServiceResult<()> {
        Ok(())
    }
}

/// A [`Service`] that forwards to `S`, running `H` around each call.
#[derive(Debug)]
pub struct HookedService<S, H> {
    inner: S,
    hooks: H,
}

impl<S: Service, H: ServiceHooks> HookedService<S, H> {
    pub fn new(inner: S, hooks: H) -> Self {
        Self { inner, hooks }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    fn after_all(
        &self,
        method: Method,
        mut documents: OneOrMany<Document>,
    ) -> ServiceResult<OneOrMany<Document>> {
        for document in documents.iter_mut() {
            self.hooks.after(method, document)?;
        }
        Ok(documents)
    }
}

#[async_trait]
impl<S: Service, H: ServiceHooks> Service for HookedService<S, H> {
    async fn find(&self, mut params: Params) -> ServiceResult<FindResult> {
        self.hooks.before(Method::Find, &mut params)?;
        let mut result = self.inner.find(params).await?;

        for document in result.documents_mut() {
            self.hooks.after(Method::Find, document)?;
        }

        Ok(result)
    }

    async fn get(&self, id: &str, mut params: Params) -> ServiceResult<Document> {
        self.hooks.before(Method::Get, &mut params)?;
        let mut document = self.inner.get(id, params).await?;
        self.hooks.after(Method::Get, &mut document)?;

        Ok(document)
    }

    async fn create(
        &self,
        data: OneOrMany<Document>,
        mut params: Params,
    ) -> ServiceResult<OneOrMany<Document>> {
        self.hooks.before(Method::Create, &mut params)?;
        let documents = self.inner.create(data, params).await?;

        self.after_all(Method::Create, documents)
    }

    async fn update(
        &self,
        id: Option<&str>,
        data: Document,
        mut params: Params,
    ) -> ServiceResult<OneOrMany<Document>> {
        self.hooks.before(Method::Update, &mut params)?;
        let documents = self.inner.update(id, data, params).await?;

        self.after_all(Method::Update, documents)
    }

    async fn patch(
        &self,
        id: Option<&str>,
        data: Document,
        mut params: Params,
    ) -> ServiceResult<OneOrMany<Document>> {
        self.hooks.before(Method::Patch, &mut params)?;
        let documents = self.inner.patch(id, data, params).await?;

        self.after_all(Method::Patch, documents)
    }

    async fn remove(
        &self,
        id: Option<&str>,
        mut params: Params,
    ) -> ServiceResult<OneOrMany<Document>> {
        self.hooks.before(Method::Remove, &mut params)?;
        let documents = self.inner.remove(id, params).await?;

        self.after_all(Method::Remove, documents)
    }
}
