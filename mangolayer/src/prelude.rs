//! Convenient re-exports of commonly used types from mangolayer.
//!
//! ```ignore
//! use mangolayer::prelude::*;
//! ```
//!
//! This provides access to:
//! - The document type and its helpers
//! - Services, their params, builders and hooks
//! - Pagination types
//! - Store backends and builders
//! - Error types

pub use mangolayer_core::{
    backend::{FindResponse, StoreBackend, StoreBackendBuilder},
    document::{Document, DocumentExt, OneOrMany, to_document},
    error::{ServiceError, ServiceResult},
    hooks::{HookedService, ServiceHooks},
    page::{FindResult, Paginate, PaginateOverride, Paginated},
    query::{NativeQuery, Query},
    service::{DocumentService, DocumentServiceBuilder, Method, Params, Service, ServiceConfig},
};
