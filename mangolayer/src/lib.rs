//! Main mangolayer crate: generic resource services over Mango document stores.
//!
//! This crate is the primary entry point of the mangolayer project. It re-exports the
//! core types from `mangolayer-core` and, with the `memory` feature (on by default),
//! the in-memory store.
//!
//! # Features
//!
//! - **Generic queries** - Flat JSON queries with `$select`, `$sort`, `$skip`,
//!   `$limit` and `$index` control keys, translated to Mango selectors
//! - **Resource methods** - `find`, `get`, `create`, `update`, `patch` and `remove`
//! - **Optimistic concurrency** - Every write carries the revision it was based on;
//!   losing a race surfaces as a conflict
//! - **Pagination** - Configurable default and maximum page sizes, overridable per call
//! - **Hooks** - Wrap any service to adjust params and results
//!
//! # Quick Start
//!
//! ```ignore
//! use mangolayer::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let todos = DocumentService::builder()
//!         .model(InMemoryStore::new())
//!         .paginate(Paginate::new(2).with_max(4))
//!         .build()?;
//!
//!     let todo = todos
//!         .create(to_document(&json!({ "text": "Write docs" }))?.into(), Params::new())
//!         .await?
//!         .into_one()
//!         .ok_or("expected a single todo")?;
//!
//!     let id = todo["_id"].as_str().ok_or("missing _id")?;
//!     todos.patch(Some(id), to_document(&json!({ "done": true }))?, Params::new()).await?;
//!
//!     let page = todos
//!         .find(Params::with_query(to_document(&json!({
//!             "done": true,
//!             "$sort": { "text": 1 },
//!         }))?))
//!         .await?;
//!
//!     println!("{} done", page.documents().len());
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory MVCC store for development and testing (requires the
//!   `memory` feature)
//! - Any other type implementing [`backend::StoreBackend`]

pub mod prelude;

pub use mangolayer_core::{backend, document, error, hooks, id, page, query, service, write};

// Re-export serde_json, whose `Map` is the document type
pub use serde_json;

/// In-memory storage backend implementations.
///
/// This module is only available when the `memory` feature is enabled.
#[cfg(feature = "memory")]
pub mod memory {
    pub use mangolayer_memory::{InMemoryStore, InMemoryStoreBuilder};
}
