//! In-memory Mango document store for mangolayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend`
//! trait with CouchDB-style revisions. It is meant for development, testing and
//! small deployments.
//!
//! # Features
//!
//! - **MVCC writes** - Every write checks and bumps the document's `_rev`
//! - **Tombstones** - Deleted documents are kept as tombstones and hidden from queries
//! - **Mango selectors** - Comparison, membership, array and logical operators with
//!   CouchDB collation order
//! - **Sorting and paging** - Multi-field sort, skip, limit and field projection
//!
//! # Quick Start
//!
//! ```ignore
//! use mangolayer::prelude::*;
//! use mangolayer::memory::InMemoryStore;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::builder().name("people").build().await?;
//!     let people = DocumentService::builder().model(store).build()?;
//!
//!     people
//!         .create(to_document(&json!({ "name": "Alice" }))?.into(), Params::new())
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as mangolayer_memory;

mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
