//! Generic resource queries and CRUD over a Mango-dialect MVCC document store.
//!
//! This crate is the core of the mangolayer project and provides:
//!
//! - **Documents** ([`document`]) - The JSON document type and its structural helpers
//! - **Query translation** ([`query`]) - Generic resource queries mapped onto native selectors
//! - **Pagination** ([`page`]) - Page size clamping and paginated result shapes
//! - **Writes** ([`write`]) - Write operations, store responses and metadata extraction
//! - **Identifiers** ([`id`]) - Identifier generation for non-native identity fields
//! - **Store backend abstraction** ([`backend`]) - The trait a document store implements
//! - **Services** ([`service`]) - The create/find/get/update/patch/remove façade
//! - **Hooks** ([`hooks`]) - Composable service customization
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use mangolayer::prelude::*;
//! use serde_json::json;
//!
//! let messages = DocumentService::builder().model(store).build()?;
//!
//! let message = messages
//!     .create(to_document(&json!({ "text": "Oh hai!" }))?.into(), Params::new())
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as mangolayer_core;

pub mod backend;
pub mod document;
pub mod error;
pub mod hooks;
pub mod id;
pub mod page;
pub mod query;
pub mod service;
pub mod write;
