//! A normalized GraphQL response cache.
//!
//! Responses are split into one record per identifiable entity (`Typename:id` by default) and
//! objects reference each other by identity, so updating an entity through any query updates it
//! for every query that reads it.
//!
//! # Example
//!
//! ```
//! use hermes_normalized_cache::{QueryDocument, Store, Variables};
//! use serde_json::json;
//!
//! let document = QueryDocument::parse("{ recipe { __typename id title } }").unwrap();
//! let mut store = Store::default();
//! let data = json!({ "recipe": { "__typename": "Recipe", "id": "1", "title": "Soup" } });
//!
//! store.write_query(&document, &Variables::new(), &data).unwrap();
//! assert!(store.data().contains("Recipe:1"));
//! assert_eq!(store.read_query(&document, &Variables::new()).unwrap(), data);
//! ```

#![allow(unused_parens)]

mod document;
mod error;
mod store;
mod types;

pub use document::{
    Argument, Condition, Field, FieldSelector, Fragment, OperationType, QueryDocument
};
pub use error::{
    CacheMiss, DocumentError, NormalizationError, PathSegment, ResponsePath, StoreError
};
pub use store::{
    CacheStore, EntityRecord, Fields, Snapshot, Store, StoreValue, WriteBatch, WriteOutcome
};
pub use types::{NormalizedCacheOptions, TypePolicy, Variables};
