//! Request-scoped list queries and lazy reference resolution over a
//! document store.
//!
//! For a set of declared entities, the crate provides list-query access
//! (declarative filter/order/pagination translated into store-native
//! `find` calls) plus resolution of inter-entity references without
//! refetching data already obtained in the same request:
//!
//! - [`Registry`] binds each declared entity to a [`Controller`] that can
//!   list its documents.
//! - [`query::translate`] turns [`ListArgs`] into the match document, sort
//!   specification and pagination the store understands.
//! - [`RequestContext`] carries the per-request cache that deduplicates
//!   fetches and short-circuits single-identifier lookups.
//! - [`ReferenceResolver`] is the deferred computation attached to
//!   reference-typed fields; evaluating it re-enters the list operation
//!   with the shared context, so already-seen documents come from the
//!   cache.
//!
//! The surrounding schema facility (GraphQL or otherwise) decides how the
//! list operations are exposed; the [`FilterInput`]/[`OrderInput`] types
//! are async-graphql input objects so they can be used directly in a
//! schema. Writes, cross-request caching and eviction are out of scope.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = Arc::new(MemoryStore::new());
//! store.insert_many("games", vec![
//!     json!({"_id": "1", "title": "Super Mario 64", "publisher": "3"}),
//! ]);
//! store.insert_many("publishers", vec![json!({"_id": "3", "name": "Nintendo"})]);
//!
//! let registry = Registry::new(store);
//! registry.register(
//!     EntityDescriptor::new("game", "games")
//!         .scalar("title", ScalarKind::String)
//!         .reference("publisher", "publisher"),
//! )?;
//! registry.register(
//!     EntityDescriptor::new("publisher", "publishers")
//!         .scalar("name", ScalarKind::String),
//! )?;
//! registry.link()?;
//!
//! let ctx = RequestContext::new();
//! let games = registry.lookup("game").unwrap();
//! let result = games.list(&ListArgs::new(), Some(&ctx)).await?;
//! let publisher = result[0]
//!     .reference("publisher")
//!     .unwrap()
//!     .resolve()
//!     .await?
//!     .into_document();
//! ```

pub mod context;
pub mod controller;
pub mod document;
pub mod error;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod store;

pub use context::{RequestCache, RequestContext};
pub use controller::Controller;
pub use document::{Document, DocumentId, FieldValue, RawDocument};
pub use error::{BoxError, Error};
pub use query::{
    FilterInput, FindOptions, ID_FIELD, ListArgs, OP_EQ, OP_IN, OrderInput, QueryPlan,
    SortDirection, StoreQuery,
};
pub use registry::{EntityDescriptor, FieldKind, Registry, ScalarKind};
pub use resolver::{ReferenceResolver, Resolved};
pub use store::{DocumentStore, MemoryStore};
