//! Document store client abstraction.
//!
//! The data-fetching layer issues exactly one call shape against a store:
//! `find(collection, query, {limit, skip, sort})`. No writes, no
//! aggregation beyond match/sort/skip/limit. Any backend that can answer
//! that call can sit behind [`DocumentStore`]; [`MemoryStore`] is the
//! built-in implementation used by the test suite and for embedding.

mod memory;

use async_trait::async_trait;

use crate::document::RawDocument;
use crate::error::Error;
use crate::query::{FindOptions, StoreQuery};

pub use memory::MemoryStore;

/// A backend capable of listing documents from a named collection.
///
/// `query` is the translated match document (`field -> {operator ->
/// value}`); operators the backend does not recognize must be rejected with
/// [`Error::Query`]. Errors propagate unchanged to the caller of the list
/// operation; no retry, no suppression.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        collection: &str,
        query: &StoreQuery,
        options: &FindOptions,
    ) -> Result<Vec<RawDocument>, Error>;
}
