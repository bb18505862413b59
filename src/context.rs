//! Per-request context and document cache.
//!
//! The cache deduplicates document fetches within one logical request (one
//! GraphQL operation execution, typically): every successful list operation
//! indexes its results by collection and identifier, and single-identifier
//! equality lookups are then served from the cache instead of the store.
//!
//! The context is cheap to clone (clones share the same cache) and is the
//! only shared mutable state in the layer. It lives and dies with a single
//! request: no eviction, no TTL, no cross-request reuse.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::document::{Document, DocumentId};
use crate::query::{FilterInput, ID_FIELD, OP_EQ};

/// Per-request document cache, keyed by collection name then identifier.
///
/// Safe for concurrent read/write from resolutions running interleaved (or
/// in parallel) within the same request; the lock is never held across an
/// await. `put` is last-write-wins; documents are treated as immutable
/// within a request's timeframe.
#[derive(Clone, Debug, Default)]
pub struct RequestCache {
    inner: Arc<RwLock<HashMap<String, HashMap<DocumentId, Document>>>>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached document for `(collection, id)`, if any.
    pub fn get(&self, collection: &str, id: &DocumentId) -> Option<Document> {
        self.inner
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// Index documents by identifier, overwriting existing entries
    /// (refetched documents are assumed current). Documents without an
    /// identifier-shaped `_id` are skipped.
    pub fn put(&self, collection: &str, documents: &[Document]) {
        let mut inner = self.inner.write();
        let cached = inner.entry(collection.to_string()).or_default();
        for doc in documents {
            match doc.id() {
                Some(id) => {
                    cached.insert(id, doc.clone());
                }
                None => {
                    tracing::debug!(collection, "document without identifier not cached");
                }
            }
        }
    }

    /// The single-identifier-equality shortcut.
    ///
    /// Returns the cached document only when the filter is exactly one
    /// triple `{_id, $eq, <identifier>}` and that identifier is cached for
    /// the collection. Membership (`$in`) and multi-triple filters never
    /// qualify: a partial cache hit is indistinguishable from a miss
    /// without tracking negative results, so those always go to the store.
    pub fn try_fast_path(&self, collection: &str, filter: &[FilterInput]) -> Option<Document> {
        let [triple] = filter else {
            return None;
        };
        if triple.field != ID_FIELD || triple.operator != OP_EQ {
            return None;
        }
        let id = DocumentId::from_value(&triple.value)?;
        self.get(collection, &id)
    }
}

/// Request-scoped context threaded through list operations and reference
/// resolutions. Created lazily by the list operation when the caller does
/// not supply one; all resolutions spawned from one request share it.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    cache: RequestCache,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    fn doc(value: Value) -> Document {
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        Document::from_raw(map)
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = RequestCache::new();
        cache.put("games", &[doc(json!({"_id": "1", "title": "Super Mario 64"}))]);

        let hit = cache
            .get("games", &DocumentId::String("1".to_string()))
            .expect("cached");
        assert_eq!(hit.value("title"), Some(&json!("Super Mario 64")));
        assert!(cache.get("games", &DocumentId::String("2".to_string())).is_none());
        assert!(cache.get("publishers", &DocumentId::String("1".to_string())).is_none());
    }

    #[test]
    fn put_overwrites_existing_entry() {
        let cache = RequestCache::new();
        cache.put("games", &[doc(json!({"_id": "1", "title": "old"}))]);
        cache.put("games", &[doc(json!({"_id": "1", "title": "new"}))]);

        let hit = cache.get("games", &DocumentId::String("1".to_string())).unwrap();
        assert_eq!(hit.value("title"), Some(&json!("new")));
    }

    #[test]
    fn fast_path_hits_single_id_equality_only() {
        let cache = RequestCache::new();
        cache.put("games", &[doc(json!({"_id": "1", "title": "Super Mario 64"}))]);

        let hit = cache.try_fast_path("games", &[FilterInput::eq("_id", json!("1"))]);
        assert!(hit.is_some());

        // Not cached yet.
        assert!(cache.try_fast_path("games", &[FilterInput::eq("_id", json!("2"))]).is_none());
    }

    #[test]
    fn fast_path_rejects_in_and_multi_triple_filters() {
        let cache = RequestCache::new();
        cache.put("games", &[doc(json!({"_id": "1"})), doc(json!({"_id": "2"}))]);

        // Membership lookups always go to the store, even fully cached.
        assert!(cache
            .try_fast_path("games", &[FilterInput::is_in("_id", vec![json!("1"), json!("2")])])
            .is_none());

        // Mixed predicates disqualify the shortcut.
        assert!(cache
            .try_fast_path(
                "games",
                &[
                    FilterInput::eq("_id", json!("1")),
                    FilterInput::eq("title", json!("Super Mario 64")),
                ]
            )
            .is_none());

        // Equality on a non-identifier field does not qualify either.
        assert!(cache
            .try_fast_path("games", &[FilterInput::eq("title", json!("Super Mario 64"))])
            .is_none());
    }

    #[test]
    fn fast_path_ignores_non_identifier_values() {
        let cache = RequestCache::new();
        cache.put("games", &[doc(json!({"_id": "1"}))]);

        // An array value under $eq is not an identifier lookup.
        assert!(cache
            .try_fast_path("games", &[FilterInput::eq("_id", json!(["1"]))])
            .is_none());
    }

    #[test]
    fn clones_share_the_same_cache() {
        let ctx = RequestContext::new();
        let clone = ctx.clone();
        clone.cache().put("games", &[doc(json!({"_id": "1"}))]);

        assert!(ctx.cache().get("games", &DocumentId::String("1".to_string())).is_some());
    }
}
