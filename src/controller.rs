//! Controllers and the list operation.
//!
//! One controller is bound to each registered entity. Its list operation is
//! the composition point of the layer: request cache fast path, query
//! translation, store execution, reference wrapping and cache population.

use std::sync::Arc;

use serde_json::Value;

use crate::context::RequestContext;
use crate::document::{Document, FieldValue};
use crate::error::Error;
use crate::query::{self, ListArgs};
use crate::registry::{ControllerTable, EntityDescriptor};
use crate::resolver::ReferenceResolver;
use crate::store::DocumentStore;

/// Runtime unit bound to one entity: owns the collection name and exposes
/// the list operation. Obtained from [`Registry::register`] or
/// [`Registry::lookup`].
///
/// [`Registry::register`]: crate::registry::Registry::register
/// [`Registry::lookup`]: crate::registry::Registry::lookup
pub struct Controller {
    entity: EntityDescriptor,
    collection: String,
    store: Arc<dyn DocumentStore>,
    controllers: Arc<ControllerTable>,
}

impl Controller {
    pub(crate) fn new(
        entity: EntityDescriptor,
        store: Arc<dyn DocumentStore>,
        controllers: Arc<ControllerTable>,
    ) -> Self {
        let collection = entity.collection_name().to_string();
        Self {
            entity,
            collection,
            store,
            controllers,
        }
    }

    pub fn entity(&self) -> &EntityDescriptor {
        &self.entity
    }

    /// Backing collection the controller lists from.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Name the schema facility derives the list operation from: the
    /// entity's plural form (casing is the facility's concern).
    pub fn query_name(&self) -> &str {
        self.entity.plural()
    }

    /// List documents matching the given arguments.
    ///
    /// Reuses the caller-supplied request context, or creates a fresh one
    /// when `ctx` is `None`. A single-identifier equality filter whose
    /// document is already cached is served without a store round-trip;
    /// everything else is translated and executed against the store.
    /// Returned documents have their reference-typed fields wrapped as
    /// deferred resolvers sharing this request's context, and are indexed
    /// into the request cache by identifier.
    ///
    /// Store errors propagate unchanged; invalid pagination arguments fail
    /// with [`Error::InvalidArgument`] before any store call.
    pub async fn list(
        &self,
        args: &ListArgs,
        ctx: Option<&RequestContext>,
    ) -> Result<Vec<Document>, Error> {
        let created;
        let ctx = match ctx {
            Some(ctx) => ctx,
            None => {
                created = RequestContext::new();
                &created
            }
        };

        let plan = query::translate(args)?;

        if let Some(filter) = args.filter.as_deref() {
            if let Some(cached) = ctx.cache().try_fast_path(&self.collection, filter) {
                tracing::debug!(
                    entity = %self.entity.singular(),
                    collection = %self.collection,
                    "identifier lookup served from request cache"
                );
                return Ok(vec![cached]);
            }
        }

        // Fields whose declared type is a registered entity get wrapped
        // below; references to entities nobody registered keep their raw
        // value.
        let mut reference_fields: Vec<(&str, Arc<Controller>)> = Vec::new();
        for (name, kind) in self.entity.fields() {
            // The identifier field itself is never treated as a reference;
            // the cache indexes wrapped documents by it.
            if name == query::ID_FIELD {
                continue;
            }
            if let Some(target) = kind.referenced_entity() {
                match self.controllers.get(target) {
                    Some(controller) => reference_fields.push((name, controller)),
                    None => tracing::debug!(
                        entity = %self.entity.singular(),
                        field = name,
                        target,
                        "reference target not registered, leaving raw value"
                    ),
                }
            }
        }

        tracing::debug!(
            entity = %self.entity.singular(),
            collection = %self.collection,
            query = ?plan.query,
            limit = plan.options.limit,
            skip = plan.options.skip,
            "executing store query"
        );
        let raw = self
            .store
            .find(&self.collection, &plan.query, &plan.options)
            .await?;

        let mut documents = Vec::with_capacity(raw.len());
        for row in raw {
            let mut doc = Document::from_raw(row);
            for (field, target) in &reference_fields {
                wrap_reference(&mut doc, field, target, ctx);
            }
            documents.push(doc);
        }

        ctx.cache().put(&self.collection, &documents);

        Ok(documents)
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("entity", &self.entity.singular())
            .field("collection", &self.collection)
            .finish()
    }
}

/// Replace a reference field's raw identifier value with a deferred
/// resolver. A field absent from the document still gets a resolver (bound
/// to null); it resolves to nothing.
fn wrap_reference(doc: &mut Document, field: &str, target: &Arc<Controller>, ctx: &RequestContext) {
    let raw = match doc.get(field) {
        Some(FieldValue::Value(value)) => value.clone(),
        Some(FieldValue::Reference(_)) => return,
        None => Value::Null,
    };
    doc.set(
        field,
        FieldValue::Reference(ReferenceResolver::new(
            field,
            raw,
            Arc::clone(target),
            ctx.clone(),
        )),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FilterInput;
    use crate::registry::{EntityDescriptor, Registry, ScalarKind};
    use crate::store::MemoryStore;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn game_registry() -> (Arc<MemoryStore>, Registry) {
        let store = Arc::new(MemoryStore::new());
        store.insert_many(
            "games",
            vec![
                json!({"_id": "1", "title": "Super Mario 64", "year": 1996, "publisher": "3"}),
                json!({"_id": "2", "title": "Banjo-Kazooie", "year": 1998, "publisher": "3"}),
            ],
        );
        store.insert_many("publishers", vec![json!({"_id": "3", "name": "Nintendo"})]);

        let registry = Registry::new(Arc::clone(&store) as Arc<dyn DocumentStore>);
        registry
            .register(
                EntityDescriptor::new("game", "games")
                    .scalar("title", ScalarKind::String)
                    .scalar("year", ScalarKind::Int)
                    .reference("publisher", "publisher"),
            )
            .unwrap();
        registry
            .register(
                EntityDescriptor::new("publisher", "publishers").scalar("name", ScalarKind::String),
            )
            .unwrap();
        registry.link().unwrap();

        (store, registry)
    }

    #[tokio::test]
    async fn cached_identifier_lookup_skips_the_store() {
        let (store, registry) = game_registry();
        let games = registry.lookup("game").unwrap();
        let ctx = RequestContext::new();

        games.list(&ListArgs::new(), Some(&ctx)).await.unwrap();
        assert_eq!(store.find_calls(), 1);

        let hit = games
            .list(
                &ListArgs::new().filter(vec![FilterInput::eq("_id", json!("2"))]),
                Some(&ctx),
            )
            .await
            .unwrap();
        assert_eq!(store.find_calls(), 1);
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].value("title"), Some(&json!("Banjo-Kazooie")));
    }

    #[tokio::test]
    async fn membership_lookup_always_reaches_the_store() {
        let (store, registry) = game_registry();
        let games = registry.lookup("game").unwrap();
        let ctx = RequestContext::new();

        games.list(&ListArgs::new(), Some(&ctx)).await.unwrap();

        games
            .list(
                &ListArgs::new().filter(vec![FilterInput::is_in(
                    "_id",
                    vec![json!("1"), json!("2")],
                )]),
                Some(&ctx),
            )
            .await
            .unwrap();
        assert_eq!(store.find_calls(), 2);
    }

    #[tokio::test]
    async fn results_are_cached_by_identifier() {
        let (_, registry) = game_registry();
        let games = registry.lookup("game").unwrap();
        let ctx = RequestContext::new();

        let result = games.list(&ListArgs::new(), Some(&ctx)).await.unwrap();
        for doc in &result {
            let id = doc.id().unwrap();
            assert!(ctx.cache().get("games", &id).is_some());
        }
    }

    #[tokio::test]
    async fn reference_fields_are_wrapped_and_scalars_left_alone() {
        let (_, registry) = game_registry();
        let games = registry.lookup("game").unwrap();

        let result = games.list(&ListArgs::new(), None).await.unwrap();
        let game = &result[0];
        assert!(game.reference("publisher").is_some());
        assert!(game.value("publisher").is_none());
        assert_eq!(game.value("title"), Some(&json!("Super Mario 64")));
    }

    #[tokio::test]
    async fn unregistered_reference_target_keeps_raw_value() {
        let store = Arc::new(MemoryStore::new());
        store.insert_many("games", vec![json!({"_id": "1", "developer": "4"})]);

        let registry = Registry::new(store);
        let games = registry
            .register(EntityDescriptor::new("game", "games").reference("developer", "developer"))
            .unwrap();

        let result = games.list(&ListArgs::new(), None).await.unwrap();
        assert_eq!(result[0].value("developer"), Some(&json!("4")));
        assert!(result[0].reference("developer").is_none());
    }

    #[tokio::test]
    async fn invalid_pagination_fails_before_the_store() {
        let (store, registry) = game_registry();
        let games = registry.lookup("game").unwrap();

        let err = games
            .list(&ListArgs::new().limit(-1), None)
            .await
            .unwrap_err();
        assert_matches!(err, Error::InvalidArgument(_));
        assert_eq!(store.find_calls(), 0);
    }
}
