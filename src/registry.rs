//! Entity registry: logical entity names mapped to their controllers.
//!
//! Entities are declared with an explicit [`EntityDescriptor`]: names and
//! typed fields, with cross-entity references expressed *by logical name* so
//! an entity may reference one that is registered later. Registration is
//! two-phase: [`Registry::register`] declares each shape, and
//! [`Registry::link`] afterwards verifies every reference target exists.
//! Built once at startup; read-only afterward.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::controller::Controller;
use crate::error::Error;
use crate::store::DocumentStore;

/// Scalar field types an entity may declare.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScalarKind {
    Id,
    String,
    Int,
    Float,
    Boolean,
    Json,
}

/// Declared type of one entity field: a scalar, or a reference to another
/// entity (singular or list).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarKind),
    Reference {
        /// Logical (singular) name of the referenced entity.
        entity: String,
        /// Whether the field stores a list of identifiers.
        multiple: bool,
    },
}

impl FieldKind {
    /// A singular reference to another entity.
    pub fn reference(entity: impl Into<String>) -> Self {
        Self::Reference {
            entity: entity.into(),
            multiple: false,
        }
    }

    /// A list of references to another entity.
    pub fn reference_list(entity: impl Into<String>) -> Self {
        Self::Reference {
            entity: entity.into(),
            multiple: true,
        }
    }

    /// Logical name of the referenced entity, if this is a reference field.
    pub fn referenced_entity(&self) -> Option<&str> {
        match self {
            Self::Reference { entity, .. } => Some(entity),
            Self::Scalar(_) => None,
        }
    }
}

/// Declared shape of an entity: names, backing collection, typed fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityDescriptor {
    singular: String,
    plural: String,
    collection: Option<String>,
    fields: BTreeMap<String, FieldKind>,
}

impl EntityDescriptor {
    pub fn new(singular: impl Into<String>, plural: impl Into<String>) -> Self {
        Self {
            singular: singular.into(),
            plural: plural.into(),
            collection: None,
            fields: BTreeMap::new(),
        }
    }

    /// Override the backing collection name (defaults to the plural form).
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(name.into(), kind);
        self
    }

    pub fn scalar(self, name: impl Into<String>, kind: ScalarKind) -> Self {
        self.field(name, FieldKind::Scalar(kind))
    }

    pub fn reference(self, name: impl Into<String>, entity: impl Into<String>) -> Self {
        self.field(name, FieldKind::reference(entity))
    }

    pub fn reference_list(self, name: impl Into<String>, entity: impl Into<String>) -> Self {
        self.field(name, FieldKind::reference_list(entity))
    }

    /// Logical name the entity is registered and looked up under.
    pub fn singular(&self) -> &str {
        &self.singular
    }

    pub fn plural(&self) -> &str {
        &self.plural
    }

    /// Backing collection name: the explicit override, or the plural form.
    pub fn collection_name(&self) -> &str {
        self.collection.as_deref().unwrap_or(&self.plural)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldKind)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), kind))
    }
}

/// Shared controller table, keyed by the entity's logical name.
///
/// Controllers hold a handle to this table so reference targets can be
/// looked up by name at list time, which is also what makes forward
/// references work before [`Registry::link`] has run.
#[derive(Debug, Default)]
pub(crate) struct ControllerTable {
    inner: RwLock<HashMap<String, Arc<Controller>>>,
}

impl ControllerTable {
    pub(crate) fn get(&self, name: &str) -> Option<Arc<Controller>> {
        self.inner.read().get(name).cloned()
    }

    fn insert(&self, name: String, controller: Arc<Controller>) {
        self.inner.write().insert(name, controller);
    }

    fn all(&self) -> Vec<Arc<Controller>> {
        self.inner.read().values().cloned().collect()
    }
}

/// The registry owns the entity-name-to-controller association for the
/// process lifetime.
#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn DocumentStore>,
    controllers: Arc<ControllerTable>,
}

impl Registry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            controllers: Arc::new(ControllerTable::default()),
        }
    }

    /// Register an entity and bind a controller to it.
    ///
    /// Fails when the descriptor carries no name. Re-registering the same
    /// logical name overwrites the previous binding; last write wins, there
    /// is no dedup guard.
    pub fn register(&self, entity: EntityDescriptor) -> Result<Arc<Controller>, Error> {
        if entity.singular().trim().is_empty() || entity.plural().trim().is_empty() {
            return Err(Error::Registration("no name defined for entity".to_string()));
        }

        let name = entity.singular().to_string();
        let controller = Arc::new(Controller::new(
            entity,
            Arc::clone(&self.store),
            Arc::clone(&self.controllers),
        ));
        self.controllers.insert(name.clone(), Arc::clone(&controller));
        tracing::debug!(entity = %name, collection = %controller.collection(), "registered entity");

        Ok(controller)
    }

    /// Controller bound to a logical entity name; `None` when unregistered.
    pub fn lookup(&self, name: &str) -> Option<Arc<Controller>> {
        self.controllers.get(name)
    }

    /// Second registration phase: verify that every reference field targets
    /// a registered entity. Call once all entities are declared; startup
    /// code is expected to fail fast on the error.
    pub fn link(&self) -> Result<(), Error> {
        for controller in self.controllers.all() {
            for (field, kind) in controller.entity().fields() {
                if let Some(target) = kind.referenced_entity() {
                    if self.controllers.get(target).is_none() {
                        return Err(Error::Registration(format!(
                            "field `{field}` of entity `{}` references unregistered entity `{target}`",
                            controller.entity().singular()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// All registered controllers, for the schema facility to enumerate.
    pub fn controllers(&self) -> Vec<Arc<Controller>> {
        self.controllers.all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn registry() -> Registry {
        Registry::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn register_without_a_name_fails() {
        let registry = registry();
        let err = registry
            .register(EntityDescriptor::new("", "games"))
            .unwrap_err();
        assert_matches!(err, Error::Registration(_));

        let err = registry
            .register(EntityDescriptor::new("game", " "))
            .unwrap_err();
        assert_matches!(err, Error::Registration(_));
    }

    #[test]
    fn lookup_returns_none_for_unregistered_names() {
        let registry = registry();
        registry
            .register(EntityDescriptor::new("game", "games"))
            .unwrap();

        assert!(registry.lookup("game").is_some());
        assert!(registry.lookup("publisher").is_none());
    }

    #[test]
    fn reregistration_is_last_write_wins() {
        let registry = registry();
        registry
            .register(EntityDescriptor::new("game", "games"))
            .unwrap();
        registry
            .register(EntityDescriptor::new("game", "games").collection("titles"))
            .unwrap();

        let controller = registry.lookup("game").unwrap();
        assert_eq!(controller.collection(), "titles");
    }

    #[test]
    fn collection_defaults_to_plural() {
        let entity = EntityDescriptor::new("game", "games");
        assert_eq!(entity.collection_name(), "games");

        let entity = EntityDescriptor::new("game", "games").collection("retro_games");
        assert_eq!(entity.collection_name(), "retro_games");
    }

    #[test]
    fn link_accepts_forward_references() {
        let registry = registry();
        // `publisher` references `game` before `game` is registered.
        registry
            .register(
                EntityDescriptor::new("publisher", "publishers")
                    .scalar("name", ScalarKind::String)
                    .reference_list("games", "game"),
            )
            .unwrap();
        registry
            .register(EntityDescriptor::new("game", "games").scalar("title", ScalarKind::String))
            .unwrap();

        registry.link().unwrap();
    }

    #[test]
    fn link_rejects_dangling_references() {
        let registry = registry();
        registry
            .register(
                EntityDescriptor::new("game", "games").reference("publisher", "publisher"),
            )
            .unwrap();

        let err = registry.link().unwrap_err();
        assert_matches!(err, Error::Registration(message) if message.contains("publisher"));
    }
}
