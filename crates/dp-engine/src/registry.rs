use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::entity::{self, Entity};
use crate::error::EngineError;
use crate::reducer::RawDefinition;

/// Immutable set of normalized entities, keyed by full id.
#[derive(Debug, Default)]
pub struct Registry {
    entities: IndexMap<String, Arc<Entity>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Entity>> {
        self.entities.get(id).cloned()
    }

    pub fn require(&self, id: &str) -> Result<Arc<Entity>, EngineError> {
        self.get(id)
            .ok_or_else(|| EngineError::EntityNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Collects raw definitions; [`RegistryBuilder::build`] normalizes them all.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    definitions: Vec<(String, RawDefinition)>,
}

impl RegistryBuilder {
    pub fn entity(mut self, id: impl Into<String>, raw: RawDefinition) -> Self {
        self.add(id, raw);
        self
    }

    pub fn add(&mut self, id: impl Into<String>, raw: RawDefinition) {
        self.definitions.push((id.into(), raw));
    }

    /// Adds every member of a `{ "<id>": { definition } }` object.
    pub fn entities_json(mut self, entities: Value) -> Result<Self, EngineError> {
        let Value::Object(map) = entities else {
            return Err(EngineError::configuration(format!(
                "entities must be an object keyed by id, got {}",
                dp_expr::kind(&entities)
            )));
        };
        for (id, definition) in map {
            let raw = RawDefinition::from_json(definition).map_err(|err| err.in_entity(&id))?;
            self.add(id, raw);
        }
        Ok(self)
    }

    /// Normalizes every definition. The first failure aborts the build.
    pub fn build(self) -> Result<Registry, EngineError> {
        let mut entities = IndexMap::with_capacity(self.definitions.len());
        for (id, raw) in &self.definitions {
            if entities.contains_key(id) {
                return Err(EngineError::configuration(format!(
                    "entity '{id}' is defined more than once"
                )));
            }
            let entity = entity::create(id, raw)?;
            entities.insert(id.clone(), Arc::new(entity));
        }
        debug!(entities = entities.len(), "registry built");
        Ok(Registry { entities })
    }
}
