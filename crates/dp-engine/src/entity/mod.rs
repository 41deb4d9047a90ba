//! Entity ids, the normalized entity record, and per-type factories and
//! value resolution.

mod collection;
mod control;
mod entry;
mod hash;
pub(crate) mod lifecycle;
mod model;
mod request;
mod schema;

use std::fmt;
use std::str::FromStr;

use futures::future::BoxFuture;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::accumulator::Accumulator;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::factory;
use crate::reducer::{ComposeStep, RawDefinition, ReducerNode, Select};

pub use request::RequestSpec;
pub use schema::SchemaSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
    Entry,
    Model,
    Collection,
    Hash,
    Schema,
    Request,
    Control,
}

impl EntityType {
    pub const ALL: [EntityType; 7] = [
        EntityType::Entry,
        EntityType::Model,
        EntityType::Collection,
        EntityType::Hash,
        EntityType::Schema,
        EntityType::Request,
        EntityType::Control,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Entry => "entry",
            EntityType::Model => "model",
            EntityType::Collection => "collection",
            EntityType::Hash => "hash",
            EntityType::Schema => "schema",
            EntityType::Request => "request",
            EntityType::Control => "control",
        }
    }

    /// Definition keys accepted on top of the common lifecycle keys.
    fn extra_keys(self) -> &'static [&'static str] {
        match self {
            EntityType::Entry => &[],
            EntityType::Model => &["sources", "compose", "filter", "map", "find"],
            EntityType::Collection => &["compose", "filter", "map", "find"],
            EntityType::Hash => &[
                "compose",
                "omitKeys",
                "pickKeys",
                "mapKeys",
                "addValues",
                "addKeys",
            ],
            EntityType::Schema => &["schema", "options"],
            EntityType::Request => &["url", "options"],
            EntityType::Control => &["select", "default"],
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = EngineError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == tag)
            .ok_or_else(|| EngineError::configuration(format!("unknown entity type '{tag}'")))
    }
}

/// `type:name[.version]` identifier; the full string is the lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    raw: String,
    ty: EntityType,
}

impl EntityId {
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let (tag, name) = raw.split_once(':').ok_or_else(|| {
            EngineError::configuration(format!(
                "entity id '{raw}' must have the form type:name[.version]"
            ))
        })?;
        let ty: EntityType = tag.parse()?;
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == ':' || c == '|') {
            return Err(EngineError::configuration(format!(
                "entity id '{raw}' has an invalid name"
            )));
        }
        Ok(Self {
            raw: raw.to_string(),
            ty,
        })
    }

    /// Reads `text` as an entity reference when it is shaped like one.
    pub fn try_ref(text: &str) -> Option<Self> {
        Self::parse(text).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn entity_type(&self) -> EntityType {
        self.ty
    }

    /// Name including any version suffix.
    pub fn name(&self) -> &str {
        &self.raw[self.ty.as_str().len() + 1..]
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        EntityId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Normalized, executable entity record. Immutable once registered.
#[derive(Debug)]
pub struct Entity {
    pub id: EntityId,
    pub before: ReducerNode,
    pub value: ReducerNode,
    pub after: ReducerNode,
    /// Identity means no error reducer is defined.
    pub error: ReducerNode,
    pub params: Value,
    pub kind: EntityKind,
}

#[derive(Debug)]
pub enum EntityKind {
    Entry,
    Model {
        sources: Option<ReducerNode>,
        compose: Vec<ComposeStep>,
    },
    Collection {
        compose: Vec<ComposeStep>,
    },
    Hash {
        compose: Vec<ComposeStep>,
    },
    Schema(SchemaSpec),
    Request(RequestSpec),
    Control(Select),
}

impl Entity {
    pub fn entity_type(&self) -> EntityType {
        self.id.entity_type()
    }

    pub fn has_error_reducer(&self) -> bool {
        !self.error.is_identity()
    }

    /// `params.trace` switches tracing on for this entity and everything below it.
    pub fn traced(&self) -> bool {
        matches!(self.params.get("trace"), Some(Value::Bool(true)))
    }
}

/// Normalizes one raw definition into an [`Entity`]. Pure and synchronous.
pub fn create(id: &str, raw: &RawDefinition) -> Result<Entity, EngineError> {
    let id = EntityId::parse(id)?;
    build(&id, raw).map_err(|err| err.in_entity(id.as_str()))
}

fn build(id: &EntityId, raw: &RawDefinition) -> Result<Entity, EngineError> {
    let ty = id.entity_type();
    factory::check_keys(raw, ty.extra_keys())?;
    let base = factory::lifecycle(raw)?;
    let kind = match ty {
        EntityType::Entry => entry::create(raw)?,
        EntityType::Model => model::create(raw)?,
        EntityType::Collection => collection::create(raw)?,
        EntityType::Hash => hash::create(raw)?,
        EntityType::Schema => schema::create(raw)?,
        EntityType::Request => request::create(raw)?,
        EntityType::Control => control::create(raw)?,
    };
    Ok(base.into_entity(id.clone(), kind))
}

/// Type-specific `value` resolution, run between the `before` and `after` stages.
pub(crate) fn resolve_value<'a>(
    engine: &'a Engine,
    acc: Accumulator,
    entity: &'a Entity,
) -> BoxFuture<'a, Result<Accumulator, EngineError>> {
    match &entity.kind {
        EntityKind::Entry => entry::resolve(engine, acc, entity),
        EntityKind::Model { sources, compose } => {
            model::resolve(engine, acc, entity, sources.as_ref(), compose)
        }
        EntityKind::Collection { compose } => collection::resolve(engine, acc, entity, compose),
        EntityKind::Hash { compose } => hash::resolve(engine, acc, entity, compose),
        EntityKind::Schema(spec) => schema::resolve(engine, acc, entity, spec),
        EntityKind::Request(spec) => request::resolve(engine, acc, entity, spec),
        EntityKind::Control(select) => control::resolve(engine, acc, select),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ids_with_versions() {
        let id = EntityId::parse("schema:a.1.0").unwrap();
        assert_eq!(id.entity_type(), EntityType::Schema);
        assert_eq!(id.name(), "a.1.0");
        assert_eq!(id.to_string(), "schema:a.1.0");
    }

    #[test]
    fn rejects_malformed_ids() {
        for raw in ["entry", "bogus:thing", "entry:", "entry:has space", "entry:a:b"] {
            let err = EntityId::parse(raw).unwrap_err();
            assert_eq!(err.name(), "ConfigurationError", "{raw}");
        }
    }

    #[test]
    fn ids_serialize_as_strings() {
        let id = EntityId::parse("hash:x").unwrap();
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, serde_json::json!("hash:x"));
        let back: EntityId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
    }
}
