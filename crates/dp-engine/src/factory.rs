//! Construction-time normalization shared by every entity type.
//!
//! Everything here is pure and synchronous: a malformed definition fails with
//! `EngineError::Configuration` before any resolution can start.

use serde_json::{Map, Value};

use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::EngineError;
use crate::reducer::{ComposeKind, ComposeStep, RawDefinition, RawReducer, ReducerNode};

/// Keys every entity type accepts.
pub const LIFECYCLE_KEYS: [&str; 5] = ["before", "value", "after", "error", "params"];

/// The four lifecycle slots plus params, before the type-specific payload is attached.
#[derive(Debug, Default)]
pub struct Lifecycle {
    pub before: ReducerNode,
    pub value: ReducerNode,
    pub after: ReducerNode,
    pub error: ReducerNode,
    pub params: Value,
}

impl Lifecycle {
    pub(crate) fn into_entity(self, id: EntityId, kind: EntityKind) -> Entity {
        Entity {
            id,
            before: self.before,
            value: self.value,
            after: self.after,
            error: self.error,
            params: self.params,
            kind,
        }
    }
}

pub fn lifecycle(raw: &RawDefinition) -> Result<Lifecycle, EngineError> {
    let params = match raw.get("params") {
        None => Value::Object(Map::new()),
        Some(params) => match params.as_data() {
            Some(value @ Value::Object(_)) => value.clone(),
            _ => return Err(EngineError::configuration("params must be an object")),
        },
    };
    Ok(Lifecycle {
        before: slot(raw, "before")?,
        value: slot(raw, "value")?,
        after: slot(raw, "after")?,
        error: slot(raw, "error")?,
        params,
    })
}

/// Parses `key` into a reducer, identity when absent.
pub fn slot(raw: &RawDefinition, key: &str) -> Result<ReducerNode, EngineError> {
    raw.get(key)
        .map(RawReducer::parse)
        .transpose()
        .map(Option::unwrap_or_default)
}

/// Rejects keys that are neither lifecycle keys nor in `extra`.
pub fn check_keys(raw: &RawDefinition, extra: &[&str]) -> Result<(), EngineError> {
    let unknown: Vec<&str> = raw
        .keys()
        .filter(|key| !LIFECYCLE_KEYS.contains(key) && !extra.contains(key))
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(EngineError::configuration(format!(
            "unsupported definition keys: {}",
            unknown.join(", ")
        )))
    }
}

/// Builds the composition steps from either `compose` or the inline modifiers
/// in `allowed`, which also fixes the inline precedence order.
pub fn compose_steps(
    raw: &RawDefinition,
    allowed: &[ComposeKind],
) -> Result<Vec<ComposeStep>, EngineError> {
    let inline: Vec<ComposeKind> = allowed
        .iter()
        .copied()
        .filter(|kind| raw.contains_key(kind.as_str()))
        .collect();

    let Some(compose) = raw.get("compose") else {
        return inline
            .into_iter()
            .map(|kind| {
                let transform = raw.get(kind.as_str()).ok_or_else(|| {
                    EngineError::configuration(format!("missing modifier '{kind}'"))
                })?;
                step(kind, transform)
            })
            .collect();
    };

    if !inline.is_empty() {
        let keys: Vec<&str> = inline.iter().map(|kind| kind.as_str()).collect();
        return Err(EngineError::configuration(format!(
            "compose can not be mixed with inline modifiers ({})",
            keys.join(", ")
        )));
    }

    let items = compose
        .as_list()
        .ok_or_else(|| EngineError::configuration("compose must be an array"))?;
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let entries = item.as_object().unwrap_or_default();
            let [(key, transform)] = entries.as_slice() else {
                return Err(EngineError::configuration(format!(
                    "compose[{idx}] must be an object with exactly one modifier key"
                )));
            };
            let kind = ComposeKind::parse(key)
                .filter(|kind| allowed.contains(kind))
                .ok_or_else(|| {
                    let expected: Vec<&str> = allowed.iter().map(|kind| kind.as_str()).collect();
                    EngineError::configuration(format!(
                        "compose[{idx}]: unsupported modifier '{key}' (expected one of: {})",
                        expected.join(", ")
                    ))
                })?;
            step(kind, transform)
        })
        .collect()
}

fn step(kind: ComposeKind, raw: &RawReducer) -> Result<ComposeStep, EngineError> {
    let transform = if kind.takes_literal() {
        let data = raw.as_data().ok_or_else(|| {
            EngineError::configuration(format!("{kind} takes plain data, not a reducer"))
        })?;
        let well_formed = match kind {
            ComposeKind::AddValues => data.is_object(),
            _ => data
                .as_array()
                .is_some_and(|keys| keys.iter().all(Value::is_string)),
        };
        if !well_formed {
            let expected = match kind {
                ComposeKind::AddValues => "an object",
                _ => "an array of key names",
            };
            return Err(EngineError::configuration(format!(
                "{kind} must be {expected}"
            )));
        }
        ReducerNode::Literal(data.clone())
    } else {
        raw.parse()?
    };
    Ok(ComposeStep { kind, transform })
}
