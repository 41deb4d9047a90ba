use indexmap::IndexMap;
use serde_json::Value;

use super::{ReducerFn, ReducerNode};
use crate::entity::EntityId;
use crate::error::EngineError;

const PIPE: &str = " | ";

/// `{ "$literal": <data> }` keeps `<data>` verbatim in JSON definitions.
pub const LITERAL_KEY: &str = "$literal";

/// Mixed-shape configuration value as authored: JSON, an inline callable, a
/// list of raw reducers or an object of raw reducers.
#[derive(Debug, Clone)]
pub enum RawReducer {
    /// Plain JSON; strings are read as expressions, entity refs or pipes,
    /// arrays as chains and objects as hashes, except `{ "$literal": .. }`.
    Json(Value),
    /// Data taken verbatim, never interpreted as a reducer.
    Literal(Value),
    Function(ReducerFn),
    List(Vec<RawReducer>),
    Object(IndexMap<String, RawReducer>),
}

impl RawReducer {
    pub fn literal(value: impl Into<Value>) -> Self {
        RawReducer::Literal(value.into())
    }

    pub fn object<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<RawReducer>,
    {
        RawReducer::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn list<V: Into<RawReducer>>(items: impl IntoIterator<Item = V>) -> Self {
        RawReducer::List(items.into_iter().map(Into::into).collect())
    }

    /// Items of a list-shaped value, whether authored natively or as JSON.
    pub fn as_list(&self) -> Option<Vec<RawReducer>> {
        match self {
            RawReducer::List(items) => Some(items.clone()),
            RawReducer::Json(Value::Array(items)) => {
                Some(items.iter().cloned().map(RawReducer::Json).collect())
            }
            _ => None,
        }
    }

    /// Members of an object-shaped value, whether authored natively or as JSON.
    pub fn as_object(&self) -> Option<Vec<(String, RawReducer)>> {
        match self {
            RawReducer::Object(entries) => Some(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            RawReducer::Json(Value::Object(map)) => Some(
                map.iter()
                    .map(|(key, value)| (key.clone(), RawReducer::Json(value.clone())))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Plain data, for keys that never hold reducers.
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            RawReducer::Json(value) | RawReducer::Literal(value) => Some(value),
            _ => None,
        }
    }

    pub fn parse(&self) -> Result<ReducerNode, EngineError> {
        match self {
            RawReducer::Json(Value::String(text)) => Ok(parse_string(text)),
            RawReducer::Json(Value::Array(items)) => items
                .iter()
                .map(|item| RawReducer::Json(item.clone()).parse())
                .collect::<Result<Vec<_>, _>>()
                .map(ReducerNode::Chain),
            RawReducer::Json(Value::Object(map)) => {
                if let (1, Some(data)) = (map.len(), map.get(LITERAL_KEY)) {
                    return Ok(ReducerNode::Literal(data.clone()));
                }
                let mut hash = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    hash.insert(key.clone(), RawReducer::Json(value.clone()).parse()?);
                }
                Ok(ReducerNode::Hash(hash))
            }
            RawReducer::Json(other) | RawReducer::Literal(other) => {
                Ok(ReducerNode::Literal(other.clone()))
            }
            RawReducer::Function(f) => Ok(ReducerNode::Function(f.clone())),
            RawReducer::List(items) => items
                .iter()
                .map(RawReducer::parse)
                .collect::<Result<Vec<_>, _>>()
                .map(ReducerNode::Chain),
            RawReducer::Object(entries) => {
                let mut hash = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    hash.insert(key.clone(), value.parse()?);
                }
                Ok(ReducerNode::Hash(hash))
            }
        }
    }
}

fn parse_string(text: &str) -> ReducerNode {
    if text.contains(PIPE) {
        return ReducerNode::Chain(text.split(PIPE).map(parse_string).collect());
    }
    let trimmed = text.trim();
    if trimmed.starts_with('$') {
        return ReducerNode::Transform(trimmed.to_string());
    }
    match EntityId::try_ref(trimmed) {
        Some(id) => ReducerNode::EntityRef(id),
        None => ReducerNode::Literal(Value::String(text.to_string())),
    }
}

impl From<Value> for RawReducer {
    fn from(value: Value) -> Self {
        RawReducer::Json(value)
    }
}

impl From<&str> for RawReducer {
    fn from(value: &str) -> Self {
        RawReducer::Json(Value::String(value.to_string()))
    }
}

impl From<String> for RawReducer {
    fn from(value: String) -> Self {
        RawReducer::Json(Value::String(value))
    }
}

impl From<ReducerFn> for RawReducer {
    fn from(value: ReducerFn) -> Self {
        RawReducer::Function(value)
    }
}

impl From<Vec<RawReducer>> for RawReducer {
    fn from(value: Vec<RawReducer>) -> Self {
        RawReducer::List(value)
    }
}

impl From<IndexMap<String, RawReducer>> for RawReducer {
    fn from(value: IndexMap<String, RawReducer>) -> Self {
        RawReducer::Object(value)
    }
}

/// Authored entity configuration: top-level keys in author order.
#[derive(Debug, Clone, Default)]
pub struct RawDefinition {
    fields: IndexMap<String, RawReducer>,
}

impl RawDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawReducer>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RawReducer>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&RawReducer> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Builds a definition from a JSON object, every member kept as JSON.
    pub fn from_json(value: Value) -> Result<Self, EngineError> {
        match value {
            Value::Object(map) => Ok(Self {
                fields: map
                    .into_iter()
                    .map(|(key, value)| (key, RawReducer::Json(value)))
                    .collect(),
            }),
            other => Err(EngineError::configuration(format!(
                "entity definition must be an object, got {}",
                dp_expr::kind(&other)
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings_parse_by_shape() {
        assert!(matches!(
            RawReducer::from("$foo.bar").parse().unwrap(),
            ReducerNode::Transform(expr) if expr == "$foo.bar"
        ));
        assert!(matches!(
            RawReducer::from("entry:other.1.0").parse().unwrap(),
            ReducerNode::EntityRef(id) if id.as_str() == "entry:other.1.0"
        ));
        assert!(matches!(
            RawReducer::from("plain words").parse().unwrap(),
            ReducerNode::Literal(Value::String(text)) if text == "plain words"
        ));
        assert!(matches!(
            RawReducer::from("nothing:here").parse().unwrap(),
            ReducerNode::Literal(_)
        ));
    }

    #[test]
    fn pipes_become_chains() {
        let node = RawReducer::from("request:source1 | $source").parse().unwrap();
        let ReducerNode::Chain(steps) = node else {
            panic!("expected chain, got {node:?}");
        };
        assert_eq!(steps.len(), 2);
        assert!(matches!(&steps[0], ReducerNode::EntityRef(id) if id.as_str() == "request:source1"));
        assert!(matches!(&steps[1], ReducerNode::Transform(expr) if expr == "$source"));
    }

    #[test]
    fn json_containers_become_chain_and_hash() {
        let chain = RawReducer::from(json!(["$a", "$b"])).parse().unwrap();
        assert!(matches!(chain, ReducerNode::Chain(ref steps) if steps.len() == 2));

        let hash = RawReducer::from(json!({ "x": "$a", "y": 3 })).parse().unwrap();
        let ReducerNode::Hash(members) = hash else {
            panic!("expected hash");
        };
        assert_eq!(members.keys().collect::<Vec<_>>(), vec!["x", "y"]);
        assert!(matches!(members["y"], ReducerNode::Literal(ref v) if v == &json!(3)));
    }

    #[test]
    fn literal_key_escapes_json_data() {
        let node = RawReducer::from(json!({ "$literal": ["a", "b"] })).parse().unwrap();
        assert!(matches!(node, ReducerNode::Literal(ref v) if v == &json!(["a", "b"])));

        let node = RawReducer::from(json!({ "tags": { "$literal": [1, 2] } })).parse().unwrap();
        let ReducerNode::Hash(members) = node else {
            panic!("expected hash");
        };
        assert!(matches!(members["tags"], ReducerNode::Literal(ref v) if v == &json!([1, 2])));

        let node = RawReducer::from(json!({ "$literal": 1, "other": "$a" })).parse().unwrap();
        assert!(matches!(node, ReducerNode::Hash(ref members) if members.len() == 2));
    }

    #[test]
    fn literal_objects_stay_data() {
        let node = RawReducer::literal(json!({ "s1": "source1" })).parse().unwrap();
        assert!(matches!(node, ReducerNode::Literal(ref v) if v == &json!({ "s1": "source1" })));
    }

    #[test]
    fn empty_list_is_identity() {
        assert!(RawReducer::list(Vec::<RawReducer>::new()).parse().unwrap().is_identity());
    }

    #[test]
    fn definitions_from_json_require_objects() {
        let def = RawDefinition::from_json(json!({ "value": "$a", "params": { "x": 1 } })).unwrap();
        assert_eq!(def.keys().collect::<Vec<_>>(), vec!["value", "params"]);
        assert!(RawDefinition::from_json(json!([1, 2])).is_err());
    }
}
