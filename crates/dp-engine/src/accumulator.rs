use std::sync::Arc;

use dp_expr::Scope;
use serde_json::{Map, Value};

use crate::entity::Entity;
use crate::error::{EngineError, ErrorInfo};

/// Caller options for one `transform` call.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Auxiliary caller data, reachable as `$..locals`.
    pub locals: Value,
    pub trace: bool,
    /// Unrecognized keys, passed through to every accumulator untouched.
    pub extras: Map<String, Value>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            locals: Value::Object(Map::new()),
            trace: false,
            extras: Map::new(),
        }
    }
}

impl TransformOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locals(mut self, locals: Value) -> Self {
        self.locals = locals;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    /// Reads `{ locals, trace, context, .. }`. `context` and any other key are
    /// kept in `extras`.
    pub fn from_json(value: Value) -> Result<Self, EngineError> {
        let mut map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(EngineError::type_mismatch("transform options", "object", &other));
            }
        };
        let locals = match map.remove("locals") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(locals @ Value::Object(_)) => locals,
            Some(other) => {
                return Err(EngineError::type_mismatch("options.locals", "object", &other));
            }
        };
        let trace = match map.remove("trace") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => flag,
            Some(other) => {
                return Err(EngineError::type_mismatch("options.trace", "bool", &other));
            }
        };
        Ok(Self {
            locals,
            trace,
            extras: map,
        })
    }
}

/// Per-call execution state threaded through every stage.
///
/// Nested resolutions work on derived copies: `locals`, `trace`, `extras` and
/// the resolution `path` are inherited, `value`, `context` and `params` are
/// their own.
#[derive(Debug, Clone)]
pub struct Accumulator {
    pub value: Value,
    /// Entity currently executing; a reference into the registry.
    pub context: Option<Arc<Entity>>,
    pub params: Value,
    pub locals: Value,
    pub trace: bool,
    /// Entity ids from the outermost call down to `context`.
    pub path: Vec<String>,
    /// Set while an `error` reducer runs.
    pub error: Option<ErrorInfo>,
    pub extras: Map<String, Value>,
}

impl Accumulator {
    pub fn new(value: Value, options: &TransformOptions) -> Self {
        Self {
            value,
            context: None,
            params: Value::Object(Map::new()),
            locals: options.locals.clone(),
            trace: options.trace,
            path: Vec::new(),
            error: None,
            extras: options.extras.clone(),
        }
    }

    /// Child accumulator for resolving `entity`.
    pub fn derive(&self, entity: Arc<Entity>) -> Self {
        let mut path = self.path.clone();
        path.push(entity.id.to_string());
        Self {
            value: self.value.clone(),
            params: entity.params.clone(),
            locals: self.locals.clone(),
            trace: self.trace || entity.traced(),
            path,
            error: None,
            extras: self.extras.clone(),
            context: Some(entity),
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }

    /// Copy of this accumulator holding `value`, e.g. one collection element.
    pub fn derive_value(&self, value: Value) -> Self {
        self.clone().with_value(value)
    }

    pub fn context_id(&self) -> Option<&str> {
        self.context.as_ref().map(|entity| entity.id.as_str())
    }

    pub fn scope(&self) -> Scope<'_> {
        Scope::new(&self.value)
            .with_locals(&self.locals)
            .with_params(&self.params)
    }

    pub fn path_display(&self) -> String {
        self.path.join(" > ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_from_json_keep_unknown_keys() {
        let options = TransformOptions::from_json(json!({
            "locals": { "itemPath": "/a" },
            "trace": true,
            "context": { "tenant": "t1" },
            "requestId": "r-9"
        }))
        .unwrap();
        assert_eq!(options.locals, json!({ "itemPath": "/a" }));
        assert!(options.trace);
        assert_eq!(options.extras["context"], json!({ "tenant": "t1" }));
        assert_eq!(options.extras["requestId"], json!("r-9"));
    }

    #[test]
    fn options_reject_non_object_locals() {
        let err = TransformOptions::from_json(json!({ "locals": [1] })).unwrap_err();
        assert_eq!(err.name(), "TypeMismatch");
    }

    #[test]
    fn root_accumulator_carries_options() {
        let options = TransformOptions::new()
            .with_locals(json!({ "k": 1 }))
            .with_extra("requestId", json!("r-1"));
        let acc = Accumulator::new(json!([1, 2]), &options);
        assert_eq!(acc.value, json!([1, 2]));
        assert!(acc.context.is_none());
        assert_eq!(acc.scope().locals, &json!({ "k": 1 }));
        assert_eq!(acc.extras["requestId"], json!("r-1"));
    }
}
