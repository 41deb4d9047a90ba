use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use jsonschema::paths::JSONPointer;
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use super::traits::SchemaValidator;
use crate::error::SchemaViolation;

/// Default validator backed by `jsonschema`. Reports every violation, not
/// just the first.
///
/// Recognized options: `draft` (4, 6 or 7). Without it the draft is taken
/// from the schema's `$schema` keyword. Compiled schemas are cached per
/// schema and options, so each schema entity compiles once.
#[derive(Default, Clone)]
pub struct JsonSchemaValidator {
    compiled: Arc<RwLock<HashMap<String, Arc<JSONSchema>>>>,
}

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct schemas compiled so far.
    pub fn compiled_len(&self) -> usize {
        self.compiled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn compiled(&self, schema: &Value, options: &Value) -> anyhow::Result<Arc<JSONSchema>> {
        let key = format!("{options}\n{schema}");
        if let Some(compiled) = self
            .compiled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(compiled.clone());
        }

        let mut compile = JSONSchema::options();
        if let Some(draft) = draft(options)? {
            compile.with_draft(draft);
        }
        let compiled = Arc::new(
            compile
                .compile(schema)
                .map_err(|err| anyhow::anyhow!("compile schema: {err}"))?,
        );
        self.compiled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, compiled.clone());
        Ok(compiled)
    }
}

impl std::fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("compiled", &self.compiled_len())
            .finish()
    }
}

#[async_trait]
impl SchemaValidator for JsonSchemaValidator {
    async fn validate(
        &self,
        schema: &Value,
        options: &Value,
        value: &Value,
    ) -> anyhow::Result<Vec<SchemaViolation>> {
        let compiled = self.compiled(schema, options)?;
        let violations = match compiled.validate(value) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|err| SchemaViolation {
                    instance_path: format_pointer(&err.instance_path),
                    schema_path: format_pointer(&err.schema_path),
                    message: err.to_string(),
                })
                .collect(),
        };
        Ok(violations)
    }
}

fn draft(options: &Value) -> anyhow::Result<Option<Draft>> {
    match options.get("draft") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(4) => Ok(Some(Draft::Draft4)),
            Some(6) => Ok(Some(Draft::Draft6)),
            Some(7) => Ok(Some(Draft::Draft7)),
            _ => anyhow::bail!("unsupported schema draft {n}"),
        },
        Some(other) => anyhow::bail!("schema option 'draft' must be a number, got {other}"),
    }
}

fn format_pointer(pointer: &JSONPointer) -> String {
    let text = pointer.to_string();
    if text.is_empty() { "/".into() } else { text }
}
