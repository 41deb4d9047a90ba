use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::debug;

use super::{Entity, EntityKind};
use crate::accumulator::Accumulator;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::reducer::{self, RawDefinition};

/// JSON schema plus validator options, both taken verbatim from the definition.
#[derive(Debug, Clone)]
pub struct SchemaSpec {
    pub schema: Value,
    pub options: Value,
}

pub(super) fn create(raw: &RawDefinition) -> Result<EntityKind, EngineError> {
    let schema = match raw.get("schema").map(|raw| raw.as_data()) {
        Some(Some(schema @ (Value::Object(_) | Value::Bool(_)))) => schema.clone(),
        Some(_) => return Err(EngineError::configuration("schema must be a JSON schema object")),
        None => return Err(EngineError::configuration("schema entities require a schema")),
    };
    let options = match raw.get("options").map(|raw| raw.as_data()) {
        None => Value::Object(Map::new()),
        Some(Some(options @ Value::Object(_))) => options.clone(),
        Some(_) => return Err(EngineError::configuration("options must be an object")),
    };
    Ok(EntityKind::Schema(SchemaSpec { schema, options }))
}

/// Validates the working value; passes it through unchanged when it conforms.
pub(super) fn resolve<'a>(
    engine: &'a Engine,
    acc: Accumulator,
    entity: &'a Entity,
    spec: &'a SchemaSpec,
) -> BoxFuture<'a, Result<Accumulator, EngineError>> {
    async move {
        let acc = reducer::resolve(engine, acc, &entity.value).await?;
        let errors = engine
            .validator()
            .validate(&spec.schema, &spec.options, &acc.value)
            .await
            .map_err(EngineError::Validator)?;
        if errors.is_empty() {
            return Ok(acc);
        }
        debug!(entity = %entity.id, errors = errors.len(), "schema validation failed");
        Err(EngineError::InvalidSchema {
            message: format!(
                "{} failed schema validation with {} error(s)",
                entity.id,
                errors.len()
            ),
            errors,
        })
    }
    .boxed()
}
