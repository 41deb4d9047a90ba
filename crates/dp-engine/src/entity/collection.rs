use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use super::{Entity, EntityKind};
use crate::accumulator::Accumulator;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::factory;
use crate::reducer::{self, ComposeKind, ComposeStep, RawDefinition};

pub(super) fn create(raw: &RawDefinition) -> Result<EntityKind, EngineError> {
    Ok(EntityKind::Collection {
        compose: factory::compose_steps(raw, ComposeKind::COLLECTION)?,
    })
}

pub(super) fn resolve<'a>(
    engine: &'a Engine,
    acc: Accumulator,
    entity: &'a Entity,
    compose: &'a [ComposeStep],
) -> BoxFuture<'a, Result<Accumulator, EngineError>> {
    async move {
        let acc = reducer::resolve(engine, acc, &entity.value).await?;
        if !matches!(acc.value, Value::Array(_)) {
            return Err(EngineError::type_mismatch(
                entity.id.as_str(),
                "array",
                &acc.value,
            ));
        }
        reducer::apply_compose(engine, acc, compose).await
    }
    .boxed()
}
