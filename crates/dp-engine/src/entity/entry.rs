use futures::future::BoxFuture;

use super::{Entity, EntityKind};
use crate::accumulator::Accumulator;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::reducer::{self, RawDefinition};

pub(super) fn create(_raw: &RawDefinition) -> Result<EntityKind, EngineError> {
    Ok(EntityKind::Entry)
}

pub(super) fn resolve<'a>(
    engine: &'a Engine,
    acc: Accumulator,
    entity: &'a Entity,
) -> BoxFuture<'a, Result<Accumulator, EngineError>> {
    reducer::resolve(engine, acc, &entity.value)
}
