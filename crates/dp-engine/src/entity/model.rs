use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::trace;

use super::{Entity, EntityKind};
use crate::accumulator::Accumulator;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::factory;
use crate::reducer::{self, ComposeKind, ComposeStep, RawDefinition, ReducerNode};

pub(super) fn create(raw: &RawDefinition) -> Result<EntityKind, EngineError> {
    Ok(EntityKind::Model {
        sources: raw.get("sources").map(|raw| raw.parse()).transpose()?,
        compose: factory::compose_steps(raw, ComposeKind::COLLECTION)?,
    })
}

/// Sources first (their merged object becomes the working value), then
/// `value`, then the composition steps.
pub(super) fn resolve<'a>(
    engine: &'a Engine,
    acc: Accumulator,
    entity: &'a Entity,
    sources: Option<&'a ReducerNode>,
    compose: &'a [ComposeStep],
) -> BoxFuture<'a, Result<Accumulator, EngineError>> {
    async move {
        let acc = match sources {
            Some(sources) => {
                let acc = reducer::resolve(engine, acc, sources).await?;
                trace!(entity = %entity.id, "model sources merged");
                acc
            }
            None => acc,
        };
        let acc = reducer::resolve(engine, acc, &entity.value).await?;
        reducer::apply_compose(engine, acc, compose).await
    }
    .boxed()
}
