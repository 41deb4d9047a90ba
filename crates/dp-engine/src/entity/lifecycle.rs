//! The resolution lifecycle shared by every entity type:
//! `before` hooks and reducer, type-specific value, `after` hooks and reducer,
//! then error recovery.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use super::Entity;
use crate::accumulator::Accumulator;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::middleware::{AFTER, BEFORE, HookOutcome, typed_stage};
use crate::reducer;
use crate::trace::TraceSpan;

/// Resolves `entity` on an accumulator derived from `parent`.
///
/// A failing stage hands its input accumulator to the `error` reducer, so
/// changes made by earlier hooks and reducers survive into recovery.
pub(crate) fn resolve_entity<'a>(
    engine: &'a Engine,
    parent: &Accumulator,
    entity: Arc<Entity>,
) -> BoxFuture<'a, Result<Accumulator, EngineError>> {
    let acc = parent.derive(entity.clone());
    async move {
        let span = acc
            .trace
            .then(|| TraceSpan::open(engine.trace_sink(), entity.id.as_str(), engine.next_trace_seq()));
        debug!(entity = %entity.id, path = %acc.path_display(), "resolve start");
        let outcome = run_stages(engine, acc, &entity).await;
        if let Some(span) = span {
            span.close();
        }

        match outcome {
            Ok(acc) => {
                debug!(entity = %entity.id, "resolve done");
                Ok(acc)
            }
            Err(Failed {
                error,
                at: Some(failing),
            }) => {
                debug!(entity = %entity.id, error = %error, "recovering through error reducer");
                let info = error.info();
                let mut recovery = failing.with_value(info.to_value());
                recovery.error = Some(info);
                reducer::resolve(engine, recovery, &entity.error).await
            }
            Err(Failed { error, .. }) => {
                debug!(entity = %entity.id, error = %error, "resolve failed");
                Err(error)
            }
        }
    }
    .boxed()
}

/// A stage failure plus the accumulator that entered the failing stage, kept
/// only when the entity defines an `error` reducer.
struct Failed {
    error: EngineError,
    at: Option<Accumulator>,
}

fn checkpoint(entity: &Entity, acc: &Accumulator) -> Option<Accumulator> {
    entity.has_error_reducer().then(|| acc.clone())
}

async fn run_stages(
    engine: &Engine,
    acc: Accumulator,
    entity: &Entity,
) -> Result<Accumulator, Failed> {
    let base = acc.clone();
    let failed = |at: Option<Accumulator>| move |error: EngineError| Failed { error, at };

    let at = checkpoint(entity, &acc);
    let acc = match run_hooks(engine, entity, BEFORE, acc).await.map_err(failed(at))? {
        HookOutcome::Continue(acc) => acc,
        HookOutcome::Resolve(value) => return Ok(base.with_value(value)),
    };
    let at = checkpoint(entity, &acc);
    let acc = reducer::resolve(engine, acc, &entity.before)
        .await
        .map_err(failed(at))?;
    let at = checkpoint(entity, &acc);
    let acc = super::resolve_value(engine, acc, entity)
        .await
        .map_err(failed(at))?;

    let at = checkpoint(entity, &acc);
    let acc = match run_hooks(engine, entity, AFTER, acc).await.map_err(failed(at))? {
        HookOutcome::Continue(acc) => acc,
        HookOutcome::Resolve(value) => return Ok(base.with_value(value)),
    };
    let at = checkpoint(entity, &acc);
    reducer::resolve(engine, acc, &entity.after)
        .await
        .map_err(failed(at))
}

/// Generic hooks for `point` first, then the `<type>:<point>` ones.
async fn run_hooks(
    engine: &Engine,
    entity: &Entity,
    point: &str,
    acc: Accumulator,
) -> Result<HookOutcome, EngineError> {
    let bus = engine.middleware();
    match bus.run(point, acc).await? {
        HookOutcome::Continue(acc) => {
            bus.run(&typed_stage(entity.entity_type(), point), acc)
                .await
        }
        resolved => Ok(resolved),
    }
}
