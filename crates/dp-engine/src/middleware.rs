//! Stage-keyed interception hooks around entity resolution.
//!
//! Stage keys are `before`, `after`, `<type>:before` and `<type>:after`. Hooks
//! for one stage run in registration order; each one can continue (possibly
//! with a replaced accumulator), resolve the entity early, or fail.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{trace, warn};

use crate::accumulator::Accumulator;
use crate::completion::{Completion, Next};
use crate::entity::EntityType;
use crate::error::EngineError;

pub const BEFORE: &str = "before";
pub const AFTER: &str = "after";

/// What a hook decided.
#[derive(Debug)]
pub enum HookOutcome {
    Continue(Accumulator),
    /// Resolve the entity with this value; its remaining stages are skipped.
    Resolve(Value),
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, acc: Accumulator) -> Result<HookOutcome, EngineError>;
}

struct FnHook<F>(F);

#[async_trait]
impl<F> Middleware for FnHook<F>
where
    F: Fn(Accumulator) -> Result<HookOutcome, EngineError> + Send + Sync,
{
    async fn handle(&self, acc: Accumulator) -> Result<HookOutcome, EngineError> {
        (self.0)(acc)
    }
}

struct FutureHook<F>(F);

#[async_trait]
impl<F, Fut> Middleware for FutureHook<F>
where
    F: Fn(Accumulator) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HookOutcome, EngineError>> + Send,
{
    async fn handle(&self, acc: Accumulator) -> Result<HookOutcome, EngineError> {
        (self.0)(acc).await
    }
}

struct CallbackHook<F> {
    stage: String,
    f: F,
}

#[async_trait]
impl<F> Middleware for CallbackHook<F>
where
    F: Fn(Accumulator, Next) + Send + Sync,
{
    async fn handle(&self, acc: Accumulator) -> Result<HookOutcome, EngineError> {
        let (next, rx) = Completion::channel();
        (self.f)(acc, next);
        rx.await.unwrap_or_else(|_| {
            Err(EngineError::Middleware(format!(
                "hook for stage '{}' dropped its continuation",
                self.stage
            )))
        })
    }
}

type HookList = Vec<Arc<dyn Middleware>>;

/// Hook registry owned by one engine.
#[derive(Default)]
pub struct MiddlewareBus {
    stages: RwLock<IndexMap<String, HookList>>,
}

impl MiddlewareBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_hook(&self, stage: impl Into<String>, hook: Arc<dyn Middleware>) {
        let stage = stage.into();
        if !is_known_stage(&stage) {
            warn!(stage = %stage, "middleware registered for a stage that never runs");
        }
        let mut stages = self.stages.write().unwrap_or_else(PoisonError::into_inner);
        stages.entry(stage).or_default().push(hook);
    }

    /// Registers a synchronous hook.
    pub fn use_fn<F>(&self, stage: impl Into<String>, f: F)
    where
        F: Fn(Accumulator) -> Result<HookOutcome, EngineError> + Send + Sync + 'static,
    {
        self.use_hook(stage, Arc::new(FnHook(f)));
    }

    pub fn use_async<F, Fut>(&self, stage: impl Into<String>, f: F)
    where
        F: Fn(Accumulator) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookOutcome, EngineError>> + Send + 'static,
    {
        self.use_hook(stage, Arc::new(FutureHook(f)));
    }

    /// Registers a hook that reports through a [`Next`] continuation.
    pub fn use_callback<F>(&self, stage: impl Into<String>, f: F)
    where
        F: Fn(Accumulator, Next) + Send + Sync + 'static,
    {
        let stage = stage.into();
        let hook = CallbackHook {
            stage: stage.clone(),
            f,
        };
        self.use_hook(stage, Arc::new(hook));
    }

    /// Drops the hooks of one stage, or of every stage when `stage` is `None`.
    pub fn clear(&self, stage: Option<&str>) {
        let mut stages = self.stages.write().unwrap_or_else(PoisonError::into_inner);
        match stage {
            Some(stage) => {
                stages.shift_remove(stage);
            }
            None => stages.clear(),
        }
    }

    /// Snapshot of the hooks registered for `stage`.
    pub fn hooks(&self, stage: &str) -> HookList {
        let stages = self.stages.read().unwrap_or_else(PoisonError::into_inner);
        stages.get(stage).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        let stages = self.stages.read().unwrap_or_else(PoisonError::into_inner);
        stages.values().all(Vec::is_empty)
    }

    /// Runs the hooks of `stage` in order. Registrations made while the stage
    /// runs are picked up by the next resolution.
    pub(crate) async fn run(
        &self,
        stage: &str,
        acc: Accumulator,
    ) -> Result<HookOutcome, EngineError> {
        let hooks = self.hooks(stage);
        let mut acc = acc;
        for (idx, hook) in hooks.iter().enumerate() {
            trace!(stage, hook = idx, entity = acc.context_id().unwrap_or("-"), "middleware");
            match hook.handle(acc).await? {
                HookOutcome::Continue(next) => acc = next,
                resolved @ HookOutcome::Resolve(_) => return Ok(resolved),
            }
        }
        Ok(HookOutcome::Continue(acc))
    }
}

impl fmt::Debug for MiddlewareBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages = self.stages.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_map()
            .entries(stages.iter().map(|(stage, hooks)| (stage, hooks.len())))
            .finish()
    }
}

/// `<type>:<stage>` key.
pub fn typed_stage(ty: EntityType, stage: &str) -> String {
    format!("{ty}:{stage}")
}

fn is_known_stage(stage: &str) -> bool {
    let point = match stage.split_once(':') {
        Some((ty, point)) => {
            if ty.parse::<EntityType>().is_err() {
                return false;
            }
            point
        }
        None => stage,
    };
    point == BEFORE || point == AFTER
}
