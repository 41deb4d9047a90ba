use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::accumulator::Accumulator;
use crate::completion::{Completion, Done};

pub type ReducerFuture = BoxFuture<'static, anyhow::Result<Value>>;

type DirectFn = dyn Fn(Accumulator) -> ReducerFuture + Send + Sync;
type CallbackFn = dyn Fn(Accumulator, Done) + Send + Sync;

/// Inline callable embedded in an entity definition.
///
/// Supports two calling conventions: a direct return (sync or async) and the
/// callback form where the function receives a [`Done`] handle. Both are
/// normalized into one [`ReducerFuture`] by [`ReducerFn::invoke`].
#[derive(Clone)]
pub enum ReducerFn {
    Direct(Arc<DirectFn>),
    Callback(Arc<CallbackFn>),
}

impl ReducerFn {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Accumulator) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        ReducerFn::Direct(Arc::new(move |acc| futures::future::ready(f(&acc)).boxed()))
    }

    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(Accumulator) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        ReducerFn::Direct(Arc::new(move |acc| f(acc).boxed()))
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Accumulator, Done) + Send + Sync + 'static,
    {
        ReducerFn::Callback(Arc::new(f))
    }

    pub fn invoke(&self, acc: Accumulator) -> ReducerFuture {
        match self {
            ReducerFn::Direct(f) => f(acc),
            ReducerFn::Callback(f) => {
                let (done, rx) = Completion::channel();
                f(acc, done);
                async move {
                    rx.await.unwrap_or_else(|_| {
                        Err(anyhow::anyhow!(
                            "callback reducer dropped its completion handle"
                        ))
                    })
                }
                .boxed()
            }
        }
    }
}

impl fmt::Debug for ReducerFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReducerFn::Direct(_) => f.write_str("ReducerFn::Direct(..)"),
            ReducerFn::Callback(_) => f.write_str("ReducerFn::Callback(..)"),
        }
    }
}
