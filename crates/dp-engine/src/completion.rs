//! One-shot completion handles for callback-style reducers and middleware hooks.
//!
//! Both calling conventions end up as a single future: the callee receives a
//! [`Completion`] and the engine awaits the paired receiver.

use futures::channel::oneshot;
use serde_json::Value;

use crate::accumulator::Accumulator;
use crate::error::EngineError;
use crate::middleware::HookOutcome;

#[must_use = "a completion handle must be completed, dropping it rejects the resolution"]
pub struct Completion<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Completion<T> {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Completes with `outcome`. A receiver that already went away is ignored.
    pub fn complete(self, outcome: T) {
        let _ = self.tx.send(outcome);
    }
}

/// Completion handle passed to callback-style reducer functions.
pub type Done = Completion<anyhow::Result<Value>>;

impl Completion<anyhow::Result<Value>> {
    pub fn ok(self, value: Value) {
        self.complete(Ok(value));
    }

    pub fn fail(self, err: impl Into<anyhow::Error>) {
        self.complete(Err(err.into()));
    }
}

/// Continuation passed to callback-style middleware hooks.
pub type Next = Completion<Result<HookOutcome, EngineError>>;

impl Completion<Result<HookOutcome, EngineError>> {
    /// Continue with the (possibly replaced) accumulator.
    pub fn proceed(self, acc: Accumulator) {
        self.complete(Ok(HookOutcome::Continue(acc)));
    }

    /// Resolve the entity with `value`, skipping its remaining stages.
    pub fn resolve(self, value: Value) {
        self.complete(Ok(HookOutcome::Resolve(value)));
    }

    pub fn fail(self, err: EngineError) {
        self.complete(Err(err));
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("canceled", &self.tx.is_canceled())
            .finish()
    }
}
