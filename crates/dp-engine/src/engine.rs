use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tracing::debug;

use crate::accumulator::{Accumulator, TransformOptions};
use crate::adapters::{
    ExpressionEvaluator, JsonSchemaValidator, PathEvaluator, RequestAdapter, SchemaValidator,
};
use crate::config::{EngineConfig, HttpRequestConfig};
use crate::entity::lifecycle;
use crate::error::EngineError;
use crate::middleware::MiddlewareBus;
use crate::reducer::RawDefinition;
use crate::registry::{Registry, RegistryBuilder};
use crate::trace::{TraceSink, TracingSink};

/// Registry, collaborators and middleware bus for one set of entities.
///
/// Cheap to clone; clones share the same registry and bus.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    registry: Registry,
    middleware: MiddlewareBus,
    evaluator: Arc<dyn ExpressionEvaluator>,
    validator: Arc<dyn SchemaValidator>,
    requests: Arc<dyn RequestAdapter>,
    trace_sink: Arc<dyn TraceSink>,
    config: EngineConfig,
    trace_seq: AtomicU64,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn middleware(&self) -> &MiddlewareBus {
        &self.inner.middleware
    }

    pub fn evaluator(&self) -> &dyn ExpressionEvaluator {
        self.inner.evaluator.as_ref()
    }

    pub fn validator(&self) -> &dyn SchemaValidator {
        self.inner.validator.as_ref()
    }

    pub fn requests(&self) -> &dyn RequestAdapter {
        self.inner.requests.as_ref()
    }

    pub fn trace_sink(&self) -> &dyn TraceSink {
        self.inner.trace_sink.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Resolves `value` through the entity `id` and returns the final
    /// accumulator.
    pub async fn transform(
        &self,
        id: &str,
        value: Value,
        options: TransformOptions,
    ) -> Result<Accumulator, EngineError> {
        let entity = self.registry().require(id)?;
        let mut root = Accumulator::new(value, &options);
        root.trace |= self.config().trace_all;
        debug!(entity = id, trace = root.trace, "transform");
        lifecycle::resolve_entity(self, &root, entity).await
    }

    /// [`Engine::transform`], keeping only the resulting value.
    pub async fn resolve_value(
        &self,
        id: &str,
        value: Value,
        options: TransformOptions,
    ) -> Result<Value, EngineError> {
        self.transform(id, value, options).await.map(|acc| acc.value)
    }

    pub(crate) fn next_trace_seq(&self) -> u64 {
        self.inner.trace_seq.fetch_add(1, Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("entities", &self.inner.registry.len())
            .field("middleware", &self.inner.middleware)
            .field("requests", &self.inner.requests.name())
            .field("config", &self.inner.config)
            .finish()
    }
}

#[derive(Default)]
pub struct EngineBuilder {
    registry: RegistryBuilder,
    evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    validator: Option<Arc<dyn SchemaValidator>>,
    requests: Option<Arc<dyn RequestAdapter>>,
    trace_sink: Option<Arc<dyn TraceSink>>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn entity(mut self, id: impl Into<String>, raw: RawDefinition) -> Self {
        self.registry.add(id, raw);
        self
    }

    /// Adds every member of a `{ "<id>": { definition } }` object.
    pub fn entities_json(mut self, entities: Value) -> Result<Self, EngineError> {
        self.registry = self.registry.entities_json(entities)?;
        Ok(self)
    }

    pub fn evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn requests(mut self, requests: Arc<dyn RequestAdapter>) -> Self {
        self.requests = Some(requests);
        self
    }

    pub fn trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace_sink = Some(sink);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Normalizes every registered definition and wires the collaborators,
    /// falling back to the defaults for any that were not supplied.
    pub fn build(self) -> Result<Engine, EngineError> {
        let registry = self.registry.build()?;
        let requests = match self.requests {
            Some(requests) => requests,
            None => default_requests(&self.config.http)?,
        };
        debug!(
            entities = registry.len(),
            requests = requests.name(),
            "engine ready"
        );
        Ok(Engine {
            inner: Arc::new(EngineInner {
                registry,
                middleware: MiddlewareBus::new(),
                evaluator: self.evaluator.unwrap_or_else(|| Arc::new(PathEvaluator)),
                validator: self.validator.unwrap_or_else(|| Arc::new(JsonSchemaValidator::new())),
                requests,
                trace_sink: self.trace_sink.unwrap_or_else(|| Arc::new(TracingSink)),
                config: self.config,
                trace_seq: AtomicU64::new(1),
            }),
        })
    }
}

#[cfg(feature = "adapter-http")]
fn default_requests(config: &HttpRequestConfig) -> Result<Arc<dyn RequestAdapter>, EngineError> {
    let adapter = crate::adapters::HttpRequestAdapter::new(config.clone())
        .map_err(|err| EngineError::configuration(format!("http request adapter: {err:#}")))?;
    Ok(Arc::new(adapter))
}

#[cfg(not(feature = "adapter-http"))]
fn default_requests(_config: &HttpRequestConfig) -> Result<Arc<dyn RequestAdapter>, EngineError> {
    Ok(Arc::new(crate::adapters::UnconfiguredRequestAdapter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn transform_unknown_entity_is_not_found() {
        let engine = Engine::builder().build().unwrap();
        let err = engine
            .transform("entry:missing", json!({}), TransformOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.name(), "EntityNotFound");
        assert_eq!(err.to_string(), "entity 'entry:missing' not found");
    }

    #[tokio::test]
    async fn engines_do_not_share_middleware() {
        let first = Engine::builder()
            .entity("entry:a", RawDefinition::new())
            .build()
            .unwrap();
        let second = first.clone();
        let other = Engine::builder().build().unwrap();
        first
            .middleware()
            .use_fn("before", |acc| Ok(crate::HookOutcome::Continue(acc)));
        assert!(!second.middleware().is_empty());
        assert!(other.middleware().is_empty());
    }

    #[test]
    fn trace_sequence_increases() {
        let engine = Engine::builder().build().unwrap();
        let a = engine.next_trace_seq();
        let b = engine.next_trace_seq();
        assert!(b > a);
    }
}
