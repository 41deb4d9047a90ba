//! Declarative entity-resolution engine.
//!
//! Entities (`entry`, `model`, `collection`, `hash`, `schema`, `request`,
//! `control`) are normalized once into a [`Registry`] and resolved many times
//! through [`Engine::transform`]. Each resolution threads an [`Accumulator`]
//! through the entity's `before`, value, `after` and `error` stages, with
//! [`MiddlewareBus`] hooks around them.

pub mod accumulator;
pub mod adapters;
pub mod completion;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod factory;
pub mod middleware;
pub mod reducer;
pub mod registry;
pub mod trace;

pub use accumulator::{Accumulator, TransformOptions};
pub use adapters::{
    ExpressionEvaluator, JsonSchemaValidator, PathEvaluator, RequestAdapter, RequestParams,
    SchemaValidator, StaticRequestAdapter, UnconfiguredRequestAdapter,
};
#[cfg(feature = "adapter-http")]
pub use adapters::HttpRequestAdapter;
pub use completion::{Completion, Done, Next};
pub use config::{EngineConfig, HttpRequestConfig};
pub use engine::{Engine, EngineBuilder};
pub use entity::{Entity, EntityId, EntityKind, EntityType};
pub use error::{EngineError, ErrorInfo, SchemaViolation};
pub use middleware::{HookOutcome, Middleware, MiddlewareBus};
pub use reducer::{RawDefinition, RawReducer, ReducerFn, ReducerNode};
pub use registry::{Registry, RegistryBuilder};
pub use trace::{RecordingSink, TraceEvent, TraceEventKind, TraceSink, TracingSink};
