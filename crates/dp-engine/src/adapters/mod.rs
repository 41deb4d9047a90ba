//! Collaborator seams and their default implementations.

pub mod expr;
pub mod schema;
pub mod stub;
pub mod traits;

#[cfg(feature = "adapter-http")]
pub mod http;

pub use expr::PathEvaluator;
pub use schema::JsonSchemaValidator;
pub use stub::{StaticRequestAdapter, UnconfiguredRequestAdapter};
pub use traits::{ExpressionEvaluator, RequestAdapter, RequestParams, SchemaValidator};

#[cfg(feature = "adapter-http")]
pub use http::HttpRequestAdapter;
