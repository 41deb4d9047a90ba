use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use crate::accumulator::Accumulator;
use crate::error::SchemaViolation;

/// Evaluates `$`-expressions found in entity definitions.
#[async_trait]
pub trait ExpressionEvaluator: Send + Sync {
    async fn evaluate(&self, expression: &str, acc: &Accumulator) -> anyhow::Result<Value>;
}

/// Validates values for schema entities. An `Err` means the validator itself
/// failed (bad schema, unsupported option); violations come back as `Ok`.
#[async_trait]
pub trait SchemaValidator: Send + Sync {
    async fn validate(
        &self,
        schema: &Value,
        options: &Value,
        value: &Value,
    ) -> anyhow::Result<Vec<SchemaViolation>>;
}

/// Transport behind request entities.
#[async_trait]
pub trait RequestAdapter: Send + Sync {
    fn name(&self) -> &str;
    async fn execute(&self, params: &RequestParams) -> anyhow::Result<Value>;
}

/// Fully rendered request handed to a [`RequestAdapter`].
#[derive(Debug, Clone, PartialEq)]
pub struct RequestParams {
    pub url: String,
    /// Upper-case HTTP method.
    pub method: String,
    pub headers: IndexMap<String, String>,
    pub query: IndexMap<String, String>,
    pub body: Option<Value>,
    pub locals: Value,
}

impl RequestParams {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".into(),
            headers: IndexMap::new(),
            query: IndexMap::new(),
            body: None,
            locals: Value::Null,
        }
    }
}
