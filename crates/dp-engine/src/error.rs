use dp_expr::EvalError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One failed constraint reported by a schema validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaViolation {
    pub instance_path: String,
    pub schema_path: String,
    pub message: String,
}

/// Error shape surfaced to callers and handed to `error` reducers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<SchemaViolation>>,
}

impl ErrorInfo {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Configuration(String),
    #[error("entity '{0}' not found")]
    EntityNotFound(String),
    #[error("{message}")]
    InvalidSchema {
        message: String,
        errors: Vec<SchemaViolation>,
    },
    #[error("{0:#}")]
    Transform(anyhow::Error),
    #[error("{context}: expected {expected}, got {actual}")]
    TypeMismatch {
        context: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("expression '{expression}': {source}")]
    Expression {
        expression: String,
        source: EvalError,
    },
    #[error("{0:#}")]
    Request(anyhow::Error),
    #[error("schema validator failed: {0:#}")]
    Validator(anyhow::Error),
    #[error("middleware error: {0}")]
    Middleware(String),
}

impl EngineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        EngineError::Configuration(message.into())
    }

    /// Converts an error raised by a user callable. Engine errors travelling
    /// inside the `anyhow` wrapper come back out unchanged.
    pub fn from_user(err: anyhow::Error) -> Self {
        match err.downcast::<EngineError>() {
            Ok(engine) => engine,
            Err(other) => EngineError::Transform(other),
        }
    }

    pub fn type_mismatch(context: impl Into<String>, expected: &'static str, actual: &Value) -> Self {
        EngineError::TypeMismatch {
            context: context.into(),
            expected,
            actual: dp_expr::kind(actual),
        }
    }

    /// Prefixes configuration errors with the entity they were raised for.
    pub(crate) fn in_entity(self, id: &str) -> Self {
        match self {
            EngineError::Configuration(message) => {
                EngineError::Configuration(format!("entity '{id}': {message}"))
            }
            other => other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EngineError::Configuration(_) => "ConfigurationError",
            EngineError::EntityNotFound(_) => "EntityNotFound",
            EngineError::InvalidSchema { .. } => "InvalidSchema",
            EngineError::Transform(_) => "TransformError",
            EngineError::TypeMismatch { .. } => "TypeMismatch",
            EngineError::Expression { .. } => "ExpressionError",
            EngineError::Request(_) => "RequestError",
            EngineError::Validator(_) => "ValidatorError",
            EngineError::Middleware(_) => "MiddlewareError",
        }
    }

    /// Schema violations, populated only for `InvalidSchema`.
    pub fn errors(&self) -> Option<&[SchemaViolation]> {
        match self {
            EngineError::InvalidSchema { errors, .. } => Some(errors),
            _ => None,
        }
    }

    pub fn info(&self) -> ErrorInfo {
        ErrorInfo {
            name: self.name().to_string(),
            message: self.to_string(),
            errors: self.errors().map(<[SchemaViolation]>::to_vec),
        }
    }
}
