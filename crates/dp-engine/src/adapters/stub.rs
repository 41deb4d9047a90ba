//! Request adapters that never touch the network.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use super::traits::{RequestAdapter, RequestParams};

#[derive(Debug, Clone)]
enum Route {
    Json(Value),
    Fail(String),
}

/// Answers requests from a fixed `(method, url)` route table and records
/// every call it receives.
#[derive(Debug, Clone, Default)]
pub struct StaticRequestAdapter {
    routes: IndexMap<(String, String), Route>,
    calls: Arc<Mutex<Vec<RequestParams>>>,
}

impl StaticRequestAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `GET url` with `body`.
    pub fn with_json(self, url: impl Into<String>, body: Value) -> Self {
        self.with_route("GET", url, body)
    }

    pub fn with_route(mut self, method: &str, url: impl Into<String>, body: Value) -> Self {
        self.routes
            .insert((method.to_uppercase(), url.into()), Route::Json(body));
        self
    }

    /// Fails `GET url` with `message`.
    pub fn with_failure(mut self, url: impl Into<String>, message: impl Into<String>) -> Self {
        self.routes
            .insert(("GET".into(), url.into()), Route::Fail(message.into()));
        self
    }

    /// Requests received so far, in arrival order.
    pub fn calls(&self) -> Vec<RequestParams> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl RequestAdapter for StaticRequestAdapter {
    fn name(&self) -> &str {
        "request.static"
    }

    async fn execute(&self, params: &RequestParams) -> anyhow::Result<Value> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(params.clone());
        let key = (params.method.clone(), params.url.clone());
        match self.routes.get(&key) {
            Some(Route::Json(body)) => {
                debug!(method = %params.method, url = %params.url, "static route hit");
                Ok(body.clone())
            }
            Some(Route::Fail(message)) => anyhow::bail!("{message}"),
            None => anyhow::bail!("no route for {} {}", params.method, params.url),
        }
    }
}

/// Used when no transport is configured; every request fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredRequestAdapter;

#[async_trait]
impl RequestAdapter for UnconfiguredRequestAdapter {
    fn name(&self) -> &str {
        "request.unconfigured"
    }

    async fn execute(&self, params: &RequestParams) -> anyhow::Result<Value> {
        anyhow::bail!(
            "no request adapter configured for {} {}",
            params.method,
            params.url
        )
    }
}
