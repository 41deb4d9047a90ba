use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::traits::{RequestAdapter, RequestParams};
use crate::config::HttpRequestConfig;

/// Request adapter that performs real HTTP calls.
///
/// Responses with a JSON body decode to that JSON; any other body comes back
/// as a string. Non-2xx statuses and oversized bodies are errors.
#[derive(Debug, Clone)]
pub struct HttpRequestAdapter {
    client: Client,
    base_url: Option<Url>,
    config: HttpRequestConfig,
}

impl HttpRequestAdapter {
    pub fn new(config: HttpRequestConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("build http client")?;
        let base_url = config
            .base_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .context("parse base url")?;
        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    fn target(&self, params: &RequestParams) -> anyhow::Result<Url> {
        let mut url = match Url::parse(&params.url) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => base
                    .join(&params.url)
                    .with_context(|| format!("join '{}' onto {base}", params.url))?,
                None => anyhow::bail!("relative url '{}' needs a base url", params.url),
            },
            Err(err) => anyhow::bail!("invalid url '{}': {err}", params.url),
        };
        if !params.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &params.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl RequestAdapter for HttpRequestAdapter {
    fn name(&self) -> &str {
        "request.http"
    }

    async fn execute(&self, params: &RequestParams) -> anyhow::Result<Value> {
        let url = self.target(params)?;
        let method = Method::from_bytes(params.method.as_bytes())
            .with_context(|| format!("unsupported method {}", params.method))?;

        let mut req = self.client.request(method.clone(), url.clone());
        for (key, value) in &params.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .with_context(|| format!("invalid header {key}"))?;
            let value =
                HeaderValue::from_str(value).with_context(|| format!("invalid header {key}"))?;
            req = req.header(name, value);
        }
        if let Some(body) = &params.body {
            req = req.json(body);
        }

        let response = req
            .send()
            .await
            .with_context(|| format!("{method} {url} failed"))?;
        let status = response.status();
        if let Some(len) = response.content_length() {
            if len as usize > self.config.max_body_size {
                anyhow::bail!(
                    "response body {len} bytes exceeds limit {}",
                    self.config.max_body_size
                );
            }
        }
        let body = response
            .bytes()
            .await
            .with_context(|| format!("read body of {method} {url}"))?;
        if body.len() > self.config.max_body_size {
            anyhow::bail!(
                "response body {} bytes exceeds limit {}",
                body.len(),
                self.config.max_body_size
            );
        }
        debug!(%method, %url, status = status.as_u16(), bytes = body.len(), "http response");
        if !status.is_success() {
            anyhow::bail!("{method} {url} returned {status}");
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned())))
    }
}
