use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Emit trace markers for every entity, regardless of call options.
    pub trace_all: bool,
    /// HTTP request adapter configuration (always present).
    pub http: HttpRequestConfig,
}

impl EngineConfig {
    /// Build EngineConfig from `DP_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let trace_all = std::env::var("DP_TRACE")
            .map(|raw| matches!(raw.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Self {
            trace_all,
            http: HttpRequestConfig::from_env(),
        }
    }
}

/// Configuration for the HTTP request adapter.
#[derive(Debug, Clone)]
pub struct HttpRequestConfig {
    /// Default timeout for requests.
    pub timeout: Duration,
    /// Maximum response body size in bytes.
    pub max_body_size: usize,
    /// Prefixed to request urls that are not absolute.
    pub base_url: Option<String>,
}

impl Default for HttpRequestConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024, // 10MB
            base_url: None,
        }
    }
}

impl HttpRequestConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeout = std::env::var("DP_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        let base_url = std::env::var("DP_HTTP_BASE_URL")
            .ok()
            .filter(|raw| !raw.trim().is_empty());
        Self {
            timeout,
            base_url,
            ..defaults
        }
    }
}
