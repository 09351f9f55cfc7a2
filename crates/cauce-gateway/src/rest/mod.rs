//! REST adapter: registered endpoints, auth strategies, and a
//! reqwest-backed client.

mod auth;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use url::Url;

pub use auth::AuthScheme;

use crate::error::{GatewayError, GatewayResult};

/// Tracing target for REST adapter operations.
pub const TRACING_TARGET: &str = "cauce_gateway::rest";

/// Default timeout for REST calls: 30 seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method for an endpoint call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    /// HTTP GET.
    #[default]
    Get,
    /// HTTP POST.
    Post,
    /// HTTP PUT.
    Put,
    /// HTTP DELETE.
    Delete,
    /// HTTP PATCH.
    Patch,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// A configured external endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    /// Target URL.
    pub url: Url,
    /// Static headers sent with every call.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Authentication applied before dispatch.
    #[serde(default)]
    pub auth: AuthScheme,
}

impl Endpoint {
    /// Creates an unauthenticated endpoint for the given URL.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: HashMap::new(),
            auth: AuthScheme::None,
        }
    }

    /// Sets the auth scheme.
    pub fn with_auth(mut self, auth: AuthScheme) -> Self {
        self.auth = auth;
        self
    }

    /// Adds a static header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Registry of endpoints addressable by flow configuration.
///
/// HttpCall nodes reference endpoints by name; the registry resolves the
/// reference to a concrete URL and auth scheme.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, Arc<Endpoint>>,
}

impl EndpointRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an endpoint under the given reference name.
    pub fn register(&mut self, name: impl Into<String>, endpoint: Endpoint) {
        self.endpoints.insert(name.into(), Arc::new(endpoint));
    }

    /// Resolves an endpoint reference.
    pub fn get(&self, name: &str) -> GatewayResult<Arc<Endpoint>> {
        self.endpoints
            .get(name)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownEndpoint(name.to_string()))
    }

    /// Returns whether the registry contains the given reference.
    pub fn contains(&self, name: &str) -> bool {
        self.endpoints.contains_key(name)
    }
}

/// Response from a REST call.
///
/// Non-2xx statuses are returned here rather than as an error so the
/// engine can record them on the node output and let the flow branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, parsed as JSON when possible, raw string otherwise.
    pub body: Value,
}

impl RestResponse {
    /// Returns whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Adapter for calling arbitrary REST endpoints.
#[async_trait::async_trait]
pub trait RestAdapter: Send + Sync {
    /// Calls the endpoint with the given method and resolved parameters.
    ///
    /// Parameters are sent as query arguments for GET and as a JSON body
    /// for every other method. Transport failures are errors; HTTP error
    /// statuses are part of the [`RestResponse`].
    async fn call(
        &self,
        endpoint: &Endpoint,
        method: HttpMethod,
        params: &Map<String, Value>,
    ) -> GatewayResult<RestResponse>;
}

/// Configuration for the reqwest-backed REST client.
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    /// Per-call timeout.
    pub timeout: Duration,
    /// User-Agent header to send with requests.
    pub user_agent: String,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("cauce/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl RestClientConfig {
    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Reqwest-backed [`RestAdapter`].
#[derive(Debug, Clone)]
pub struct HttpRestAdapter {
    http: reqwest::Client,
}

impl HttpRestAdapter {
    /// Creates a new REST client with the given configuration.
    pub fn new(config: RestClientConfig) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { http })
    }

    /// Creates a new REST client with default configuration.
    pub fn with_defaults() -> GatewayResult<Self> {
        Self::new(RestClientConfig::default())
    }
}

#[async_trait::async_trait]
impl RestAdapter for HttpRestAdapter {
    async fn call(
        &self,
        endpoint: &Endpoint,
        method: HttpMethod,
        params: &Map<String, Value>,
    ) -> GatewayResult<RestResponse> {
        let mut request = self
            .http
            .request(method.into(), endpoint.url.clone());

        for (name, value) in &endpoint.headers {
            request = request.header(name, value);
        }

        request = match method {
            HttpMethod::Get => {
                let query: Vec<(String, String)> = params
                    .iter()
                    .map(|(k, v)| (k.clone(), scalar_to_string(v)))
                    .collect();
                request.query(&query)
            }
            _ => request.json(params),
        };

        request = endpoint.auth.apply(request);

        tracing::debug!(
            target: TRACING_TARGET,
            url = %endpoint.url,
            method = %method,
            "Dispatching REST call"
        );

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        tracing::debug!(
            target: TRACING_TARGET,
            status,
            "REST call completed"
        );

        Ok(RestResponse { status, body })
    }
}

/// Renders a JSON value as a query-string scalar.
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_method_wire_form() {
        assert_eq!(serde_json::to_string(&HttpMethod::Post).unwrap(), r#""POST""#);
        let method: HttpMethod = serde_json::from_str(r#""DELETE""#).unwrap();
        assert_eq!(method, HttpMethod::Delete);
    }

    #[test]
    fn test_registry_resolves_registered_endpoint() {
        let mut registry = EndpointRegistry::new();
        let url: Url = "https://api.example.com/books".parse().unwrap();
        registry.register("books", Endpoint::new(url));

        assert!(registry.contains("books"));
        assert!(registry.get("books").is_ok());
        assert!(matches!(
            registry.get("missing"),
            Err(GatewayError::UnknownEndpoint(_))
        ));
    }

    #[test]
    fn test_rest_response_success_range() {
        let ok = RestResponse { status: 204, body: Value::Null };
        let err = RestResponse { status: 500, body: Value::Null };
        assert!(ok.is_success());
        assert!(!err.is_success());
    }
}
