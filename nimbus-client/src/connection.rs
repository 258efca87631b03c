/// Request sender seam and its HTTP implementation
use crate::config::DatasetConfig;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// One signed JSON call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method, e.g. "POST"
    pub method: String,
    pub uri: String,
    pub json: serde_json::Value,
}

/// Whatever came back, error bodies included
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON when the response declared a JSON content type, the raw
    /// text otherwise, None when empty
    pub body: Option<serde_json::Value>,
}

impl ApiResponse {
    pub fn ok(body: serde_json::Value) -> Self {
        Self {
            status: 200,
            body: Some(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a network call and returns the parsed response body.
///
/// `Err` is reserved for failures where no response arrived at all; HTTP
/// error statuses come back as an `ApiResponse`.
#[async_trait]
pub trait RequestSender: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// Supplies bearer tokens. Acquisition and refresh live outside this crate.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// None = send the request without an Authorization header
    async fn token(&self, scopes: &[String]) -> Result<Option<String>>;
}

/// Hands out one fixed token
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self, _scopes: &[String]) -> Result<Option<String>> {
        Ok(Some(self.token.clone()))
    }
}

/// No credentials, for local emulators
#[derive(Debug, Clone, Default)]
pub struct NoopTokenProvider;

#[async_trait]
impl TokenProvider for NoopTokenProvider {
    async fn token(&self, _scopes: &[String]) -> Result<Option<String>> {
        Ok(None)
    }
}

/// `RequestSender` over reqwest
#[derive(Clone)]
pub struct HttpConnection {
    client: reqwest::Client,
    token_provider: Arc<dyn TokenProvider>,
    scopes: Vec<String>,
}

impl HttpConnection {
    /// Build a connection from the credentials, scopes, timeout and user agent
    /// of `config`.
    pub fn new(config: &DatasetConfig) -> Result<Self> {
        let token_provider: Arc<dyn TokenProvider> = match &config.access_token {
            Some(token) => Arc::new(StaticTokenProvider::new(token.clone())),
            None => Arc::new(NoopTokenProvider),
        };
        Self::with_token_provider(config, token_provider)
    }

    pub fn with_token_provider(
        config: &DatasetConfig,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            token_provider,
            scopes: config.scopes.clone(),
        })
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

#[async_trait]
impl RequestSender for HttpConnection {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            ClientError::Validation(format!("Invalid HTTP method '{}': {}", request.method, e))
        })?;

        let mut builder = self
            .client
            .request(method, &request.uri)
            .json(&request.json);
        if let Some(token) = self.token_provider.token(&self.scopes).await? {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            ClientError::Transport(format!("{} {} failed: {}", request.method, request.uri, e))
        })?;

        let status = response.status().as_u16();
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);
        let text = response.text().await.map_err(|e| {
            ClientError::Transport(format!("reading response of {} failed: {}", request.uri, e))
        })?;

        debug!(uri = %request.uri, status, bytes = text.len(), "received response");

        let body = if text.trim().is_empty() {
            None
        } else if is_json {
            Some(serde_json::from_str(&text)?)
        } else {
            Some(serde_json::Value::String(text))
        };

        Ok(ApiResponse { status, body })
    }
}
