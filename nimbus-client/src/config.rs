use std::time::Duration;

/// Endpoint of the datastore JSON API; requests go to `{base}/{datasetId}/{method}`
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/datastore/v1beta2/datasets";

/// OAuth scopes every datastore connection requests
pub const DATASTORE_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/datastore",
    "https://www.googleapis.com/auth/userinfo.email",
];

pub const ENV_PROJECT_ID: &str = "NIMBUS_PROJECT_ID";
pub const ENV_BASE_URL: &str = "NIMBUS_API_BASE_URL";
pub const ENV_ACCESS_TOKEN: &str = "NIMBUS_ACCESS_TOKEN";

/// Dataset connection configuration
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Project id; the dataset id is derived from it
    pub project_id: String,

    /// API base URL without trailing dataset segment
    pub base_url: String,

    /// Pre-acquired OAuth access token (None = unauthenticated, e.g. a local emulator)
    pub access_token: Option<String>,

    /// OAuth scopes passed to the token provider
    pub scopes: Vec<String>,

    /// Per-request timeout (None = transport default)
    pub timeout: Option<Duration>,

    pub user_agent: String,

    /// Send mutations of an open transaction as TRANSACTIONAL.
    /// Default: false, every mutation is NON_TRANSACTIONAL.
    pub transactional_mutations: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: None,
            scopes: DATASTORE_SCOPES.iter().map(|s| s.to_string()).collect(),
            timeout: Some(Duration::from_secs(30)),
            user_agent: format!("nimbus-client/{}", env!("CARGO_PKG_VERSION")),
            transactional_mutations: false,
        }
    }
}

impl DatasetConfig {
    /// Create a configuration for a project with default values
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    /// Read `NIMBUS_PROJECT_ID`, `NIMBUS_API_BASE_URL` and `NIMBUS_ACCESS_TOKEN`.
    pub fn from_env() -> Result<Self, String> {
        let project_id = non_empty_env(ENV_PROJECT_ID)
            .ok_or_else(|| format!("{} is not set", ENV_PROJECT_ID))?;

        let mut config = Self::new(project_id);
        if let Some(base_url) = non_empty_env(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        config.access_token = non_empty_env(ENV_ACCESS_TOKEN);
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Scope mutations to the open transaction instead of always committing them
    /// non-transactionally
    pub fn with_transactional_mutations(mut self, enabled: bool) -> Self {
        self.transactional_mutations = enabled;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.project_id.trim().is_empty() {
            return Err("project_id must not be empty".to_string());
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            ));
        }

        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err("timeout must be greater than 0 when set".to_string());
            }
        }

        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
