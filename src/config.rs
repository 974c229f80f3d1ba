use anyhow::{Context, Result};
use clap::Parser;
use std::fmt;
use std::time::Duration;

/// Production API root
pub const DEFAULT_BASE_URL: &str = "https://backstage.taboola.com/backstage/api/1.0";

/// OAuth token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://backstage.taboola.com/backstage/oauth/token";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Client configuration
#[derive(Clone)]
pub struct ClientConfig {
    // Credentials
    pub client_id: String,
    pub client_secret: String,

    // Endpoints
    pub base_url: String,
    pub token_url: String,

    // HTTP client
    /// Deadline for each individual attempt
    pub timeout: Duration,
    /// Extra attempts allowed for transient failures
    pub max_retries: u32,
    /// First backoff delay; doubles on every retry
    pub retry_base_delay: Duration,

    // Debug
    /// Log `<method> <status> <url>` for every response
    pub debug: bool,
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            debug: false,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Validate endpoint settings. Credentials are checked when the client is built.
    pub fn validate(&self) -> crate::Result<()> {
        for (name, url) in [("base_url", &self.base_url), ("token_url", &self.token_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(crate::Error::Config(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }
        if self.timeout.is_zero() {
            return Err(crate::Error::Config("timeout must be greater than zero".to_string()));
        }
        Ok(())
    }
}

// Keep the secret out of logs
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .field("debug", &self.debug)
            .finish()
    }
}

/// Backstage API client - issue one authenticated request
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Resource path relative to the API root (e.g. users/current/account)
    pub path: Option<String>,

    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// JSON request body
    #[arg(short = 'd', long)]
    pub data: Option<String>,

    /// Only fetch a token and report whether authentication works
    #[arg(long)]
    pub check_auth: bool,

    /// OAuth client id
    #[arg(long, env = "BACKSTAGE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret
    #[arg(long, env = "BACKSTAGE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// API root URL
    #[arg(long, env = "BACKSTAGE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// OAuth token endpoint
    #[arg(long, env = "BACKSTAGE_TOKEN_URL", default_value = DEFAULT_TOKEN_URL)]
    pub token_url: String,

    /// Per-attempt timeout in seconds
    #[arg(long, env = "BACKSTAGE_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Retries for transient failures
    #[arg(long, env = "BACKSTAGE_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Log every response
    #[arg(long, env = "BACKSTAGE_DEBUG")]
    pub debug: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl CliArgs {
    /// Build the client configuration; credentials are required
    pub fn client_config(&self) -> Result<ClientConfig> {
        let client_id = self
            .client_id
            .clone()
            .context("BACKSTAGE_CLIENT_ID is required (use --client-id or set BACKSTAGE_CLIENT_ID env var)")?;
        let client_secret = self.client_secret.clone().context(
            "BACKSTAGE_CLIENT_SECRET is required (use --client-secret or set BACKSTAGE_CLIENT_SECRET env var)",
        )?;

        Ok(ClientConfig::new(client_id, client_secret)
            .with_base_url(self.base_url.clone())
            .with_token_url(self.token_url.clone())
            .with_timeout(Duration::from_secs(self.timeout))
            .with_retries(self.max_retries)
            .with_debug(self.debug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("id", "secret");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_secs(1));
        assert!(!config.debug);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new("id", "secret")
            .with_base_url("http://localhost:8080/api")
            .with_token_url("http://localhost:8080/token")
            .with_timeout(Duration::from_secs(5))
            .with_retries(0)
            .with_retry_base_delay(Duration::from_millis(10))
            .with_debug(true);

        assert_eq!(config.base_url, "http://localhost:8080/api");
        assert_eq!(config.token_url, "http://localhost:8080/token");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.retry_base_delay, Duration::from_millis(10));
        assert!(config.debug);
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let config = ClientConfig::new("id", "secret").with_base_url("localhost/api");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("base_url"));

        let config = ClientConfig::new("id", "secret").with_token_url("");
        assert!(config.validate().is_err());

        let config = ClientConfig::new("id", "secret").with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_output_redacts_secret() {
        let config = ClientConfig::new("visible-id", "hidden-secret");
        let debug = format!("{:?}", config);
        assert!(debug.contains("visible-id"));
        assert!(!debug.contains("hidden-secret"));
    }

    #[test]
    fn test_cli_args_to_config() {
        let args = CliArgs::parse_from([
            "backstage",
            "users/current/account",
            "--client-id",
            "cli-id",
            "--client-secret",
            "cli-secret",
            "--base-url",
            "http://localhost:9000",
            "--max-retries",
            "5",
            "--debug",
        ]);

        assert_eq!(args.path.as_deref(), Some("users/current/account"));
        assert_eq!(args.method, "GET");

        let config = args.client_config().unwrap();
        assert_eq!(config.client_id, "cli-id");
        assert_eq!(config.client_secret, "cli-secret");
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.max_retries, 5);
        assert!(config.debug);
    }

    #[test]
    fn test_cli_args_method_and_body() {
        let args = CliArgs::parse_from([
            "backstage",
            "-X",
            "POST",
            "acme/campaigns/",
            "-d",
            r#"{"name":"Spring"}"#,
            "--client-id",
            "id",
            "--client-secret",
            "secret",
        ]);

        assert_eq!(args.method, "POST");
        assert_eq!(args.data.as_deref(), Some(r#"{"name":"Spring"}"#));
    }
}
