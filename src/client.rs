// Client facade
// Wires credentials, token manager and transport from one configuration

use std::sync::Arc;

use crate::auth::{Clock, Credentials, TokenManager};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http_client::{build_http_client, Transport};
use crate::resources::{Accounts, Campaigns};

/// Entry point for talking to the Backstage API
pub struct BackstageClient {
    token_manager: Arc<TokenManager>,
    transport: Transport,
}

impl BackstageClient {
    /// Build a client. Fails immediately, without network access, when the
    /// configuration is invalid.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Build a client that reads time from `clock`
    pub fn with_clock(config: ClientConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::build(config, Some(clock))
    }

    fn build(config: ClientConfig, clock: Option<Arc<dyn Clock>>) -> Result<Self> {
        let credentials = Credentials::new(config.client_id.clone(), config.client_secret.clone())?;
        config.validate()?;

        let http = build_http_client(config.timeout)?;

        let mut token_manager = TokenManager::new(credentials, config.token_url.clone(), http.clone());
        if let Some(clock) = clock {
            token_manager = token_manager.with_clock(clock);
        }
        let token_manager = Arc::new(token_manager);

        let transport = Transport::new(http, Arc::clone(&token_manager), &config);

        tracing::debug!(
            base_url = %transport.base_url(),
            client_id = %token_manager.client_id(),
            "Backstage client initialized"
        );

        Ok(Self {
            token_manager,
            transport,
        })
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.token_manager
    }

    /// Account endpoints for the authenticated user
    pub fn accounts(&self) -> Accounts<'_> {
        Accounts::new(&self.transport)
    }

    /// Campaign endpoints scoped to one account
    pub fn campaigns<'a>(&'a self, account_id: &'a str) -> Result<Campaigns<'a>> {
        if account_id.trim().is_empty() {
            return Err(Error::Config("account_id must not be empty".to_string()));
        }
        Ok(Campaigns::new(&self.transport, account_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_client_id_fails_synchronously() {
        let err = BackstageClient::new(ClientConfig::new("", "secret")).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("client_id"));
    }

    #[test]
    fn test_invalid_base_url_fails() {
        let config = ClientConfig::new("id", "secret").with_base_url("not a url");
        assert!(matches!(BackstageClient::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_client_wiring() {
        let config = ClientConfig::new("id", "secret")
            .with_base_url("https://api.example.com/api/1.0/")
            .with_token_url("https://api.example.com/oauth/token");
        let client = BackstageClient::new(config).unwrap();

        assert_eq!(client.transport().base_url(), "https://api.example.com/api/1.0");
        assert_eq!(client.token_manager().client_id(), "id");
        assert_eq!(
            client.token_manager().token_url(),
            "https://api.example.com/oauth/token"
        );
        assert!(client.campaigns("").is_err());
        assert!(client.campaigns("acme").is_ok());
    }

    #[tokio::test]
    async fn test_with_clock_drives_token_expiry() {
        use crate::auth::ManualClock;

        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok1","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok2","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;

        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let config = ClientConfig::new("id", "secret")
            .with_base_url(format!("{}/api/1.0", server.url()))
            .with_token_url(format!("{}/oauth/token", server.url()));
        let client = BackstageClient::with_clock(config, clock.clone()).unwrap();

        assert_eq!(client.token_manager().get_token().await.unwrap(), "tok1");
        clock.advance_secs(3000);
        assert_eq!(client.token_manager().get_token().await.unwrap(), "tok1");
        clock.advance_secs(300);
        assert_eq!(client.token_manager().get_token().await.unwrap(), "tok2");

        first.assert_async().await;
        second.assert_async().await;
    }
}
