// Token fetch via the OAuth client-credentials grant

use reqwest::Client;
use serde_json::Value;

use super::credentials::Credentials;
use super::types::{CachedToken, Clock, TokenResponse, DEFAULT_EXPIRES_IN_SECS};
use crate::error::{body_from_text, message_from_body, ApiError, ApiErrorKind};

/// Build an auth error from whatever the token endpoint returned
fn auth_failure(status: Option<u16>, body: Option<Value>, token_url: &str) -> ApiError {
    let message = message_from_body(body.as_ref())
        .unwrap_or_else(|| ApiErrorKind::Auth.default_message().to_string());

    let mut error = ApiError::auth(message).with_url(token_url);
    if let Some(status) = status {
        error = error.with_status(status);
    }
    if let Some(body) = body {
        error = error.with_response(body);
    }
    error
}

/// Request a new access token from the OAuth token endpoint
pub async fn fetch_token(
    client: &Client,
    token_url: &str,
    creds: &Credentials,
    clock: &dyn Clock,
) -> Result<CachedToken, ApiError> {
    tracing::info!(client_id = %creds.client_id(), "Requesting access token...");

    let response = client
        .post(token_url)
        .header("Accept", "application/json")
        .form(&creds.form())
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, url = %token_url, "Failed to reach token endpoint");
            ApiError::auth(format!("Failed to reach token endpoint: {}", e)).with_url(token_url)
        })?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body = body_from_text(&text);

    if !status.is_success() {
        tracing::error!(
            status = status.as_u16(),
            body = %text,
            "Token endpoint returned an error"
        );
        return Err(auth_failure(Some(status.as_u16()), body, token_url));
    }

    let data: TokenResponse = serde_json::from_str(&text).map_err(|e| {
        tracing::error!(error = %e, "Failed to parse token response");
        let mut error = ApiError::auth(format!("Failed to parse token response: {}", e))
            .with_status(status.as_u16())
            .with_url(token_url);
        if let Some(body) = body.clone() {
            error = error.with_response(body);
        }
        error
    })?;

    let access_token = match data.access_token.filter(|t| !t.is_empty()) {
        Some(token) => token,
        None => {
            let mut error = ApiError::auth("Token response does not contain access_token")
                .with_status(status.as_u16())
                .with_url(token_url);
            if let Some(body) = body {
                error = error.with_response(body);
            }
            return Err(error);
        }
    };

    let expires_in = data.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    let expires_at = clock.now_millis() + expires_in.saturating_mul(1000);

    tracing::info!(expires_in, "Access token acquired");

    Ok(CachedToken {
        value: access_token,
        expires_at_epoch_millis: expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::ManualClock;
    use mockito::Matcher;
    use serde_json::json;

    fn creds() -> Credentials {
        Credentials::new("client-1", "secret-1").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_token_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "client-1".into()),
                Matcher::UrlEncoded("client_secret".into(), "secret-1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok","token_type":"bearer","expires_in":3600}"#)
            .create_async()
            .await;

        let clock = ManualClock::new(1_000_000);
        let url = format!("{}/oauth/token", server.url());
        let token = fetch_token(&Client::new(), &url, &creds(), &clock)
            .await
            .unwrap();

        assert_eq!(token.value, "tok");
        assert_eq!(token.expires_at_epoch_millis, 1_000_000 + 3_600_000);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_token_missing_expires_in_uses_default() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_body(r#"{"access_token":"tok"}"#)
            .create_async()
            .await;

        let clock = ManualClock::new(0);
        let url = format!("{}/oauth/token", server.url());
        let token = fetch_token(&Client::new(), &url, &creds(), &clock)
            .await
            .unwrap();

        assert_eq!(token.expires_at_epoch_millis, DEFAULT_EXPIRES_IN_SECS * 1000);
    }

    #[tokio::test]
    async fn test_fetch_token_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client","error_description":"bad secret"}"#)
            .create_async()
            .await;

        let url = format!("{}/oauth/token", server.url());
        let err = fetch_token(&Client::new(), &url, &creds(), &ManualClock::new(0))
            .await
            .unwrap_err();

        assert!(err.is_auth());
        assert_eq!(err.status_code(), Some(401));
        assert_eq!(err.message(), "invalid_client");
        assert_eq!(
            err.response(),
            Some(&json!({"error":"invalid_client","error_description":"bad secret"}))
        );
    }

    #[tokio::test]
    async fn test_fetch_token_rejected_without_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(500)
            .create_async()
            .await;

        let url = format!("{}/oauth/token", server.url());
        let err = fetch_token(&Client::new(), &url, &creds(), &ManualClock::new(0))
            .await
            .unwrap_err();

        assert!(err.is_auth());
        assert_eq!(err.message(), "Authentication failed");
        assert!(err.response().is_none());
    }

    #[tokio::test]
    async fn test_fetch_token_unparsable_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let url = format!("{}/oauth/token", server.url());
        let err = fetch_token(&Client::new(), &url, &creds(), &ManualClock::new(0))
            .await
            .unwrap_err();

        assert!(err.is_auth());
        assert!(err.message().contains("Failed to parse token response"));
        assert_eq!(err.response(), Some(&Value::String("not json".to_string())));
    }

    #[tokio::test]
    async fn test_fetch_token_missing_access_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_body(r#"{"token_type":"bearer","expires_in":3600}"#)
            .create_async()
            .await;

        let url = format!("{}/oauth/token", server.url());
        let err = fetch_token(&Client::new(), &url, &creds(), &ManualClock::new(0))
            .await
            .unwrap_err();

        assert!(err.is_auth());
        assert!(err.message().contains("access_token"));
    }

    #[tokio::test]
    async fn test_fetch_token_unreachable() {
        let err = fetch_token(
            &Client::new(),
            "http://127.0.0.1:1/oauth/token",
            &creds(),
            &ManualClock::new(0),
        )
        .await
        .unwrap_err();

        assert!(err.is_auth());
        assert!(err.status_code().is_none());
        assert!(err.message().contains("Failed to reach token endpoint"));
    }
}
