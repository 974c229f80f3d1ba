use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;

use backstage_client::config::CliArgs;
use backstage_client::{BackstageClient, HttpMethod};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();

    // Initialize logging with the configured level
    let log_level = args.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = args.client_config()?;
    tracing::debug!("Configuration: {:?}", config);

    let client = BackstageClient::new(config)?;

    if args.check_auth {
        let token = client
            .token_manager()
            .get_token()
            .await
            .context("Authentication failed")?;
        tracing::info!(
            "Authentication successful (token: {}...)",
            token_prefix(&token)
        );
        return Ok(());
    }

    let path = args
        .path
        .as_deref()
        .context("A resource path is required (or pass --check-auth)")?;
    let method: HttpMethod = args.method.parse()?;
    let body: Option<Value> = args
        .data
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .context("--data is not valid JSON")?;

    let result: Option<Value> = match client.transport().request(method, path, body.as_ref()).await {
        Ok(result) => result,
        Err(e) => {
            if let Some(api) = e.as_api_error() {
                tracing::error!(
                    kind = api.kind().name(),
                    status = ?api.status_code(),
                    url = ?api.url(),
                    "Request failed: {}",
                    api.message()
                );
                if let Some(response) = api.response() {
                    eprintln!("{}", serde_json::to_string_pretty(response)?);
                }
            }
            return Err(e.into());
        }
    };

    match result {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => tracing::info!("{} {} returned no content", method, path),
    }

    Ok(())
}

/// First eight characters of a token, for log output
fn token_prefix(token: &str) -> String {
    token.chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_prefix() {
        assert_eq!(token_prefix("abcdefghijkl"), "abcdefgh");
        assert_eq!(token_prefix("abc"), "abc");
        // Multi-byte character straddling byte 8
        assert_eq!(token_prefix("abcdefgé-tail"), "abcdefgé");
    }
}
