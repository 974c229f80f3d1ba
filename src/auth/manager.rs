use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::credentials::Credentials;
use super::refresh;
use super::types::{CachedToken, Clock, SystemClock};
use crate::error::ApiError;

type TokenFetch = Shared<BoxFuture<'static, Result<CachedToken, ApiError>>>;

/// Mutable token state. The lock is never held across I/O.
#[derive(Default)]
struct TokenState {
    /// Current token, if any
    cached: Option<CachedToken>,

    /// Fetch currently in progress, tagged with its id
    in_flight: Option<(u64, TokenFetch)>,

    /// Id handed to the next fetch
    next_fetch_id: u64,
}

/// Authentication manager
/// Caches the bearer token for one credential pair and refreshes it on demand,
/// sharing a single in-flight fetch between concurrent callers
pub struct TokenManager {
    /// Client id / secret
    credentials: Arc<Credentials>,

    /// OAuth token endpoint
    token_url: String,

    /// HTTP client for token requests
    client: Client,

    /// Time source for expiry checks
    clock: Arc<dyn Clock>,

    state: Mutex<TokenState>,
}

impl TokenManager {
    /// Create a new TokenManager
    pub fn new(credentials: Credentials, token_url: impl Into<String>, client: Client) -> Self {
        Self {
            credentials: Arc::new(credentials),
            token_url: token_url.into(),
            client,
            clock: Arc::new(SystemClock),
            state: Mutex::new(TokenState::default()),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn client_id(&self) -> &str {
        self.credentials.client_id()
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Get a valid access token, fetching one if necessary.
    ///
    /// Concurrent callers that find no usable token join the same fetch, so at
    /// most one request to the token endpoint is outstanding at a time. All
    /// joiners observe the same token or the same error.
    pub async fn get_token(&self) -> Result<String, ApiError> {
        let (fetch_id, fetch) = {
            let mut state = self.state.lock().await;

            if let Some(token) = &state.cached {
                if !token.is_expired_at(self.clock.now_millis()) {
                    return Ok(token.value.clone());
                }
                tracing::debug!("Cached token is expiring soon, refreshing");
            }

            match &state.in_flight {
                Some((id, fetch)) => {
                    tracing::debug!(fetch_id = id, "Joining in-flight token fetch");
                    (*id, fetch.clone())
                }
                None => {
                    let id = state.next_fetch_id;
                    state.next_fetch_id += 1;
                    let fetch = self.start_fetch();
                    state.in_flight = Some((id, fetch.clone()));
                    (id, fetch)
                }
            }
        };

        let result = fetch.await;

        // Settle the fetch unless clear() or a newer fetch took its place
        {
            let mut state = self.state.lock().await;
            if matches!(&state.in_flight, Some((id, _)) if *id == fetch_id) {
                state.in_flight = None;
                if let Ok(token) = &result {
                    state.cached = Some(token.clone());
                }
            }
        }

        match result {
            Ok(token) => Ok(token.value),
            Err(e) => {
                tracing::error!("Token fetch failed: {}", e);
                Err(e)
            }
        }
    }

    /// Discard the cached token and fetch a new one.
    /// Used after the API rejected the current token.
    pub async fn force_refresh(&self) -> Result<String, ApiError> {
        tracing::debug!("Forcing token refresh");
        {
            let mut state = self.state.lock().await;
            state.cached = None;
        }
        self.get_token().await
    }

    /// Forget the cached token and any in-flight fetch.
    ///
    /// A fetch that was already dispatched still runs to completion for the
    /// callers awaiting it, but its result is never cached.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.cached = None;
        state.in_flight = None;
    }

    /// True when a cached token exists and is outside the expiry buffer
    pub async fn has_valid_token(&self) -> bool {
        let state = self.state.lock().await;
        state
            .cached
            .as_ref()
            .is_some_and(|token| !token.is_expired_at(self.clock.now_millis()))
    }

    fn start_fetch(&self) -> TokenFetch {
        let client = self.client.clone();
        let token_url = self.token_url.clone();
        let credentials = Arc::clone(&self.credentials);
        let clock = Arc::clone(&self.clock);

        async move { refresh::fetch_token(&client, &token_url, &credentials, clock.as_ref()).await }
            .boxed()
            .shared()
    }
}
