// Authentication types

use serde::Deserialize;
#[cfg(any(test, feature = "test-utils"))]
use std::sync::atomic::{AtomicI64, Ordering};

/// Safety margin before expiry at which a cached token stops being served
pub const EXPIRY_BUFFER_MS: i64 = 5 * 60 * 1000;

/// Lifetime assumed when the token response omits `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Bearer token together with its absolute expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub value: String,
    pub expires_at_epoch_millis: i64,
}

impl CachedToken {
    /// True once `now` is within [`EXPIRY_BUFFER_MS`] of the expiry
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        now_millis >= self.expires_at_epoch_millis - EXPIRY_BUFFER_MS
    }
}

/// OAuth token endpoint response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    #[allow(dead_code)]
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
}

/// Source of wall-clock time for expiry checks
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

/// Clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

#[cfg(any(test, feature = "test-utils"))]
impl ManualClock {
    pub fn new(now_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(now_millis),
        }
    }

    pub fn set(&self, now_millis: i64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.now.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
