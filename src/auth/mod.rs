// Authentication module
// Manages the OAuth client-credentials token lifecycle

mod credentials;
mod manager;
mod refresh;
mod types;

pub use credentials::Credentials;
pub use manager::TokenManager;
pub use types::{CachedToken, Clock, SystemClock, EXPIRY_BUFFER_MS};

#[cfg(any(test, feature = "test-utils"))]
pub use types::ManualClock;
