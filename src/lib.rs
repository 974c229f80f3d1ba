// Backstage API client - library root

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http_client;
pub mod resources;

pub use auth::TokenManager;
pub use client::BackstageClient;
pub use config::ClientConfig;
pub use error::{parse_api_error, ApiError, ApiErrorKind, Error, Result};
pub use http_client::{HttpMethod, Transport};
