// Error handling module
// Defines the API error taxonomy and the status code mapping

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Fallback message when a response body carries nothing usable
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Kind of API failure, with the extra data each kind carries
#[derive(Debug, Clone, PartialEq)]
pub enum ApiErrorKind {
    /// Any status without a dedicated kind
    Generic,

    /// 401, or a failed token fetch
    Auth,

    /// 400 Bad Request
    Validation {
        /// Field-level errors, copied verbatim from the `errors` object
        field_errors: Option<Value>,
    },

    /// 404 Not Found
    NotFound {
        resource_type: Option<String>,
        resource_id: Option<String>,
    },

    /// 429 Too Many Requests
    RateLimit {
        /// Seconds the server asked us to wait
        retry_after: Option<u64>,
    },

    /// 403 Forbidden
    Forbidden,

    /// Any 5xx
    Server,
}

impl ApiErrorKind {
    /// Short name used in log lines and `Display`
    pub fn name(&self) -> &'static str {
        match self {
            ApiErrorKind::Generic => "Generic",
            ApiErrorKind::Auth => "Auth",
            ApiErrorKind::Validation { .. } => "Validation",
            ApiErrorKind::NotFound { .. } => "NotFound",
            ApiErrorKind::RateLimit { .. } => "RateLimit",
            ApiErrorKind::Forbidden => "Forbidden",
            ApiErrorKind::Server => "Server",
        }
    }

    /// Message used when an error is constructed without one
    pub fn default_message(&self) -> &'static str {
        match self {
            ApiErrorKind::Generic => UNKNOWN_ERROR,
            ApiErrorKind::Auth => "Authentication failed",
            ApiErrorKind::Validation { .. } => "Validation failed",
            ApiErrorKind::NotFound { .. } => "Resource not found",
            ApiErrorKind::RateLimit { .. } => "Rate limit exceeded",
            ApiErrorKind::Forbidden => "Access forbidden",
            ApiErrorKind::Server => "Server error",
        }
    }
}

/// Error returned by the remote API, or synthesized by the transport
/// when no usable response exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    kind: ApiErrorKind,
    message: String,
    status_code: Option<u16>,
    response: Option<Value>,
    url: Option<String>,
    network: bool,
}

impl ApiError {
    /// Create an error of the given kind with an explicit message
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            response: None,
            url: None,
            network: false,
        }
    }

    /// Create an error of the given kind with its default message
    pub fn from_kind(kind: ApiErrorKind) -> Self {
        let message = kind.default_message();
        Self::new(kind, message)
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Generic, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Auth, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Server, message)
    }

    /// Error for a request that never produced an HTTP response
    /// (DNS failure, refused connection, timeout). Carries no status code.
    pub fn network(message: impl fmt::Display) -> Self {
        let mut error = Self::generic(format!("Network error: {}", message));
        error.network = true;
        error
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Attach the resource a NotFound error refers to. No-op for other kinds.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        if let ApiErrorKind::NotFound {
            resource_type: ref mut ty,
            resource_id: ref mut id,
        } = self.kind
        {
            *ty = Some(resource_type.into());
            *id = Some(resource_id.into());
        }
        self
    }

    /// Set retry-after on a RateLimit error when the body did not provide one
    pub fn with_retry_after_fallback(mut self, seconds: Option<u64>) -> Self {
        if let ApiErrorKind::RateLimit {
            ref mut retry_after,
        } = self.kind
        {
            if retry_after.is_none() {
                *retry_after = seconds;
            }
        }
        self
    }

    pub fn kind(&self) -> &ApiErrorKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Raw response payload, if one was captured
    pub fn response(&self) -> Option<&Value> {
        self.response.as_ref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn field_errors(&self) -> Option<&Value> {
        match &self.kind {
            ApiErrorKind::Validation { field_errors } => field_errors.as_ref(),
            _ => None,
        }
    }

    pub fn resource_type(&self) -> Option<&str> {
        match &self.kind {
            ApiErrorKind::NotFound { resource_type, .. } => resource_type.as_deref(),
            _ => None,
        }
    }

    pub fn resource_id(&self) -> Option<&str> {
        match &self.kind {
            ApiErrorKind::NotFound { resource_id, .. } => resource_id.as_deref(),
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self.kind {
            ApiErrorKind::RateLimit { retry_after } => retry_after,
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        self.kind == ApiErrorKind::Auth
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ApiErrorKind::NotFound { .. })
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self.kind, ApiErrorKind::RateLimit { .. })
    }

    /// True for errors synthesized from a failure with no HTTP response
    pub fn is_network_error(&self) -> bool {
        self.network
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(status) => write!(f, "{} error ({}): {}", self.kind.name(), status, self.message),
            None => write!(f, "{} error: {}", self.kind.name(), self.message),
        }
    }
}

impl std::error::Error for ApiError {}

/// Pick the most specific message a response body offers.
///
/// Looks at `message`, then `error`, then `error_description`; only string
/// values count. Anything that is not a JSON object yields [`UNKNOWN_ERROR`].
pub fn extract_message(body: Option<&Value>) -> String {
    message_from_body(body).unwrap_or_else(|| UNKNOWN_ERROR.to_string())
}

pub(crate) fn message_from_body(body: Option<&Value>) -> Option<String> {
    let object = body?.as_object()?;
    ["message", "error", "error_description"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// Interpret a raw response body: JSON when it parses, the raw text
/// otherwise, nothing when empty.
pub(crate) fn body_from_text(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

fn retry_after_from_body(body: Option<&Value>) -> Option<u64> {
    let value = body?.get("retry_after")?;
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| secs.ceil() as u64)
    })
}

/// Map a failed HTTP response to an [`ApiError`].
///
/// Pure and total: every status code lands on exactly one kind, and the
/// status code itself is always preserved.
pub fn parse_api_error(status: u16, body: Option<Value>, url: Option<&str>) -> ApiError {
    let body = body.filter(|value| !value.is_null());
    let message = extract_message(body.as_ref());

    let kind = match status {
        400 => ApiErrorKind::Validation {
            field_errors: body
                .as_ref()
                .and_then(|b| b.get("errors"))
                .filter(|errors| errors.is_object())
                .cloned(),
        },
        401 => ApiErrorKind::Auth,
        403 => ApiErrorKind::Forbidden,
        404 => ApiErrorKind::NotFound {
            resource_type: None,
            resource_id: None,
        },
        429 => ApiErrorKind::RateLimit {
            retry_after: retry_after_from_body(body.as_ref()),
        },
        500..=599 => ApiErrorKind::Server,
        _ => ApiErrorKind::Generic,
    };

    let mut error = ApiError::new(kind, message).with_status(status);
    if let Some(body) = body {
        error = error.with_response(body);
    }
    if let Some(url) = url {
        error = error.with_url(url);
    }
    error
}

/// Errors produced by this crate
#[derive(Error, Debug)]
pub enum Error {
    /// The API rejected the call, or it could not reach the API
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request body failed to serialize, or a successful response did not
    /// deserialize into the expected type
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unexpected failure not tied to an API response
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    /// The API error, if this is one
    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;
