// Client credential pair for the OAuth client-credentials grant

use std::fmt;

use crate::error::{Error, Result};

/// Client id / secret pair. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    /// Build a credential pair, rejecting empty (or whitespace-only) values
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();

        if client_id.trim().is_empty() {
            return Err(Error::Config("client_id must not be empty".to_string()));
        }
        if client_secret.trim().is_empty() {
            return Err(Error::Config("client_secret must not be empty".to_string()));
        }

        Ok(Self {
            client_id,
            client_secret,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Form fields for the token request
    pub(crate) fn form(&self) -> [(&'static str, &str); 3] {
        [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ]
    }
}

// Never print the secret
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_values() {
        let err = Credentials::new("", "secret").unwrap_err();
        assert!(err.to_string().contains("client_id"));

        let err = Credentials::new("   ", "secret").unwrap_err();
        assert!(err.to_string().contains("client_id"));

        let err = Credentials::new("id", "").unwrap_err();
        assert!(err.to_string().contains("client_secret"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("my-client", "super-secret").unwrap();
        let debug = format!("{:?}", creds);
        assert!(debug.contains("my-client"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_form_fields() {
        let creds = Credentials::new("id", "secret").unwrap();
        let form = creds.form();
        assert_eq!(form[0], ("grant_type", "client_credentials"));
        assert_eq!(form[1], ("client_id", "id"));
        assert_eq!(form[2], ("client_secret", "secret"));
    }
}
