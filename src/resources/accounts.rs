use serde_json::Value;

use super::or_null;
use crate::error::Result;
use crate::http_client::Transport;

/// Account endpoints
pub struct Accounts<'a> {
    transport: &'a Transport,
}

impl<'a> Accounts<'a> {
    pub(crate) fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// Account the credentials belong to
    pub async fn current(&self) -> Result<Value> {
        self.transport.get("users/current/account").await.map(or_null)
    }

    /// Accounts the credentials may operate on
    pub async fn allowed(&self) -> Result<Value> {
        self.transport
            .get("users/current/allowed-accounts")
            .await
            .map(or_null)
    }

    /// Advertiser accounts under a network account
    pub async fn advertisers(&self, network_account_id: &str) -> Result<Value> {
        let path = format!("{}/advertisers", network_account_id);
        self.transport.get(&path).await.map(or_null)
    }
}
