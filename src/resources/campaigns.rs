use serde_json::Value;

use super::{for_resource, or_null};
use crate::error::Result;
use crate::http_client::Transport;

const RESOURCE: &str = "campaign";

/// Campaign endpoints for one account
pub struct Campaigns<'a> {
    transport: &'a Transport,
    account_id: &'a str,
}

impl<'a> Campaigns<'a> {
    pub(crate) fn new(transport: &'a Transport, account_id: &'a str) -> Self {
        Self {
            transport,
            account_id,
        }
    }

    fn collection_path(&self) -> String {
        format!("{}/campaigns/", self.account_id)
    }

    fn item_path(&self, campaign_id: &str) -> String {
        format!("{}/campaigns/{}", self.account_id, campaign_id)
    }

    pub async fn list(&self) -> Result<Value> {
        self.transport.get(&self.collection_path()).await.map(or_null)
    }

    pub async fn get(&self, campaign_id: &str) -> Result<Value> {
        let result = self.transport.get(&self.item_path(campaign_id)).await;
        for_resource(result, RESOURCE, campaign_id).map(or_null)
    }

    pub async fn create(&self, campaign: &Value) -> Result<Value> {
        self.transport
            .post(&self.collection_path(), Some(campaign))
            .await
            .map(or_null)
    }

    /// Update sends only the fields present in `changes`
    pub async fn update(&self, campaign_id: &str, changes: &Value) -> Result<Value> {
        let result = self
            .transport
            .post(&self.item_path(campaign_id), Some(changes))
            .await;
        for_resource(result, RESOURCE, campaign_id).map(or_null)
    }

    pub async fn delete(&self, campaign_id: &str) -> Result<Value> {
        let result = self.transport.delete(&self.item_path(campaign_id)).await;
        for_resource(result, RESOURCE, campaign_id).map(or_null)
    }
}
