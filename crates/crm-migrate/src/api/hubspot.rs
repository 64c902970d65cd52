//! HubSpot CRM v3 batch API client.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{
    build_http_client, parse_response, BatchResponse, CreateInput, DestinationApi,
    DestinationObject, UpdateInput,
};
use crate::config::DestinationConfig;
use crate::error::Result;

/// Bearer-authenticated client for `/crm/v3/objects/{object}/batch/*`.
pub struct HubSpotClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HubSpotClient {
    pub fn new(config: &DestinationConfig) -> Result<Self> {
        Ok(Self::with_client(
            build_http_client()?,
            &config.base_url,
            &config.access_token,
        ))
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str, access_token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn batch_url(&self, object: &str, operation: &str) -> String {
        format!("{}/crm/v3/objects/{}/batch/{}", self.base_url, object, operation)
    }

    async fn post_batch(
        &self,
        object: &str,
        operation: &str,
        body: serde_json::Value,
    ) -> Result<Vec<DestinationObject>> {
        let url = self.batch_url(object, operation);
        debug!(%url, "POST");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        let parsed: BatchResponse = parse_response(response).await?;
        Ok(parsed.results)
    }
}

#[async_trait]
impl DestinationApi for HubSpotClient {
    async fn batch_read(
        &self,
        object: &str,
        id_property: &str,
        ids: &[String],
    ) -> Result<Vec<DestinationObject>> {
        let inputs: Vec<_> = ids.iter().map(|id| json!({ "id": id })).collect();
        let body = json!({
            "idProperty": id_property,
            "properties": [id_property],
            "inputs": inputs,
        });
        self.post_batch(object, "read", body).await
    }

    async fn batch_create(&self, object: &str, inputs: &[CreateInput]) -> Result<Vec<DestinationObject>> {
        self.post_batch(object, "create", json!({ "inputs": inputs })).await
    }

    async fn batch_update(&self, object: &str, inputs: &[UpdateInput]) -> Result<Vec<DestinationObject>> {
        self.post_batch(object, "update", json!({ "inputs": inputs })).await
    }
}
