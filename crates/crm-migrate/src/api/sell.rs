//! Zendesk Sell REST v2 client.

use async_trait::async_trait;
use tracing::debug;

use super::{build_http_client, parse_response, Page, SourceApi};
use crate::config::SourceConfig;
use crate::error::Result;
use crate::object_type::ObjectType;

/// Bearer-authenticated client for the Sell list endpoints.
pub struct SellClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl SellClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self::with_client(
            build_http_client()?,
            &config.base_url,
            &config.access_token,
        ))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, access_token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn list_request(&self, object_type: ObjectType, page: u32, per_page: usize) -> (String, Vec<(String, String)>) {
        let (path, filters) = object_type.source_endpoint();
        let mut query = vec![
            ("page".to_string(), page.to_string()),
            ("per_page".to_string(), per_page.to_string()),
        ];
        query.extend(filters.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        (format!("{}{}", self.base_url, path), query)
    }
}

#[async_trait]
impl SourceApi for SellClient {
    async fn list(&self, object_type: ObjectType, page: u32, per_page: usize) -> Result<Page> {
        let (url, query) = self.list_request(object_type, page, per_page);
        debug!(%url, page, per_page, object = %object_type, "GET");
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&query)
            .send()
            .await?;
        parse_response(response).await
    }
}
