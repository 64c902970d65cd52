//! Thin authenticated clients for the source and destination CRMs.
//!
//! The engine only sees the [`SourceApi`] and [`DestinationApi`] traits, so
//! tests swap in in-memory fakes. Neither client retries on its own: every
//! call is wrapped by the caller's [`RetryPolicy`](crate::retry::RetryPolicy).

mod hubspot;
mod sell;

pub use hubspot::HubSpotClient;
pub use sell::SellClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::{MigrateError, Result};
use crate::object_type::ObjectType;
use crate::record::deserialize_destination_id;
use crate::resolver::AssociationSpec;

/// Per-request timeout for both clients.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One page of source records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    /// Number of items on this page. Zero ends pagination.
    #[serde(default)]
    pub count: usize,
}

/// Paginated read access to the source CRM.
#[async_trait]
pub trait SourceApi: Send + Sync {
    /// Fetch one page (1-based) of an object type.
    async fn list(&self, object_type: ObjectType, page: u32, per_page: usize) -> Result<Page>;
}

/// An object as returned by the destination's batch endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationObject {
    #[serde(deserialize_with = "deserialize_destination_id")]
    pub id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl DestinationObject {
    /// Property rendered as text, whatever its JSON type.
    pub fn property_text(&self, name: &str) -> Option<String> {
        match self.properties.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Payload for one object in a batch create.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateInput {
    pub properties: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub associations: Vec<AssociationSpec>,
}

/// Payload for one object in a batch update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateInput {
    pub id: String,
    pub properties: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub associations: Vec<AssociationSpec>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchResponse {
    #[serde(default)]
    pub results: Vec<DestinationObject>,
}

/// Batch read/create/update access to the destination CRM.
///
/// `object` is the destination collection name (`contacts`, `companies`,
/// `deals`, `notes`, `tasks`, `calls`).
#[async_trait]
pub trait DestinationApi: Send + Sync {
    /// Read objects whose `id_property` equals one of `ids`.
    async fn batch_read(
        &self,
        object: &str,
        id_property: &str,
        ids: &[String],
    ) -> Result<Vec<DestinationObject>>;

    async fn batch_create(&self, object: &str, inputs: &[CreateInput]) -> Result<Vec<DestinationObject>>;

    async fn batch_update(&self, object: &str, inputs: &[UpdateInput]) -> Result<Vec<DestinationObject>>;
}

pub(crate) fn build_http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Map a non-success status to [`MigrateError::RateLimited`] or
/// [`MigrateError::Remote`], otherwise decode the JSON body.
pub(crate) async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(MigrateError::remote(status.as_u16(), body));
    }
    Ok(response.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_defaults() {
        let page: Page = serde_json::from_value(json!({"items": [{"data": {"id": 1}}]})).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.meta.count, 0);
    }

    #[test]
    fn test_destination_object_numeric_id() {
        let obj: DestinationObject = serde_json::from_value(json!({
            "id": 512,
            "properties": {"zendesk_id": 9, "email": "A@B.C", "phone": null}
        }))
        .unwrap();
        assert_eq!(obj.id, "512");
        assert_eq!(obj.property_text("zendesk_id").as_deref(), Some("9"));
        assert_eq!(obj.property_text("email").as_deref(), Some("A@B.C"));
        assert!(obj.property_text("phone").is_none());
    }

    #[test]
    fn test_inputs_omit_empty_associations() {
        let input = CreateInput {
            properties: Map::new(),
            associations: Vec::new(),
        };
        assert_eq!(serde_json::to_value(&input).unwrap(), json!({"properties": {}}));
    }
}
