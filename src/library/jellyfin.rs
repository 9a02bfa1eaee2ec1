use super::{LibraryClient, LibraryItem};
use crate::config::LibraryConfig;
use async_trait::async_trait;
use reelwatch_common::{Error, ExternalKey, ItemKind, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Fields requested on every item query.
const ITEM_FIELDS: &str =
    "ProviderIds,ProductionYear,PremiereDate,DateCreated,Overview,MediaStreams,MediaSources";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<LibraryItem>,
}

pub struct JellyfinClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl JellyfinClient {
    pub fn new(config: &LibraryConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .header("X-Emby-Token", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::http(format!("GET {path}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http(format!("GET {path} returned {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| Error::http(format!("GET {path}: invalid response body: {e}")))
    }

    async fn query_items(&self, query: &[(&str, &str)]) -> Result<Vec<LibraryItem>> {
        let response: ItemsResponse = self.get_json("/Items", query).await?;
        Ok(response.items)
    }
}

#[async_trait]
impl LibraryClient for JellyfinClient {
    async fn find_by_key(&self, kind: ItemKind, key: &ExternalKey) -> Result<Vec<LibraryItem>> {
        let provider_filter = format!("{}.{}", key.scheme.provider_name(), key.value);
        let items = self
            .query_items(&[
                ("Recursive", "true"),
                ("IncludeItemTypes", kind.library_type()),
                ("AnyProviderIdEquals", &provider_filter),
                ("Fields", ITEM_FIELDS),
            ])
            .await?;

        // Older servers ignore AnyProviderIdEquals and return everything.
        Ok(items
            .into_iter()
            .filter(|item| item.carries_key(key))
            .collect())
    }

    async fn item(&self, item_id: &str) -> Result<Option<LibraryItem>> {
        let items = self
            .query_items(&[("Ids", item_id), ("Fields", ITEM_FIELDS)])
            .await?;
        Ok(items.into_iter().find(|item| item.id == item_id))
    }

    async fn children(&self, parent_id: &str, kind: ItemKind) -> Result<Vec<LibraryItem>> {
        self.query_items(&[
            ("ParentId", parent_id),
            ("Recursive", "true"),
            ("IncludeItemTypes", kind.library_type()),
            ("Fields", "ProviderIds,PremiereDate,DateCreated"),
        ])
        .await
    }

    async fn primary_image(&self, item_id: &str) -> Result<Option<Vec<u8>>> {
        let path = format!("/Items/{item_id}/Images/Primary");
        let response = self
            .client
            .get(self.url(&path))
            .header("X-Emby-Token", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::http(format!("GET {path}: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::http(format!(
                "GET {path} returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::http(format!("GET {path}: {e}")))?;
        Ok(Some(bytes.to_vec()))
    }

    /// Test connectivity to Jellyfin
    async fn test_connection(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.url("/System/Info"))
            .header("X-Emby-Token", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::http(e.to_string()))?;

        Ok(response.status().is_success())
    }
}
