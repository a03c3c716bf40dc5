//! Hosted platform REST client
//!
//! One reqwest client serves the data-collection query API, the media
//! download-URL API and the pricing-plan/member APIs. It implements
//! [`DataStore`], [`MediaResolver`] and [`MembershipDirectory`] so the services
//! never see HTTP.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use shelf_common::config::PlatformConfig;
use shelf_common::Record;
use std::time::Duration;
use thiserror::Error;

use super::bulk_fetcher::{DataQuery, DataStore, Page};
use super::media_resolver::{MediaResolver, INTERNAL_MEDIA_SCHEME};
use super::membership::{MembersPage, MembershipDirectory, OrdersPage};

const USER_AGENT: &str = concat!("shelf-api/", env!("CARGO_PKG_VERSION"));
const SITE_ID_HEADER: &str = "wix-site-id";

/// Platform client errors
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No download URL for {0}")]
    MissingDownloadUrl(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Data item query response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    data_items: Vec<DataItem>,
    #[serde(default)]
    paging_metadata: Option<PagingMetadata>,
}

#[derive(Debug, Deserialize)]
struct DataItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    data: Record,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PagingMetadata {
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    total: Option<usize>,
    #[serde(default)]
    has_next: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadUrlResponse {
    #[serde(default)]
    download_urls: Vec<DownloadUrl>,
}

#[derive(Debug, Deserialize)]
struct DownloadUrl {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlansResponse {
    #[serde(default)]
    plans: Vec<Record>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrdersResponse {
    #[serde(default)]
    orders: Vec<Record>,
    #[serde(default)]
    paging_metadata: PagingMetadata,
}

#[derive(Debug, Deserialize)]
struct MembersResponse {
    #[serde(default)]
    members: Vec<Record>,
    #[serde(default)]
    metadata: MembersMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct MembersMetadata {
    #[serde(default)]
    count: Option<usize>,
}

/// Whether another page follows
///
/// Prefers the server's `hasNext`, then `total`, then a full page as the hint.
fn has_next_page(meta: &PagingMetadata, offset: usize, received: usize, limit: usize) -> bool {
    let count = meta.count.unwrap_or(received);
    if let Some(has_next) = meta.has_next {
        return has_next;
    }
    if let Some(total) = meta.total {
        return meta.offset.unwrap_or(offset) + count < total;
    }
    count == limit
}

/// File id of an internal media reference
///
/// `wix:image://v1/<id>/<display name>#<hints>` → `<id>`; ids may themselves
/// contain slashes (`ugd/file.pdf`), only the trailing display name is dropped.
pub fn media_file_id(reference: &str) -> Option<String> {
    let rest = reference.strip_prefix(INTERNAL_MEDIA_SCHEME)?;
    let (_, path) = rest.split_once("://v1/")?;
    let path = path.split('#').next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let id_segments = match segments.len() {
        0 => return None,
        1 => &segments[..],
        n => &segments[..n - 1],
    };
    Some(id_segments.join("/"))
}

/// Hosted platform API client
pub struct PlatformClient {
    http_client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    site_id: Option<String>,
}

impl PlatformClient {
    pub fn new(config: &PlatformConfig) -> Result<Self, PlatformError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            site_id: config.site_id.clone(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        match &self.site_id {
            Some(site) => request.header(SITE_ID_HEADER, site),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, PlatformError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| PlatformError::Parse(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, PlatformError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Platform GET");
        self.send(self.http_client.get(&url).query(query)).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, PlatformError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Platform POST");
        self.send(self.http_client.post(&url).json(body)).await
    }
}

#[async_trait]
impl DataStore for PlatformClient {
    async fn query_page(&self, query: &DataQuery, offset: usize) -> Result<Page, PlatformError> {
        let limit = query.page_limit();
        let mut body = json!({
            "dataCollectionId": query.collection(),
            "query": {
                "filter": query.filter_json(),
                "sort": query.sort_json(),
                "paging": { "limit": limit, "offset": offset },
            },
        });
        if !query.includes().is_empty() {
            let options: Vec<Value> = query
                .includes()
                .iter()
                .map(|field| json!({ "fieldName": field }))
                .collect();
            body["referencedItemOptions"] = Value::Array(options);
        }

        let response: QueryResponse = self.post("/wix-data/v2/items/query", &body).await?;

        let items: Vec<Record> = response
            .data_items
            .into_iter()
            .map(|item| {
                let mut data = item.data;
                if let Some(id) = item.id {
                    data.entry("_id").or_insert(Value::String(id));
                }
                data
            })
            .collect();

        let meta = response.paging_metadata.unwrap_or_default();
        let has_next = has_next_page(&meta, offset, items.len(), limit);

        tracing::debug!(
            collection = %query.collection(),
            offset,
            items = items.len(),
            has_next,
            "Fetched data page"
        );

        Ok(Page { items, has_next })
    }
}

#[async_trait]
impl MediaResolver for PlatformClient {
    async fn resolve(&self, reference: &str) -> Result<String, PlatformError> {
        let file_id = media_file_id(reference)
            .ok_or_else(|| PlatformError::Parse(format!("not a media reference: {}", reference)))?;

        let response: DownloadUrlResponse = self
            .post(
                "/site-media/v1/files/generate-file-download-url",
                &json!({ "fileId": file_id }),
            )
            .await?;

        response
            .download_urls
            .into_iter()
            .find_map(|d| d.url.filter(|u| !u.is_empty()))
            .ok_or_else(|| PlatformError::MissingDownloadUrl(reference.to_string()))
    }
}

#[async_trait]
impl MembershipDirectory for PlatformClient {
    async fn public_plans(&self) -> Result<Vec<Record>, PlatformError> {
        let response: PlansResponse = self.get("/pricing-plans/v2/plans/public", &[]).await?;
        Ok(response.plans)
    }

    async fn orders_page(&self, limit: usize, offset: usize) -> Result<OrdersPage, PlatformError> {
        let response: OrdersResponse = self
            .get(
                "/pricing-plans/v2/orders",
                &[("limit", limit.to_string()), ("offset", offset.to_string())],
            )
            .await?;

        let received = response.orders.len();
        let meta = response.paging_metadata;
        Ok(OrdersPage {
            has_next: has_next_page(&meta, offset, received, limit),
            offset: meta.offset.unwrap_or(offset),
            count: meta.count.unwrap_or(received),
            orders: response.orders,
        })
    }

    async fn members_page(&self, limit: usize, offset: usize) -> Result<MembersPage, PlatformError> {
        let response: MembersResponse = self
            .get(
                "/members/v1/members",
                &[
                    ("paging.limit", limit.to_string()),
                    ("paging.offset", offset.to_string()),
                ],
            )
            .await?;

        Ok(MembersPage {
            count: response.metadata.count.unwrap_or(response.members.len()),
            members: response.members,
        })
    }
}
