use std::str::FromStr;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use super::{collect_pages, Page, PartitionedStore, StoreError};
use crate::config::ConfigError;

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "2018-12-31";
const DEFAULT_PAGE_SIZE: usize = 100;
const QUERY_ALL_DOCUMENTS: &str = r#"{"query":"SELECT * FROM c","parameters":[]}"#;

/// Parsed `AccountEndpoint=...;AccountKey=...;` connection string.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub endpoint: String,
    pub account_key: String,
}

// The account key never appears in logs.
impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("endpoint", &self.endpoint)
            .field("account_key", &"<redacted>")
            .finish()
    }
}

impl FromStr for ConnectionString {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut endpoint = None;
        let mut account_key = None;

        for segment in s.split(';').map(str::trim).filter(|seg| !seg.is_empty()) {
            // Keys are base64 and may themselves contain '='.
            let Some((name, value)) = segment.split_once('=') else {
                return Err(ConfigError::Invalid(
                    "malformed connection string segment".to_string(),
                ));
            };
            if name.eq_ignore_ascii_case("AccountEndpoint") {
                endpoint = Some(value.trim_end_matches('/').to_string());
            } else if name.eq_ignore_ascii_case("AccountKey") {
                account_key = Some(value.to_string());
            }
        }

        match (endpoint, account_key) {
            (Some(endpoint), Some(account_key)) if !endpoint.is_empty() && !account_key.is_empty() => {
                Ok(Self {
                    endpoint,
                    account_key,
                })
            }
            _ => Err(ConfigError::Invalid(
                "connection string needs both AccountEndpoint and AccountKey".to_string(),
            )),
        }
    }
}

/// Error body returned by the Cosmos DB REST API.
#[derive(Deserialize)]
struct CosmosErrorBody {
    message: String,
}

/// Query response envelope.
#[derive(Deserialize)]
struct QueryResponse {
    #[serde(rename = "Documents")]
    documents: Vec<serde_json::Value>,
}

/// Azure Cosmos DB (SQL API) container accessed over its REST interface.
///
/// Requests are signed with the account master key. Every call carries the
/// partition key header, so no operation ever fans out across partitions.
pub struct CosmosStore {
    client: reqwest::Client,
    endpoint: String,
    key: Vec<u8>,
    database: String,
    container: String,
    page_size: usize,
}

impl CosmosStore {
    pub fn new(
        connection: &ConnectionString,
        database: &str,
        container: &str,
    ) -> Result<Self, ConfigError> {
        if database.is_empty() {
            return Err(ConfigError::Invalid("cosmos database id is empty".to_string()));
        }
        if container.is_empty() {
            return Err(ConfigError::Invalid("cosmos container id is empty".to_string()));
        }
        if !connection.endpoint.starts_with("http://") && !connection.endpoint.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "cosmos endpoint '{}' is not an http(s) URL",
                connection.endpoint
            )));
        }
        let key = BASE64
            .decode(connection.account_key.as_bytes())
            .map_err(|_| ConfigError::Invalid("cosmos account key is not valid base64".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: connection.endpoint.clone(),
            key,
            database: database.to_string(),
            container: container.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Maximum number of documents requested per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn collection_link(&self) -> String {
        format!("dbs/{}/colls/{}", self.database, self.container)
    }

    fn document_link(&self, id: &str) -> String {
        format!("{}/docs/{}", self.collection_link(), id)
    }

    /// Master-key authorization token for one request.
    fn authorization(
        &self,
        verb: &str,
        resource_type: &str,
        resource_link: &str,
        date: &str,
    ) -> Result<String, StoreError> {
        let payload = format!(
            "{}\n{}\n{}\n{}\n\n",
            verb.to_lowercase(),
            resource_type.to_lowercase(),
            resource_link,
            date.to_lowercase()
        );

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| StoreError::transport("cosmos account key has an invalid length"))?;
        mac.update(payload.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());

        Ok(urlencoding::encode(&format!("type=master&ver=1.0&sig={}", signature)).into_owned())
    }

    /// Signed request against `resource_link`, sent to `path`.
    fn request(
        &self,
        method: Method,
        resource_link: &str,
        path: &str,
        partition: &str,
    ) -> Result<RequestBuilder, StoreError> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let authorization = self.authorization(method.as_str(), "docs", resource_link, &date)?;
        let partition_key = format!("[{}]", serde_json::Value::from(partition));

        Ok(self
            .client
            .request(method, format!("{}/{}", self.endpoint, path))
            .header("authorization", authorization)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
            .header("x-ms-documentdb-partitionkey", partition_key))
    }

    fn item_request(&self, method: Method, partition: &str, id: &str) -> Result<RequestBuilder, StoreError> {
        let path = format!("{}/docs/{}", self.collection_link(), urlencoding::encode(id));
        self.request(method, &self.document_link(id), &path, partition)
    }

    /// Send a request and turn non-success statuses into [`StoreError::Status`].
    async fn execute(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(StoreError::transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<CosmosErrorBody>(&body)
            .map(|err| err.message)
            .unwrap_or(body);
        debug!(%status, "cosmos request rejected");
        Err(StoreError::status(status, message))
    }

    async fn body(response: Response) -> Result<Vec<u8>, StoreError> {
        let bytes = response.bytes().await.map_err(StoreError::transport)?;
        Ok(bytes.to_vec())
    }

    async fn query_page(&self, partition: &str, continuation: Option<String>) -> Result<Page, StoreError> {
        let link = self.collection_link();
        let mut request = self
            .request(Method::POST, &link, &format!("{}/docs", link), partition)?
            .header("x-ms-documentdb-isquery", "True")
            .header(CONTENT_TYPE, "application/query+json")
            .header("x-ms-max-item-count", self.page_size.to_string())
            .body(QUERY_ALL_DOCUMENTS);
        if let Some(token) = continuation {
            request = request.header("x-ms-continuation", token);
        }

        let response = self.execute(request).await?;
        let continuation = response
            .headers()
            .get("x-ms-continuation")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = Self::body(response).await?;
        let envelope: QueryResponse = serde_json::from_slice(&body).map_err(StoreError::Decode)?;
        let items = envelope
            .documents
            .iter()
            .map(serde_json::to_vec)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::Decode)?;

        debug!(partition, items = items.len(), more = continuation.is_some(), "fetched query page");
        Ok(Page {
            items,
            continuation,
        })
    }
}

#[async_trait]
impl PartitionedStore for CosmosStore {
    async fn create_item(&self, partition: &str, payload: Vec<u8>) -> Result<Vec<u8>, StoreError> {
        let link = self.collection_link();
        let request = self
            .request(Method::POST, &link, &format!("{}/docs", link), partition)?
            .header(CONTENT_TYPE, "application/json")
            .body(payload);

        let response = self.execute(request).await?;
        Self::body(response).await
    }

    async fn replace_item(
        &self,
        partition: &str,
        id: &str,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, StoreError> {
        let request = self
            .item_request(Method::PUT, partition, id)?
            .header(CONTENT_TYPE, "application/json")
            .body(payload);

        let response = self.execute(request).await?;
        Self::body(response).await
    }

    async fn delete_item(&self, partition: &str, id: &str) -> Result<(), StoreError> {
        let request = self.item_request(Method::DELETE, partition, id)?;
        self.execute(request).await?;
        Ok(())
    }

    async fn read_item(&self, partition: &str, id: &str) -> Result<Vec<u8>, StoreError> {
        let request = self.item_request(Method::GET, partition, id)?;
        let response = self.execute(request).await?;
        Self::body(response).await
    }

    async fn list_items(&self, partition: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        collect_pages(|token| self.query_page(partition, token)).await
    }
}
