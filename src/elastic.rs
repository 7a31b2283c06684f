// src/elastic.rs
use crate::error::{Result, WriterError};
use crate::mapping::Record;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Document types were removed from the server in this major version.
const TYPELESS_MAJOR_VERSION: u64 = 7;

/// Metadata line of a bulk `index` action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexAction {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkOperation {
    pub action: IndexAction,
    pub document: Record,
}

#[derive(Serialize)]
struct ActionLine<'a> {
    index: &'a IndexAction,
}

/// Encodes operations as the newline-delimited bulk request body.
pub fn encode_bulk_body(operations: &[BulkOperation]) -> Result<String> {
    let mut body = String::new();
    for op in operations {
        body.push_str(&serde_json::to_string(&ActionLine { index: &op.action })?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&op.document)?);
        body.push('\n');
    }
    Ok(body)
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    pub errors: bool,
    /// One single-entry map per operation, keyed by the action name.
    #[serde(default)]
    pub items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkItem {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    pub status: u16,
    #[serde(default)]
    pub error: Option<Value>,
}

impl BulkItem {
    pub fn is_failed(&self) -> bool {
        self.status >= 400
    }

    /// `type; reason` for structured errors, the raw text otherwise.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Object(fields) => {
                let parts: Vec<String> = ["type", "reason"]
                    .iter()
                    .filter_map(|key| fields.get(*key))
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                Some(parts.join("; "))
            }
            other => Some(other.to_string()),
        }
    }
}

/// The document store operations the writer depends on.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Whether the server still groups documents by type inside an index.
    fn supports_types(&self) -> bool;

    async fn ping(&self) -> Result<()>;

    async fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse>;

    async fn index_exists(&self, index: &str) -> Result<bool>;

    async fn create_index(&self, index: &str, body: Value) -> Result<()>;

    /// Names of all indices currently present.
    async fn index_names(&self) -> Result<Vec<String>>;

    /// Raw `GET /<index>/_mapping` response.
    async fn mapping(&self, index: &str) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// HTTP client for an Elasticsearch server.
#[derive(Debug, Clone)]
pub struct ElasticClient {
    http: Client,
    base_url: String,
    credentials: Option<Credentials>,
    version: String,
}

impl ElasticClient {
    /// Builds a client and reads the server version from the root endpoint.
    pub async fn connect(host: &str, port: u16, credentials: Option<Credentials>) -> Result<Self> {
        let mut client = Self {
            http: Client::builder().build()?,
            base_url: base_url(host, port),
            credentials,
            version: String::new(),
        };

        let info = client.get_json("/").await?;
        client.version = info
            .pointer("/version/number")
            .and_then(Value::as_str)
            .ok_or_else(|| WriterError::UnexpectedResponse {
                endpoint: "/".to_string(),
                detail: "missing version.number".to_string(),
            })?
            .to_string();
        debug!(url = %client.base_url, version = %client.version, "connected to server");

        Ok(client)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.credentials {
            Some(c) => builder.basic_auth(&c.username, Some(&c.password)),
            None => builder,
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let response = self.request(Method::GET, path).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(unexpected(path, status, response.text().await.unwrap_or_default()));
        }
        Ok(response.json().await?)
    }
}

fn base_url(host: &str, port: u16) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}:{}", host, port)
    } else {
        format!("http://{}:{}", host, port)
    }
}

fn unexpected(endpoint: &str, status: StatusCode, body: String) -> WriterError {
    WriterError::UnexpectedResponse {
        endpoint: endpoint.to_string(),
        detail: format!("{} {}", status, body),
    }
}

fn major_version(version: &str) -> Option<u64> {
    version.split('.').next()?.parse().ok()
}

#[async_trait]
impl Destination for ElasticClient {
    fn supports_types(&self) -> bool {
        major_version(&self.version).is_some_and(|major| major < TYPELESS_MAJOR_VERSION)
    }

    async fn ping(&self) -> Result<()> {
        let response = self.request(Method::HEAD, "/").send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(unexpected("/", status, String::new()))
        }
    }

    async fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse> {
        let body = encode_bulk_body(operations)?;
        let response = self
            .request(Method::POST, "/_bulk")
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(unexpected("/_bulk", status, response.text().await.unwrap_or_default()));
        }
        Ok(response.json().await?)
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let path = format!("/{}", index);
        let response = self.request(Method::HEAD, &path).send().await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(unexpected(&path, status, String::new())),
        }
    }

    async fn create_index(&self, index: &str, body: Value) -> Result<()> {
        let path = format!("/{}", index);
        let response = self.request(Method::PUT, &path).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(unexpected(&path, status, response.text().await.unwrap_or_default()));
        }
        Ok(())
    }

    async fn index_names(&self) -> Result<Vec<String>> {
        let stats = self.get_json("/_stats").await?;
        Ok(stats
            .get("indices")
            .and_then(Value::as_object)
            .map(|indices| indices.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn mapping(&self, index: &str) -> Result<Value> {
        self.get_json(&format!("/{}/_mapping", index)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bulk_body_is_ndjson() {
        let mut document = Record::new();
        document.insert("id".into(), json!("1"));
        document.insert("n".into(), json!(2));
        let ops = vec![BulkOperation {
            action: IndexAction {
                index: "idx".into(),
                doc_type: Some("doc".into()),
                id: Some("1".into()),
            },
            document,
        }];

        let body = encode_bulk_body(&ops).unwrap();
        assert_eq!(
            body,
            "{\"index\":{\"_index\":\"idx\",\"_type\":\"doc\",\"_id\":\"1\"}}\n{\"id\":\"1\",\"n\":2}\n"
        );
    }

    #[test]
    fn action_omits_absent_type_and_id() {
        let action = IndexAction {
            index: "idx".into(),
            doc_type: None,
            id: None,
        };
        assert_eq!(serde_json::to_value(&action).unwrap(), json!({ "_index": "idx" }));
    }

    #[test]
    fn bulk_response_item_errors() {
        let response: BulkResponse = serde_json::from_value(json!({
            "took": 5,
            "errors": true,
            "items": [
                { "index": { "_id": "1", "status": 201 } },
                { "index": { "_id": "2", "status": 400, "error": {
                    "type": "mapper_parsing_exception",
                    "reason": "failed to parse field [n]",
                    "caused_by": {}
                } } },
                { "index": { "_id": "3", "status": 429, "error": "queue full" } }
            ]
        }))
        .unwrap();

        let failed: Vec<&BulkItem> = response
            .items
            .iter()
            .flat_map(|item| item.values())
            .filter(|item| item.is_failed())
            .collect();
        assert_eq!(failed.len(), 2);
        assert_eq!(
            failed[0].error_message().unwrap(),
            "mapper_parsing_exception; failed to parse field [n]"
        );
        assert_eq!(failed[1].error_message().unwrap(), "queue full");
    }

    #[test]
    fn base_url_defaults_to_http() {
        assert_eq!(base_url("localhost", 9200), "http://localhost:9200");
        assert_eq!(base_url("https://es.example.com/", 443), "https://es.example.com:443");
    }

    #[test]
    fn major_version_parsing() {
        assert_eq!(major_version("6.8.23"), Some(6));
        assert_eq!(major_version("8.11.0"), Some(8));
        assert_eq!(major_version(""), None);
    }
}
