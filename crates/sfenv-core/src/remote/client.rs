use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::RemoteClient;
use crate::config::ConnectionSettings;

const USER_AGENT: &str = concat!("sfenv/", env!("CARGO_PKG_VERSION"));

/// Errors returned by the REST client.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status} body: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("API returned {status}: {}", describe_api_errors(.errors))]
    Api {
        status: StatusCode,
        errors: Vec<ApiErrorEntry>,
    },
    #[error("invalid instance URL '{url}': {source}")]
    InvalidInstanceUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to deserialize response: {0}")]
    Deserialize(#[from] serde_json::Error),
}

pub type QueryResult<T> = Result<T, QueryError>;

/// One entry of the error array the REST API returns on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorEntry {
    pub message: String,
    pub error_code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

fn describe_api_errors(errors: &[ApiErrorEntry]) -> String {
    errors
        .iter()
        .map(|entry| format!("{}: {}", entry.error_code, entry.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single row; may carry an `attributes` object with the record type and URL.
pub type Record = Map<String, Value>;

/// Body of a successful query call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub total_size: u64,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_records_url: Option<String>,
    pub records: Vec<Record>,
}

impl QueryResponse {
    /// Column names across all records in first-seen order, without `attributes`.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for record in &self.records {
            for key in record.keys() {
                if key != "attributes" && !columns.contains(&key.as_str()) {
                    columns.push(key);
                }
            }
        }
        columns
    }
}

/// Connection to an org's REST API built from an instance URL and an access token.
///
/// The values are only checked when a query is sent.
#[derive(Debug, Clone)]
pub struct RestConnection {
    http: Client,
    instance_url: String,
    access_token: String,
    api_version: String,
}

impl RestConnection {
    pub fn new(settings: &ConnectionSettings) -> QueryResult<Self> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            instance_url: settings.instance_url.clone(),
            access_token: settings.access_token.clone(),
            api_version: settings.api_version.clone(),
        })
    }

    fn query_url(&self, soql: &str) -> QueryResult<Url> {
        let invalid = |source| QueryError::InvalidInstanceUrl {
            url: self.instance_url.clone(),
            source,
        };
        let base = Url::parse(self.instance_url.trim()).map_err(invalid)?;
        let mut url = base
            .join(&format!("/services/data/v{}/query", self.api_version))
            .map_err(invalid)?;
        url.query_pairs_mut().append_pair("q", soql);
        Ok(url)
    }
}

impl RemoteClient for RestConnection {
    async fn query(&self, soql: &str) -> QueryResult<QueryResponse> {
        let url = self.query_url(soql)?;
        debug!(%url, "sending query");

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<Vec<ApiErrorEntry>>(&text) {
                Ok(errors) if !errors.is_empty() => QueryError::Api { status, errors },
                _ => QueryError::HttpStatus { status, body: text },
            });
        }

        let body = response.text().await?;
        let payload: QueryResponse = serde_json::from_str(&body)?;
        debug!(
            total_size = payload.total_size,
            returned = payload.records.len(),
            "query completed"
        );
        Ok(payload)
    }
}
