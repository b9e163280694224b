//! ShotGrid REST API client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{Filter, ScriptUser, TrackingClient, TrackingError};
use crate::config::ShotgridConfig;

/// Content type that lets `_search` take filters as `[field, op, value]` arrays.
const ARRAY_FILTER_CONTENT_TYPE: &str = "application/vnd+shotgun.api3_array+json";

const PAGE_SIZE: usize = 500;

/// Tokens are refreshed this long before the server-side expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(30);

const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Value>,
}

/// Script-authenticated ShotGrid client
#[derive(Clone)]
pub struct ShotgridClient {
    http: Client,
    config: ShotgridConfig,
    token: Arc<RwLock<Option<CachedToken>>>,
}

impl ShotgridClient {
    pub fn new(config: ShotgridConfig) -> Result<Self, TrackingError> {
        let http = Client::builder().timeout(config.http_timeout).build()?;

        Ok(Self {
            http,
            config,
            token: Arc::new(RwLock::new(None)),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.config.site, path)
    }

    /// Return a cached bearer token, requesting a new one when it is close to expiry.
    async fn access_token(&self) -> Result<String, TrackingError> {
        if let Some(token) = self.token.read().await.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        let mut guard = self.token.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(token) = guard.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *guard = Some(token);
        Ok(access_token)
    }

    async fn request_token(&self) -> Result<CachedToken, TrackingError> {
        debug!(script = %self.config.script_name, "Requesting ShotGrid access token");

        let response = self
            .http
            .post(self.api_url("/auth/access_token"))
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.script_name.as_str()),
                ("client_secret", self.config.script_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED
        {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackingError::Authentication(format!(
                "script {} was rejected ({}): {}",
                self.config.script_name, status, body
            )));
        }

        let token: TokenResponse = check_status(response).await?.json().await.map_err(|e| {
            TrackingError::Decode(format!("invalid access token response: {}", e))
        })?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS));
        Ok(CachedToken {
            access_token: token.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        })
    }

    async fn search_page(
        &self,
        entity_type: &str,
        body: &Value,
        page: usize,
    ) -> Result<Vec<Value>, TrackingError> {
        let token = self.access_token().await?;
        let page_number = page.to_string();
        let page_size = PAGE_SIZE.to_string();

        let response = self
            .http
            .post(self.api_url(&format!("/entity/{}/_search", collection_name(entity_type))))
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, ARRAY_FILTER_CONTENT_TYPE)
            .query(&[("page[number]", page_number), ("page[size]", page_size)])
            .body(body.to_string())
            .send()
            .await?;

        let search: SearchResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| TrackingError::Decode(format!("invalid search response: {}", e)))?;

        Ok(search.data)
    }
}

#[async_trait]
impl TrackingClient for ShotgridClient {
    async fn find(
        &self,
        entity_type: &str,
        filters: &[Filter],
        fields: &[&str],
    ) -> Result<Vec<Value>, TrackingError> {
        let body = json!({
            "filters": filters,
            "fields": fields,
        });

        let mut records = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.search_page(entity_type, &body, page).await?;
            let fetched = batch.len();
            records.extend(batch.into_iter().map(flatten_record));

            if fetched < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        debug!(
            entity_type = %entity_type,
            count = records.len(),
            "ShotGrid find completed"
        );
        Ok(records)
    }

    async fn authenticate(&self) -> Result<ScriptUser, TrackingError> {
        // Always go back to the site so revoked keys are noticed
        let token = self.request_token().await?;
        *self.token.write().await = Some(token);

        info!(script = %self.config.script_name, site = %self.config.site, "Script user authenticated");
        Ok(ScriptUser {
            site: self.config.site.clone(),
            script_name: self.config.script_name.clone(),
            script_key: self.config.script_key.clone(),
        })
    }
}

async fn check_status(response: Response) -> Result<Response, TrackingError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TrackingError::Status {
        status: status.as_u16(),
        body,
    })
}

/// REST collection for an entity type: `Task` -> `tasks`, `HumanUser` -> `human_users`.
fn collection_name(entity_type: &str) -> String {
    let mut name = String::with_capacity(entity_type.len() + 2);
    for (i, ch) in entity_type.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                name.push('_');
            }
            name.push(ch.to_ascii_lowercase());
        } else {
            name.push(ch);
        }
    }
    name.push('s');
    name
}

/// Collapse a JSON:API style record into `{type, id, field: value, ...}`.
///
/// Relationship fields become their `data` member, so a task's `entity` reads
/// as `{type, id, name}` (or `null` when unlinked).
fn flatten_record(record: Value) -> Value {
    let Value::Object(mut object) = record else {
        return record;
    };

    let mut flat = Map::new();
    if let Some(entity_type) = object.remove("type") {
        flat.insert("type".to_string(), entity_type);
    }
    if let Some(id) = object.remove("id") {
        flat.insert("id".to_string(), id);
    }
    if let Some(Value::Object(attributes)) = object.remove("attributes") {
        flat.extend(attributes);
    }
    if let Some(Value::Object(relationships)) = object.remove("relationships") {
        for (field, relationship) in relationships {
            let data = match relationship {
                Value::Object(mut rel) => rel.remove("data").unwrap_or(Value::Null),
                other => other,
            };
            flat.insert(field, data);
        }
    }

    Value::Object(flat)
}
