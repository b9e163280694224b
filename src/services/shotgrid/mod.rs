//! Tracking-system access.
//!
//! The processor only needs two operations from ShotGrid: a generic `find`
//! query and script-user authentication. Both sit behind [`TrackingClient`] so
//! tests and alternative transports can stand in for the REST client.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

pub mod client;
pub use client::ShotgridClient;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ShotGrid returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// One `[field, operator, value]` filter clause.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter(pub String, pub String, pub Value);

impl Filter {
    pub fn is(field: impl Into<String>, value: Value) -> Self {
        Filter(field.into(), "is".to_string(), value)
    }

    /// Match a link field against a `{type, id}` record.
    pub fn is_entity(field: impl Into<String>, entity_type: &str, id: i64) -> Self {
        Self::is(field, json!({"type": entity_type, "id": id}))
    }
}

/// Authenticated script-user credentials handed to the toolkit bootstrap.
#[derive(Clone, PartialEq)]
pub struct ScriptUser {
    pub site: String,
    pub script_name: String,
    pub script_key: String,
}

impl fmt::Debug for ScriptUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptUser")
            .field("site", &self.site)
            .field("script_name", &self.script_name)
            .field("script_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait TrackingClient: Send + Sync {
    /// Return every record of `entity_type` matching all `filters`.
    ///
    /// Records are flat objects holding `type`, `id` and the requested fields;
    /// link fields hold `{type, id, ...}` objects or `null`.
    async fn find(
        &self,
        entity_type: &str,
        filters: &[Filter],
        fields: &[&str],
    ) -> Result<Vec<Value>, TrackingError>;

    /// Confirm the pre-provisioned script credentials are accepted by the site.
    async fn authenticate(&self) -> Result<ScriptUser, TrackingError>;
}
