//! Webhook Models
//!
//! ShotGrid delivers an untyped JSON document. Fields are read optimistically:
//! anything missing or of the wrong JSON type is treated as absent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Entity type that routes a delivery to task processing.
pub const TASK_ENTITY_TYPE: &str = "Task";

/// Acknowledgement returned for every authenticated delivery
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub status: String,
}

impl WebhookAck {
    pub fn accepted() -> Self {
        Self {
            status: "accepted".to_string(),
        }
    }
}

/// A `{type, id}` link to a tracking-system record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: i64,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, id: i64) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
        }
    }

    /// Read a link object, rejecting anything without a string type and positive id.
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            entity_type: value.get("type")?.as_str()?.to_string(),
            id: positive_id(value.get("id")?)?,
        })
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.entity_type, self.id)
    }
}

/// Lookup key for a task, scoped to its project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRef {
    pub project_id: i64,
    pub task_id: i64,
}

/// Field change details attached to `*_Change` events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeMeta {
    pub attribute_name: Option<String>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// The fields of a delivery the dispatcher cares about
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventSummary {
    pub event_type: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub project_id: Option<i64>,
    pub meta: ChangeMeta,
}

/// Why a delivery was not routed to task processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NotATask(Option<String>),
    MissingProjectId,
    MissingEntityId,
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IgnoreReason::NotATask(Some(entity_type)) => {
                write!(f, "entity type {} is not handled", entity_type)
            }
            IgnoreReason::NotATask(None) => write!(f, "payload has no entity type"),
            IgnoreReason::MissingProjectId => write!(f, "task event has no project id"),
            IgnoreReason::MissingEntityId => write!(f, "task event has no entity id"),
        }
    }
}

impl EventSummary {
    pub fn from_payload(payload: &Value) -> Self {
        let data = payload.get("data");
        let field = |path: &str| data.and_then(|d| d.pointer(path));

        Self {
            event_type: field("/event_type")
                .and_then(Value::as_str)
                .map(str::to_string),
            entity_type: field("/entity/type")
                .and_then(Value::as_str)
                .map(str::to_string),
            entity_id: field("/entity/id").and_then(positive_id),
            project_id: field("/project/id").and_then(positive_id),
            meta: ChangeMeta {
                attribute_name: field("/meta/attribute_name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                old_value: field("/meta/old_value").cloned(),
                new_value: field("/meta/new_value").cloned(),
            },
        }
    }

    /// Resolve the task lookup key, or explain why this event is not a task event.
    pub fn task_ref(&self) -> Result<TaskRef, IgnoreReason> {
        if self.entity_type.as_deref() != Some(TASK_ENTITY_TYPE) {
            return Err(IgnoreReason::NotATask(self.entity_type.clone()));
        }
        let project_id = self.project_id.ok_or(IgnoreReason::MissingProjectId)?;
        let task_id = self.entity_id.ok_or(IgnoreReason::MissingEntityId)?;

        Ok(TaskRef {
            project_id,
            task_id,
        })
    }
}

/// Record ids are positive integers; ShotGrid sometimes sends them as strings.
fn positive_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (id > 0).then_some(id)
}
