//! Background payload dispatch.
//!
//! Each delivery is handled independently: the dispatcher never returns an
//! error and never panics outward, so one malformed event cannot affect others.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info};

use crate::models::{EventSummary, IgnoreReason};
use crate::services::task_processor::{TaskHandler, TaskOutcome};

/// What became of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Ignored(IgnoreReason),
    Processed(TaskOutcome),
    Failed(String),
}

#[derive(Clone)]
pub struct PayloadDispatcher {
    handler: Arc<dyn TaskHandler>,
}

impl PayloadDispatcher {
    pub fn new(handler: Arc<dyn TaskHandler>) -> Self {
        Self { handler }
    }

    /// Run [`dispatch`](Self::dispatch) on the runtime without waiting for it.
    pub fn spawn(&self, payload: Value, delivery_id: String) -> JoinHandle<DispatchOutcome> {
        let dispatcher = self.clone();
        let span = tracing::info_span!("dispatch", delivery_id = %delivery_id);
        tokio::spawn(async move { dispatcher.dispatch(payload).await }.instrument(span))
    }

    pub async fn dispatch(&self, payload: Value) -> DispatchOutcome {
        info!("Starting payload processing...");

        let summary = EventSummary::from_payload(&payload);
        info!(
            "Event: {} | Entity: {} (id: {}) | Project id: {}",
            summary.event_type.as_deref().unwrap_or("-"),
            summary.entity_type.as_deref().unwrap_or("-"),
            display_id(summary.entity_id),
            display_id(summary.project_id),
        );
        if let Some(attribute) = &summary.meta.attribute_name {
            debug!(
                attribute = %attribute,
                old_value = ?summary.meta.old_value,
                new_value = ?summary.meta.new_value,
                "Field change"
            );
        }

        let task = match summary.task_ref() {
            Ok(task) => task,
            Err(reason) => {
                info!("Ignoring event: {}", reason);
                return DispatchOutcome::Ignored(reason);
            }
        };

        match AssertUnwindSafe(self.handler.process(task))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => {
                info!(
                    task_id = task.task_id,
                    project_id = task.project_id,
                    "✅ Payload processing complete: {}",
                    outcome
                );
                DispatchOutcome::Processed(outcome)
            }
            Ok(Err(e)) => {
                error!(
                    task_id = task.task_id,
                    project_id = task.project_id,
                    error = ?e,
                    "❌ Error processing payload: {}",
                    e
                );
                DispatchOutcome::Failed(e.to_string())
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(
                    task_id = task.task_id,
                    project_id = task.project_id,
                    "❌ Task processing panicked: {}",
                    message
                );
                DispatchOutcome::Failed(format!("panicked: {}", message))
            }
        }
    }
}

fn display_id(id: Option<i64>) -> String {
    id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
}
