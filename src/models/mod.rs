// Data models
// Webhook payload views and tracking-system references.

pub mod webhook;

pub use webhook::{ChangeMeta, EntityRef, EventSummary, IgnoreReason, TaskRef, WebhookAck};
