// Webhook processing services
// Tracking-system client, toolkit bridge, task processing and dispatch

pub mod dispatcher;
pub mod shotgrid;
pub mod task_processor;
pub mod toolkit;

pub use dispatcher::{DispatchOutcome, PayloadDispatcher};
pub use shotgrid::{ShotgridClient, TrackingClient, TrackingError};
pub use task_processor::{ProcessError, TaskHandler, TaskOutcome, TaskProcessor};
pub use toolkit::{PipelineBootstrap, ToolkitBridge, ToolkitError};
