//! Pipeline-toolkit collaborators.
//!
//! A bootstrap produces an [`Engine`] scoped to one entity. The engine reports
//! which frameworks it loaded, resolves contexts, and exposes the root-layer
//! management capability used to inspect or create an entity's USD master.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::EntityRef;
use crate::services::shotgrid::ScriptUser;

pub mod bridge;
pub use bridge::ToolkitBridge;

#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("Failed to start toolkit bridge `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Toolkit bridge I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Toolkit bridge exited during `{0}`")]
    BridgeExited(&'static str),

    #[error("Malformed toolkit bridge reply to `{op}`: {message}")]
    Protocol { op: &'static str, message: String },

    #[error("Toolkit `{op}` failed: {message}")]
    Remote { op: &'static str, message: String },
}

/// Everything needed to bootstrap an engine for one entity.
#[derive(Debug, Clone)]
pub struct BootstrapRequest {
    pub engine: String,
    pub entity: EntityRef,
    pub base_configuration: String,
    pub pipeline_configuration: String,
    /// Run filesystem-structure synchronisation before the engine starts
    pub sync_filesystem: bool,
    pub user: ScriptUser,
}

/// Toolkit context resolved for an entity, kept in its serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineContext(pub Value);

impl fmt::Display for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[async_trait]
pub trait PipelineBootstrap: Send + Sync {
    async fn bootstrap(&self, request: &BootstrapRequest) -> Result<Box<dyn Engine>, ToolkitError>;
}

#[async_trait]
pub trait Engine: Send + Sync {
    /// Names of the frameworks the engine loaded.
    async fn frameworks(&self) -> Result<Vec<String>, ToolkitError>;

    async fn context_from_entity(&self, entity: &EntityRef)
        -> Result<PipelineContext, ToolkitError>;

    fn root_layer(&self) -> &dyn RootLayerManager;

    /// Shut the engine down. Calling this more than once is a no-op.
    async fn destroy(&mut self) -> Result<(), ToolkitError>;
}

/// Canonical USD master management for a context.
#[async_trait]
pub trait RootLayerManager: Send + Sync {
    async fn latest_master(&self, context: &PipelineContext)
        -> Result<Option<PathBuf>, ToolkitError>;

    async fn validate_master(&self, path: &Path) -> Result<bool, ToolkitError>;

    async fn create_master(&self, context: &PipelineContext) -> Result<PathBuf, ToolkitError>;
}
