//! Task processing: resolve a task's parent entity, bootstrap a toolkit engine
//! for it and make sure the entity has a valid USD master.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::ToolkitConfig;
use crate::models::{EntityRef, TaskRef};
use crate::services::shotgrid::{Filter, TrackingClient, TrackingError};
use crate::services::toolkit::{BootstrapRequest, Engine, PipelineBootstrap, ToolkitError};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Tracking lookup failed: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Toolkit operation failed: {0}")]
    Toolkit(#[from] ToolkitError),
}

/// How a task event was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    TaskNotFound,
    /// An id-scoped lookup returned more than one task
    MultipleTasks(usize),
    NoLinkedEntity,
    FrameworkMissing(String),
    MasterCreated(PathBuf),
    MasterReplaced { previous: PathBuf, created: PathBuf },
    MasterValid(PathBuf),
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskOutcome::TaskNotFound => write!(f, "task not found"),
            TaskOutcome::MultipleTasks(count) => write!(f, "{} tasks matched one id", count),
            TaskOutcome::NoLinkedEntity => write!(f, "task has no linked entity"),
            TaskOutcome::FrameworkMissing(name) => write!(f, "framework {} not loaded", name),
            TaskOutcome::MasterCreated(path) => write!(f, "created {}", path.display()),
            TaskOutcome::MasterReplaced { previous, created } => write!(
                f,
                "replaced invalid {} with {}",
                previous.display(),
                created.display()
            ),
            TaskOutcome::MasterValid(path) => write!(f, "{} is valid", path.display()),
        }
    }
}

/// Anything that can act on a resolved task reference.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn process(&self, task: TaskRef) -> Result<TaskOutcome, ProcessError>;
}

pub struct TaskProcessor {
    tracking: Arc<dyn TrackingClient>,
    bootstrap: Arc<dyn PipelineBootstrap>,
    toolkit: ToolkitConfig,
}

impl TaskProcessor {
    pub fn new(
        tracking: Arc<dyn TrackingClient>,
        bootstrap: Arc<dyn PipelineBootstrap>,
        toolkit: ToolkitConfig,
    ) -> Self {
        Self {
            tracking,
            bootstrap,
            toolkit,
        }
    }

    /// Look up the task's parent entity, or the outcome explaining why there is none.
    async fn resolve_entity(
        &self,
        task: TaskRef,
    ) -> Result<Result<EntityRef, TaskOutcome>, ProcessError> {
        let filters = [
            Filter::is("id", task.task_id.into()),
            Filter::is_entity("project", "Project", task.project_id),
        ];
        let records = self.tracking.find("Task", &filters, &["entity"]).await?;

        let record = match records.as_slice() {
            [] => {
                info!(task_id = task.task_id, project_id = task.project_id, "Task not found");
                return Ok(Err(TaskOutcome::TaskNotFound));
            }
            [record] => record,
            _ => {
                error!(
                    task_id = task.task_id,
                    project_id = task.project_id,
                    count = records.len(),
                    "Id-scoped task lookup returned several records"
                );
                return Ok(Err(TaskOutcome::MultipleTasks(records.len())));
            }
        };

        match record.get("entity").and_then(EntityRef::from_value) {
            Some(entity) => Ok(Ok(entity)),
            None => {
                info!(task_id = task.task_id, "Task has no linked entity");
                Ok(Err(TaskOutcome::NoLinkedEntity))
            }
        }
    }

    /// Everything that happens while the engine is up. Teardown is the caller's job.
    async fn run_engine(
        &self,
        engine: &dyn Engine,
        entity: &EntityRef,
    ) -> Result<TaskOutcome, ProcessError> {
        let framework = &self.toolkit.rootlayer_framework;
        let frameworks = engine.frameworks().await?;
        if !frameworks.iter().any(|name| name == framework) {
            warn!(
                framework = %framework,
                loaded = ?frameworks,
                "Root layer framework is not loaded by the engine"
            );
            return Ok(TaskOutcome::FrameworkMissing(framework.clone()));
        }

        let context = engine.context_from_entity(entity).await?;
        debug!(context = %context, "Resolved toolkit context");

        let root_layer = engine.root_layer();
        let outcome = match root_layer.latest_master(&context).await? {
            None => {
                info!(entity = %entity, "No USD master found, creating one");
                TaskOutcome::MasterCreated(root_layer.create_master(&context).await?)
            }
            Some(path) => {
                if root_layer.validate_master(&path).await? {
                    info!(entity = %entity, path = %path.display(), "USD master is valid");
                    TaskOutcome::MasterValid(path)
                } else {
                    warn!(
                        entity = %entity,
                        path = %path.display(),
                        "USD master is invalid, creating a new one"
                    );
                    let created = root_layer.create_master(&context).await?;
                    TaskOutcome::MasterReplaced {
                        previous: path,
                        created,
                    }
                }
            }
        };

        Ok(outcome)
    }
}

#[async_trait]
impl TaskHandler for TaskProcessor {
    async fn process(&self, task: TaskRef) -> Result<TaskOutcome, ProcessError> {
        let entity = match self.resolve_entity(task).await? {
            Ok(entity) => entity,
            Err(outcome) => return Ok(outcome),
        };
        info!(task_id = task.task_id, entity = %entity, "Resolved task entity");

        let user = self.tracking.authenticate().await?;

        let request = BootstrapRequest {
            engine: self.toolkit.engine.clone(),
            entity: entity.clone(),
            base_configuration: self.toolkit.base_configuration.clone(),
            pipeline_configuration: self.toolkit.pipeline_configuration.clone(),
            sync_filesystem: true,
            user,
        };
        let mut engine = self.bootstrap.bootstrap(&request).await?;

        let outcome = self.run_engine(engine.as_ref(), &entity).await;

        if let Err(e) = engine.destroy().await {
            warn!(entity = %entity, "Engine teardown failed: {}", e);
        }

        outcome
    }
}
