//! Toolkit bridge process.
//!
//! The pipeline toolkit is a Python framework, so engines live in a helper
//! process. Each engine owns one child; requests and replies are single-line
//! JSON objects on the child's stdin and stdout:
//!
//! ```text
//! -> {"op":"latest_master","context":{...}}
//! <- {"ok":true,"result":"/proj/assets/hero/usd/hero_master.usda"}
//! <- {"ok":false,"error":"no root layer template"}
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    BootstrapRequest, Engine, PipelineBootstrap, PipelineContext, RootLayerManager, ToolkitError,
};
use crate::config::ToolkitConfig;
use crate::models::EntityRef;

/// How long a destroyed engine gets to exit before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeRequest<'a> {
    Bootstrap {
        engine: &'a str,
        entity: &'a EntityRef,
        base_configuration: &'a str,
        pipeline_configuration: &'a str,
        sync_filesystem: bool,
        site: &'a str,
        script_name: &'a str,
        script_key: &'a str,
    },
    Frameworks,
    ContextFromEntity {
        entity: &'a EntityRef,
    },
    LatestMaster {
        context: &'a PipelineContext,
    },
    ValidateMaster {
        path: &'a Path,
    },
    CreateMaster {
        context: &'a PipelineContext,
    },
    Destroy,
}

impl BridgeRequest<'_> {
    fn op(&self) -> &'static str {
        match self {
            BridgeRequest::Bootstrap { .. } => "bootstrap",
            BridgeRequest::Frameworks => "frameworks",
            BridgeRequest::ContextFromEntity { .. } => "context_from_entity",
            BridgeRequest::LatestMaster { .. } => "latest_master",
            BridgeRequest::ValidateMaster { .. } => "validate_master",
            BridgeRequest::CreateMaster { .. } => "create_master",
            BridgeRequest::Destroy => "destroy",
        }
    }
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    ok: bool,
    #[serde(default)]
    result: Value,
    error: Option<String>,
}

/// Bootstraps engines by spawning the configured bridge program.
#[derive(Debug, Clone)]
pub struct ToolkitBridge {
    command: String,
    args: Vec<String>,
}

impl ToolkitBridge {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_config(config: &ToolkitConfig) -> Self {
        Self::new(config.bridge_command.clone(), config.bridge_args.clone())
    }

    fn spawn(&self) -> Result<BridgeEngine, ToolkitError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolkitError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(ToolkitError::Protocol {
                op: "bootstrap",
                message: "bridge stdio was not captured".to_string(),
            });
        };

        Ok(BridgeEngine {
            io: Mutex::new(BridgeIo {
                child,
                stdin: Some(stdin),
                stdout: BufReader::new(stdout).lines(),
            }),
            destroyed: false,
        })
    }
}

#[async_trait]
impl PipelineBootstrap for ToolkitBridge {
    async fn bootstrap(&self, request: &BootstrapRequest) -> Result<Box<dyn Engine>, ToolkitError> {
        info!(
            command = %self.command,
            engine = %request.engine,
            entity = %request.entity,
            "Bootstrapping toolkit engine"
        );

        let mut engine = self.spawn()?;
        let bootstrapped = engine
            .call(&BridgeRequest::Bootstrap {
                engine: &request.engine,
                entity: &request.entity,
                base_configuration: &request.base_configuration,
                pipeline_configuration: &request.pipeline_configuration,
                sync_filesystem: request.sync_filesystem,
                site: &request.user.site,
                script_name: &request.user.script_name,
                script_key: &request.user.script_key,
            })
            .await;

        if let Err(e) = bootstrapped {
            // The engine never started, so there is nothing to tear down politely
            engine.kill().await;
            return Err(e);
        }

        Ok(Box::new(engine))
    }
}

struct BridgeIo {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// An engine living in a bridge child process.
pub struct BridgeEngine {
    io: Mutex<BridgeIo>,
    destroyed: bool,
}

impl BridgeEngine {
    async fn call(&self, request: &BridgeRequest<'_>) -> Result<Value, ToolkitError> {
        let op = request.op();
        let mut line = serde_json::to_string(request).map_err(|e| ToolkitError::Protocol {
            op,
            message: e.to_string(),
        })?;
        line.push('\n');

        let mut io = self.io.lock().await;
        let stdin = io.stdin.as_mut().ok_or(ToolkitError::BridgeExited(op))?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;

        let reply = io
            .stdout
            .next_line()
            .await?
            .ok_or(ToolkitError::BridgeExited(op))?;
        debug!(op, reply = %reply, "Toolkit bridge replied");

        let response: BridgeResponse =
            serde_json::from_str(&reply).map_err(|e| ToolkitError::Protocol {
                op,
                message: e.to_string(),
            })?;

        if response.ok {
            Ok(response.result)
        } else {
            Err(ToolkitError::Remote {
                op,
                message: response
                    .error
                    .unwrap_or_else(|| "no error message".to_string()),
            })
        }
    }

    async fn kill(&mut self) {
        let io = self.io.get_mut();
        io.stdin = None;
        if let Err(e) = io.child.kill().await {
            warn!("Failed to kill toolkit bridge: {}", e);
        }
        self.destroyed = true;
    }
}

fn expect_path(op: &'static str, value: Value) -> Result<PathBuf, ToolkitError> {
    match value {
        Value::String(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        other => Err(ToolkitError::Protocol {
            op,
            message: format!("expected a path, got {}", other),
        }),
    }
}

#[async_trait]
impl Engine for BridgeEngine {
    async fn frameworks(&self) -> Result<Vec<String>, ToolkitError> {
        let op = "frameworks";
        let value = self.call(&BridgeRequest::Frameworks).await?;
        serde_json::from_value(value).map_err(|e| ToolkitError::Protocol {
            op,
            message: e.to_string(),
        })
    }

    async fn context_from_entity(
        &self,
        entity: &EntityRef,
    ) -> Result<PipelineContext, ToolkitError> {
        let value = self
            .call(&BridgeRequest::ContextFromEntity { entity })
            .await?;
        Ok(PipelineContext(value))
    }

    fn root_layer(&self) -> &dyn RootLayerManager {
        self
    }

    async fn destroy(&mut self) -> Result<(), ToolkitError> {
        if self.destroyed {
            return Ok(());
        }

        let result = self.call(&BridgeRequest::Destroy).await.map(|_| ());

        let io = self.io.get_mut();
        // Closing stdin tells the bridge no more requests are coming
        io.stdin = None;
        match tokio::time::timeout(SHUTDOWN_GRACE, io.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "Toolkit bridge exited"),
            Ok(Err(e)) => warn!("Failed waiting for toolkit bridge: {}", e),
            Err(_) => {
                warn!("Toolkit bridge did not exit within {:?}, killing", SHUTDOWN_GRACE);
                if let Err(e) = io.child.kill().await {
                    warn!("Failed to kill toolkit bridge: {}", e);
                }
            }
        }

        self.destroyed = true;
        result
    }
}

#[async_trait]
impl RootLayerManager for BridgeEngine {
    async fn latest_master(
        &self,
        context: &PipelineContext,
    ) -> Result<Option<PathBuf>, ToolkitError> {
        let op = "latest_master";
        match self.call(&BridgeRequest::LatestMaster { context }).await? {
            Value::Null => Ok(None),
            value => expect_path(op, value).map(Some),
        }
    }

    async fn validate_master(&self, path: &Path) -> Result<bool, ToolkitError> {
        match self.call(&BridgeRequest::ValidateMaster { path }).await? {
            Value::Bool(valid) => Ok(valid),
            other => Err(ToolkitError::Protocol {
                op: "validate_master",
                message: format!("expected a boolean, got {}", other),
            }),
        }
    }

    async fn create_master(&self, context: &PipelineContext) -> Result<PathBuf, ToolkitError> {
        let value = self.call(&BridgeRequest::CreateMaster { context }).await?;
        expect_path("create_master", value)
    }
}
