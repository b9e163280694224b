//! Drives the bridge protocol against a shell stand-in for the toolkit helper.
#![cfg(unix)]

use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::TempDir;

use sg_webhook::models::EntityRef;
use sg_webhook::services::shotgrid::ScriptUser;
use sg_webhook::services::toolkit::{
    BootstrapRequest, Engine, PipelineBootstrap, RootLayerManager, ToolkitBridge, ToolkitError,
};

const FAKE_BRIDGE: &str = r#"
log="$1"
while IFS= read -r line; do
  printf '%s\n' "$line" >> "$log"
  case "$line" in
    *'"op":"bootstrap"'*)
      if [ -n "$FAIL_BOOTSTRAP" ]; then
        echo '{"ok":false,"error":"pipeline configuration not found"}'
      else
        echo '{"ok":true,"result":null}'
      fi ;;
    *'"op":"frameworks"'*) echo '{"ok":true,"result":["tk-framework-shotgunutils","tk-framework-rootlayer"]}' ;;
    *'"op":"context_from_entity"'*) echo '{"ok":true,"result":{"project":{"type":"Project","id":7},"entity":{"type":"Asset","id":1187}}}' ;;
    *'"op":"latest_master"'*) echo '{"ok":true,"result":null}' ;;
    *'"op":"validate_master"'*) echo '{"ok":true,"result":"yes"}' ;;
    *'"op":"create_master"'*) echo '{"ok":true,"result":"/proj/assets/hero/usd/hero_master.usda"}' ;;
    *'"op":"destroy"'*) echo '{"ok":true,"result":null}'; exit 0 ;;
    *) echo '{"ok":false,"error":"unknown op"}' ;;
  esac
done
"#;

struct Harness {
    _dir: TempDir,
    script: PathBuf,
    log: PathBuf,
}

impl Harness {
    fn new(script_body: &str) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let script = dir.path().join("bridge.sh");
        let log = dir.path().join("requests.log");
        std::fs::write(&script, script_body).expect("write script");
        Self {
            _dir: dir,
            script,
            log,
        }
    }

    fn bridge(&self) -> ToolkitBridge {
        ToolkitBridge::new(
            "sh",
            vec![
                self.script.display().to_string(),
                self.log.display().to_string(),
            ],
        )
    }

    fn requests(&self) -> Vec<serde_json::Value> {
        read_log(&self.log)
    }
}

fn read_log(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).expect("request line is JSON"))
        .collect()
}

fn bootstrap_request() -> BootstrapRequest {
    BootstrapRequest {
        engine: "tk-shell".to_string(),
        entity: EntityRef::new("Asset", 1187),
        base_configuration: "sgtk:descriptor:app_store?name=tk-config-basic".to_string(),
        pipeline_configuration: "Primary".to_string(),
        sync_filesystem: true,
        user: ScriptUser {
            site: "https://studio.shotgrid.autodesk.com".to_string(),
            script_name: "webhook_bot".to_string(),
            script_key: "script-key".to_string(),
        },
    }
}

#[tokio::test]
async fn test_engine_session_over_bridge() {
    let harness = Harness::new(FAKE_BRIDGE);

    let mut engine = harness
        .bridge()
        .bootstrap(&bootstrap_request())
        .await
        .expect("bootstrap succeeds");

    let frameworks = engine.frameworks().await.expect("frameworks");
    assert!(frameworks.contains(&"tk-framework-rootlayer".to_string()));

    let context = engine
        .context_from_entity(&EntityRef::new("Asset", 1187))
        .await
        .expect("context");
    assert_eq!(context.0["entity"]["id"], 1187);

    let root_layer = engine.root_layer();
    assert_eq!(root_layer.latest_master(&context).await.expect("latest"), None);
    assert_eq!(
        root_layer.create_master(&context).await.expect("create"),
        PathBuf::from("/proj/assets/hero/usd/hero_master.usda")
    );

    engine.destroy().await.expect("destroy");
    // Second teardown is a no-op
    engine.destroy().await.expect("destroy again");

    let ops: Vec<String> = harness
        .requests()
        .iter()
        .map(|request| request["op"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        ops,
        [
            "bootstrap",
            "frameworks",
            "context_from_entity",
            "latest_master",
            "create_master",
            "destroy"
        ]
    );

    let bootstrap = &harness.requests()[0];
    assert_eq!(bootstrap["engine"], "tk-shell");
    assert_eq!(bootstrap["entity"], json!({"type": "Asset", "id": 1187}));
    assert_eq!(bootstrap["sync_filesystem"], true);
    assert_eq!(bootstrap["pipeline_configuration"], "Primary");
    assert_eq!(bootstrap["script_name"], "webhook_bot");
}

#[tokio::test]
async fn test_wrongly_typed_reply_is_a_protocol_error() {
    let harness = Harness::new(FAKE_BRIDGE);
    let mut engine = harness
        .bridge()
        .bootstrap(&bootstrap_request())
        .await
        .expect("bootstrap succeeds");

    let result = engine
        .root_layer()
        .validate_master(Path::new("/proj/assets/hero/usd/hero_master.usda"))
        .await;
    assert!(matches!(
        result,
        Err(ToolkitError::Protocol {
            op: "validate_master",
            ..
        })
    ));

    engine.destroy().await.expect("destroy");
}

#[tokio::test]
async fn test_failed_bootstrap_reports_remote_error() {
    let harness = Harness::new(&format!("FAIL_BOOTSTRAP=1\n{}", FAKE_BRIDGE));

    let result = harness.bridge().bootstrap(&bootstrap_request()).await;

    match result {
        Err(ToolkitError::Remote { op, message }) => {
            assert_eq!(op, "bootstrap");
            assert_eq!(message, "pipeline configuration not found");
        }
        Err(other) => panic!("expected remote error, got {:?}", other),
        Ok(_) => panic!("bootstrap should fail"),
    }
}

#[tokio::test]
async fn test_bridge_that_exits_early() {
    let harness = Harness::new("exit 0\n");

    let result = harness.bridge().bootstrap(&bootstrap_request()).await;

    // Depending on timing the write or the read notices the exit first
    assert!(matches!(
        result,
        Err(ToolkitError::BridgeExited("bootstrap")) | Err(ToolkitError::Io(_))
    ));
}
