use tracing::{info, warn};

/// Settings for the pipeline-toolkit bridge and the engine it bootstraps.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolkitConfig {
    /// Program that speaks the bridge protocol on stdin/stdout (default: python)
    pub bridge_command: String,

    /// Arguments passed to the bridge program (default: -m sg_toolkit_bridge)
    pub bridge_args: Vec<String>,

    /// Engine bootstrapped for each task (default: tk-shell)
    pub engine: String,

    /// Base configuration descriptor used when no site config is found
    pub base_configuration: String,

    /// Pipeline configuration name to resolve (default: Primary)
    pub pipeline_configuration: String,

    /// Framework that provides root-layer management
    pub rootlayer_framework: String,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            bridge_command: "python".to_string(),
            bridge_args: vec!["-m".to_string(), "sg_toolkit_bridge".to_string()],
            engine: "tk-shell".to_string(),
            base_configuration: "sgtk:descriptor:app_store?name=tk-config-basic".to_string(),
            pipeline_configuration: "Primary".to_string(),
            rootlayer_framework: "tk-framework-rootlayer".to_string(),
        }
    }
}

impl ToolkitConfig {
    /// Load overrides with defaults for anything unset or blank.
    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let set = |key: &str, target: &mut String| {
            if let Some(val) = lookup(key) {
                if val.trim().is_empty() {
                    warn!("{} is blank, using default {}", key, target);
                } else {
                    info!("Using custom {}: {}", key, val);
                    *target = val.trim().to_string();
                }
            }
        };

        set("TOOLKIT_BRIDGE_COMMAND", &mut config.bridge_command);
        set("TOOLKIT_ENGINE", &mut config.engine);
        set("TOOLKIT_BASE_CONFIGURATION", &mut config.base_configuration);
        set("TOOLKIT_PIPELINE_CONFIGURATION", &mut config.pipeline_configuration);
        set("ROOTLAYER_FRAMEWORK", &mut config.rootlayer_framework);

        if let Some(args) = lookup("TOOLKIT_BRIDGE_ARGS") {
            config.bridge_args = args.split_whitespace().map(str::to_string).collect();
        }

        config
    }
}
