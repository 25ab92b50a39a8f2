//! flightdeck.toml configuration parser.
//!
//! Every section is optional; command-line flags override file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FlightdeckConfig {
    pub deploy: Option<DeployDefaults>,
    pub paths: Option<PathsConfig>,
    pub tools: Option<ToolsConfig>,
    pub self_update: Option<SelfUpdateConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeployDefaults {
    pub region: Option<String>,
    pub worker_count: Option<u32>,
    pub worker_size: Option<String>,
    pub web_size: Option<String>,
    pub db_size: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathsConfig {
    /// redb file holding configurations and director assets.
    pub state: Option<PathBuf>,
    /// Directory containing the infrastructure templates.
    pub templates: Option<PathBuf>,
    /// Director manifest passed to the configuration-management deployer.
    pub director_manifest: Option<PathBuf>,
}

/// The pipeline that re-runs the deploy from inside the CI service.
///
/// The task needs the same state database as the operator, so the pipeline
/// is only installed when `state` names a location the task can reach.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SelfUpdateConfig {
    /// State database path as seen from inside the self-update task.
    pub state: Option<PathBuf>,
    /// Container image the task runs in.
    pub image: Option<String>,
}

/// Names (or paths) of the external binaries the adapters invoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_terraform")]
    pub terraform: String,
    #[serde(default = "default_bosh")]
    pub bosh: String,
    #[serde(default = "default_fly")]
    pub fly: String,
    #[serde(default = "default_aws")]
    pub aws: String,
}

fn default_terraform() -> String {
    "terraform".to_string()
}

fn default_bosh() -> String {
    "bosh".to_string()
}

fn default_fly() -> String {
    "fly".to_string()
}

fn default_aws() -> String {
    "aws".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            terraform: default_terraform(),
            bosh: default_bosh(),
            fly: default_fly(),
            aws: default_aws(),
        }
    }
}

impl FlightdeckConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FlightdeckConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn deploy(&self) -> DeployDefaults {
        self.deploy.clone().unwrap_or_default()
    }

    pub fn paths(&self) -> PathsConfig {
        self.paths.clone().unwrap_or_default()
    }

    pub fn tools(&self) -> ToolsConfig {
        self.tools.clone().unwrap_or_default()
    }

    pub fn self_update(&self) -> SelfUpdateConfig {
        self.self_update.clone().unwrap_or_default()
    }
}
