//! Provisioning output: the infrastructure facts later steps depend on.
//!
//! Parsed from the provisioning engine's structured output, which maps each
//! output name to `{ "value": ..., "sensitive": ..., "type": ... }`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single named provisioning output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct OutputValue {
    #[serde(default)]
    pub value: String,
}

impl OutputValue {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Metadata {
    /// Public IP of the web (administrative) node.
    pub web_public_ip: OutputValue,
    pub director_public_ip: OutputValue,
    pub director_security_group_id: OutputValue,
    pub vms_security_group_id: OutputValue,
    pub public_subnet_id: OutputValue,
    pub private_subnet_id: OutputValue,
}

#[derive(Debug, Error, PartialEq)]
pub enum MetadataError {
    #[error("provisioning output `{0}` is missing or empty")]
    MissingOutput(&'static str),

    #[error("failed to parse provisioning output: {0}")]
    Parse(String),
}

impl Metadata {
    /// Parse the engine's JSON output. Unknown outputs are ignored.
    pub fn from_output_json(bytes: &[u8]) -> Result<Self, MetadataError> {
        serde_json::from_slice(bytes).map_err(|e| MetadataError::Parse(e.to_string()))
    }

    /// Every required output must be present and non-empty.
    pub fn assert_valid(&self) -> Result<(), MetadataError> {
        let required = [
            ("web_public_ip", &self.web_public_ip),
            ("director_public_ip", &self.director_public_ip),
            ("director_security_group_id", &self.director_security_group_id),
            ("vms_security_group_id", &self.vms_security_group_id),
            ("public_subnet_id", &self.public_subnet_id),
            ("private_subnet_id", &self.private_subnet_id),
        ];
        for (name, output) in required {
            if output.value.trim().is_empty() {
                return Err(MetadataError::MissingOutput(name));
            }
        }
        Ok(())
    }
}
