//! Deploy arguments: the request for a single `deploy` run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sizes;

/// A user-supplied TLS certificate and private key for the web endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserCert {
    /// PEM-encoded certificate (chain).
    pub cert: String,
    /// PEM-encoded private key.
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployArgs {
    /// Project name; the deployment name is derived from it.
    pub project: String,
    pub region: String,
    /// Public domain for the web endpoint. `None` means IP-based access.
    pub domain: Option<String>,
    pub tls: Option<UserCert>,
    pub worker_count: u32,
    pub worker_size: String,
    pub web_size: String,
    /// Database size name. `Some` only when explicitly requested, in which
    /// case it overrides the stored instance class.
    pub db_size: Option<String>,
    /// Upgrade an already running deployment in place.
    pub self_update: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum ArgsError {
    #[error("project name must not be empty")]
    EmptyProject,

    #[error("region must not be empty")]
    EmptyRegion,

    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("unknown worker size: {0}")]
    UnknownWorkerSize(String),

    #[error("unknown web size: {0}")]
    UnknownWebSize(String),

    #[error("unknown database size: {0}")]
    UnknownDbSize(String),

    #[error("a TLS certificate and key must be supplied together")]
    IncompleteTls,
}

impl DeployArgs {
    /// Arguments with default sizing for the given project and region.
    pub fn new(project: &str, region: &str) -> Self {
        Self {
            project: project.to_string(),
            region: region.to_string(),
            domain: None,
            tls: None,
            worker_count: 1,
            worker_size: sizes::DEFAULT_WORKER_SIZE.to_string(),
            web_size: sizes::DEFAULT_WEB_SIZE.to_string(),
            db_size: None,
            self_update: false,
        }
    }

    /// Domain requested on this run, or the empty string for IP-based access.
    pub fn domain_or_empty(&self) -> &str {
        self.domain.as_deref().unwrap_or("")
    }

    pub fn validate(&self) -> Result<(), ArgsError> {
        if self.project.trim().is_empty() {
            return Err(ArgsError::EmptyProject);
        }
        if self.region.trim().is_empty() {
            return Err(ArgsError::EmptyRegion);
        }
        if self.worker_count == 0 {
            return Err(ArgsError::NoWorkers);
        }
        if !sizes::is_worker_size(&self.worker_size) {
            return Err(ArgsError::UnknownWorkerSize(self.worker_size.clone()));
        }
        if !sizes::is_web_size(&self.web_size) {
            return Err(ArgsError::UnknownWebSize(self.web_size.clone()));
        }
        if let Some(db_size) = &self.db_size
            && sizes::db_instance_class(db_size).is_none()
        {
            return Err(ArgsError::UnknownDbSize(db_size.clone()));
        }
        if let Some(tls) = &self.tls
            && (tls.cert.trim().is_empty() || tls.key.trim().is_empty())
        {
            return Err(ArgsError::IncompleteTls);
        }
        Ok(())
    }
}
