//! Orchestration error types.
//!
//! Configuration conflicts carry the conflicting values. Collaborator
//! failures are wrapped transparently so their messages reach the caller
//! verbatim; the variant records which step failed.

use flightdeck_core::{ArgsError, MetadataError};
use flightdeck_state::StateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("invalid deploy arguments: {0}")]
    InvalidArgs(#[from] ArgsError),

    #[error(
        "found previous deployment in {previous}. Refusing to deploy to {requested} as changing regions for existing deployments is not supported"
    )]
    RegionConflict { previous: String, requested: String },

    #[error("no hosted zone owned by this account matches domain {0}")]
    HostedZoneNotFound(String),

    #[error("in self-update mode but the CI service at {0} is not currently reachable")]
    NotRunning(String),

    #[error("invalid provisioning output: {0}")]
    InvalidMetadata(#[from] MetadataError),

    #[error("state store error: {0}")]
    State(#[from] StateError),

    #[error("failed to parse director credentials: {0}")]
    CredentialsParse(#[from] serde_yaml::Error),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error(transparent)]
    UserIp(anyhow::Error),

    #[error(transparent)]
    Dns(anyhow::Error),

    #[error(transparent)]
    Provision(anyhow::Error),

    #[error(transparent)]
    Certificate(anyhow::Error),

    #[error(transparent)]
    Director(anyhow::Error),

    #[error(transparent)]
    Pipeline(anyhow::Error),
}

pub type DeployResult<T> = Result<T, DeployError>;

/// Records the first error from a sequence of independent side effects
/// while letting every one of them run.
#[derive(Debug)]
pub struct FirstError<E> {
    first: Option<E>,
}

impl<E> Default for FirstError<E> {
    fn default() -> Self {
        Self { first: None }
    }
}

impl<E: std::fmt::Display> FirstError<E> {
    pub fn record(&mut self, result: Result<(), E>) {
        if let Err(e) = result {
            match self.first {
                None => self.first = Some(e),
                Some(_) => tracing::warn!(error = %e, "suppressed error after earlier failure"),
            }
        }
    }

    pub fn into_result(self) -> Result<(), E> {
        match self.first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
