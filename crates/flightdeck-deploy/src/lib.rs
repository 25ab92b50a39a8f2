//! flightdeck-deploy: the deployment orchestration engine.
//!
//! Turns a set of [`DeployArgs`](flightdeck_core::DeployArgs) into a running
//! deployment by sequencing external collaborators: the infrastructure
//! provisioner, the configuration-management director and the CI
//! administrative client.
//!
//! # Flow
//!
//! ```text
//! Orchestrator::deploy()
//!   ├── load-or-create Configuration
//!   ├── pre-infra requirements   (region lock, db size, operator IP, hosted zone)
//!   ├── provision                (apply → output → assert_valid)
//!   ├── post-infra requirements  (domain fallback, certificates, sizing) → checkpoint
//!   ├── DeployMode::Fresh        director deploy → set pipeline → success banner
//!   │   DeployMode::SelfUpdate   reach check → set pipeline → detached director deploy
//!   └── persist Configuration
//! ```
//!
//! Every collaborator is injected through [`Collaborators`]; every client
//! handle is held in a [`Scoped`] guard so it is released on all exit paths.

pub mod certs;
pub mod collaborators;
pub mod director;
pub mod error;
pub mod hosted_zone;
pub mod messages;
pub mod orchestrator;
pub mod provision;
pub mod requirements;

pub use collaborators::{
    CertGenerator, CloudClient, Collaborators, Credentials, Director, DirectorFactory,
    DirectorOutcome, HostedZone, IpResolver, PipelineClient, PipelineClientFactory, Provisioner,
    ProvisionerFactory, Release, Scoped,
};
pub use error::{DeployError, DeployResult};
pub use orchestrator::{DeployMode, Orchestrator, Output};
