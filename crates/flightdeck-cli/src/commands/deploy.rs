use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use flightdeck_core::config::DeployDefaults;
use flightdeck_core::{DeployArgs, FlightdeckConfig, UserCert};
use flightdeck_deploy::{Collaborators, Orchestrator};
use flightdeck_state::ConfigStore;
use tracing::info;

use crate::adapters::bosh::BoshFactory;
use crate::adapters::certs::PkiGenerator;
use crate::adapters::fly::{FlyFactory, SelfUpdateTask};
use crate::adapters::ip::CheckIp;
use crate::adapters::route53::Route53;
use crate::adapters::terraform::TerraformFactory;

const DEFAULT_REGION: &str = "eu-west-1";
const DEFAULT_TEMPLATES: &str = "terraform";
const DEFAULT_DIRECTOR_MANIFEST: &str = "director.yml";

#[derive(Debug, Args)]
pub struct DeployCommand {
    /// Project name. The deployment is named flightdeck-<project>.
    pub project: String,

    /// AWS region (default: [deploy].region, then eu-west-1).
    #[arg(long)]
    pub region: Option<String>,

    /// Public domain for the web endpoint. Without one the service is
    /// reached by IP address.
    #[arg(long)]
    pub domain: Option<String>,

    /// PEM certificate for the domain.
    #[arg(long, requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key for --tls-cert.
    #[arg(long, requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,

    /// Number of worker VMs.
    #[arg(long)]
    pub workers: Option<u32>,

    #[arg(long)]
    pub worker_size: Option<String>,

    #[arg(long)]
    pub web_size: Option<String>,

    #[arg(long)]
    pub db_size: Option<String>,

    /// Update a running deployment from inside its own pipeline.
    #[arg(long)]
    pub self_update: bool,
}

/// Merge flags over file defaults. TLS material is attached separately.
pub fn deploy_args(cmd: &DeployCommand, defaults: &DeployDefaults) -> DeployArgs {
    let region = cmd
        .region
        .clone()
        .or_else(|| defaults.region.clone())
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    let mut args = DeployArgs::new(&cmd.project, &region);

    args.domain = cmd.domain.clone();
    if let Some(workers) = cmd.workers.or(defaults.worker_count) {
        args.worker_count = workers;
    }
    if let Some(size) = cmd.worker_size.clone().or_else(|| defaults.worker_size.clone()) {
        args.worker_size = size;
    }
    if let Some(size) = cmd.web_size.clone().or_else(|| defaults.web_size.clone()) {
        args.web_size = size;
    }
    args.db_size = cmd.db_size.clone().or_else(|| defaults.db_size.clone());
    args.self_update = cmd.self_update;
    args
}

fn read_user_cert(cmd: &DeployCommand) -> anyhow::Result<Option<UserCert>> {
    let (Some(cert), Some(key)) = (&cmd.tls_cert, &cmd.tls_key) else {
        return Ok(None);
    };
    Ok(Some(UserCert {
        cert: std::fs::read_to_string(cert)
            .with_context(|| format!("failed to read {}", cert.display()))?,
        key: std::fs::read_to_string(key)
            .with_context(|| format!("failed to read {}", key.display()))?,
    }))
}

pub async fn run(
    cmd: DeployCommand,
    settings: &FlightdeckConfig,
    state: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut args = deploy_args(&cmd, &settings.deploy());
    args.tls = read_user_cert(&cmd)?;

    let paths = settings.paths();
    let tools = settings.tools();
    let state_path = super::state_path(settings, state);
    let store: Arc<dyn ConfigStore> = Arc::new(super::open_store(&state_path)?.project(&args.project));
    info!(project = %args.project, state = ?state_path, "deploy requested");

    let deps = Collaborators {
        store: store.clone(),
        cloud: Arc::new(Route53::new(&tools.aws)),
        user_ip: Arc::new(CheckIp::default()),
        certs: Arc::new(PkiGenerator),
        provisioners: Arc::new(TerraformFactory::new(
            &tools.terraform,
            paths
                .templates
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATES)),
            store,
        )),
        directors: Arc::new(BoshFactory::new(
            &tools.bosh,
            paths
                .director_manifest
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DIRECTOR_MANIFEST)),
        )),
        pipelines: Arc::new(FlyFactory::new(
            &tools.fly,
            SelfUpdateTask::from_config(&settings.self_update()),
        )),
    };

    let mut orchestrator = Orchestrator::new(
        args,
        deps,
        Box::new(std::io::stdout()),
        Box::new(std::io::stderr()),
    );
    orchestrator.deploy().await?;
    Ok(())
}
