//! Deployment orchestrator: drives one `deploy` run.
//!
//! The run is a fixed sequence of steps, each short-circuiting on error.
//! Configuration is persisted at checkpoints (operator IP, hosted zone,
//! post-infrastructure) and once more at the end, so a failed run resumes
//! from the last checkpoint when invoked again.

use std::io::Write;

use flightdeck_core::{Configuration, DeployArgs, Metadata};
use tracing::info;

use crate::collaborators::{Collaborators, Credentials, PipelineClient, Scoped};
use crate::director::deploy_director;
use crate::error::{DeployError, DeployResult};
use crate::messages;
use crate::provision::provision;

/// Destination for operator-facing messages.
pub type Output = Box<dyn Write + Send + Sync>;

/// Whether this run creates the deployment or upgrades a running one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    /// Deploy the director first, then set the pipeline on the new service.
    Fresh,
    /// The service is already running: set the pipeline first, then start a
    /// detached director upgrade.
    SelfUpdate,
}

impl DeployMode {
    pub fn from_args(args: &DeployArgs) -> Self {
        if args.self_update {
            Self::SelfUpdate
        } else {
            Self::Fresh
        }
    }

    /// Whether the director deploy returns before the upgrade completes.
    pub fn detach(self) -> bool {
        matches!(self, Self::SelfUpdate)
    }

    /// A running service may be older than the local client.
    pub fn allow_version_mismatch(self) -> bool {
        matches!(self, Self::SelfUpdate)
    }
}

pub struct Orchestrator {
    pub(crate) args: DeployArgs,
    pub(crate) deps: Collaborators,
    pub(crate) stdout: Output,
    pub(crate) stderr: Output,
}

impl Orchestrator {
    pub fn new(args: DeployArgs, deps: Collaborators, stdout: Output, stderr: Output) -> Self {
        Self {
            args,
            deps,
            stdout,
            stderr,
        }
    }

    pub fn mode(&self) -> DeployMode {
        DeployMode::from_args(&self.args)
    }

    /// Run the full deploy sequence.
    pub async fn deploy(&mut self) -> DeployResult<()> {
        self.args.validate()?;

        let mut config = self.load_config()?;
        let previous_domain = config.domain.clone();
        info!(
            deployment = %config.deployment,
            region = %self.args.region,
            mode = ?self.mode(),
            "starting deploy"
        );

        self.resolve_pre_infra(&mut config).await?;

        let metadata = provision(&self.deps, &config).await?;

        self.resolve_post_infra(&previous_domain, &mut config, &metadata)
            .await?;

        let pipeline = self
            .deps
            .pipelines
            .build(Credentials {
                target: config.deployment.clone(),
                api: format!("https://{}", config.domain),
                username: config.admin_username.clone(),
                password: config.admin_password.clone(),
            })
            .map_err(DeployError::Pipeline)?;
        let pipeline = Scoped::new("pipeline client", pipeline);

        match self.mode() {
            DeployMode::Fresh => self.deploy_fresh(&mut config, &metadata, &*pipeline).await?,
            DeployMode::SelfUpdate => {
                self.update_in_place(&mut config, &metadata, &*pipeline)
                    .await?
            }
        }

        self.deps.store.update(&config)?;
        info!(deployment = %config.deployment, "deploy finished");
        Ok(())
    }

    fn load_config(&mut self) -> DeployResult<Configuration> {
        let (config, created) = self.deps.store.load_or_create(&self.args)?;
        if !created {
            messages::write_config_loaded(&mut self.stdout)?;
        }
        Ok(config)
    }

    /// Fresh mode: no service exists yet, so the pipeline can only be set
    /// once the director has deployed it.
    async fn deploy_fresh(
        &mut self,
        config: &mut Configuration,
        metadata: &Metadata,
        pipeline: &dyn PipelineClient,
    ) -> DeployResult<()> {
        let mode = DeployMode::Fresh;
        deploy_director(&self.deps, config, metadata, mode.detach()).await?;

        pipeline
            .set_default_pipeline(&self.args, config, mode.allow_version_mismatch())
            .await
            .map_err(DeployError::Pipeline)?;

        messages::write_deploy_success(config, &mut self.stdout)?;
        Ok(())
    }

    /// Self-update mode: the running service keeps serving while the
    /// director upgrades it in the background.
    async fn update_in_place(
        &mut self,
        config: &mut Configuration,
        metadata: &Metadata,
        pipeline: &dyn PipelineClient,
    ) -> DeployResult<()> {
        let mode = DeployMode::SelfUpdate;
        let running = pipeline.can_connect().await.map_err(DeployError::Pipeline)?;
        if !running {
            return Err(DeployError::NotRunning(format!("https://{}", config.domain)));
        }

        pipeline
            .set_default_pipeline(&self.args, config, mode.allow_version_mismatch())
            .await
            .map_err(DeployError::Pipeline)?;

        deploy_director(&self.deps, config, metadata, mode.detach()).await?;

        messages::write_upgrade_in_background(&mut self.stdout)?;
        Ok(())
    }
}
