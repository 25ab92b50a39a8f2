//! CI administration through the `fly` CLI.

use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use flightdeck_core::config::SelfUpdateConfig;
use flightdeck_core::{Configuration, DeployArgs};
use flightdeck_deploy::{Credentials, PipelineClient, PipelineClientFactory, Release};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::run_inherited;

/// Name of the pipeline that keeps the deployment up to date.
pub const SELF_UPDATE_PIPELINE: &str = "flightdeck-self-update";

/// Default image the self-update task runs in.
pub const SELF_UPDATE_IMAGE: &str = "flightdeck/flightdeck";

/// Credential names the CI service resolves from its secrets store when the
/// task starts.
const AWS_ACCESS_KEY_PARAM: &str = "((aws_access_key_id))";
const AWS_SECRET_KEY_PARAM: &str = "((aws_secret_access_key))";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const VERSION_SKEW_MARKER: &str = "out of sync with target";

/// `host:port` of an API URL, defaulting to the HTTPS port.
pub fn api_address(api: &str) -> String {
    let host = api
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or_default();
    if host.contains(':') {
        host.to_string()
    } else {
        format!("{host}:443")
    }
}

/// Whether `fly` reported a client/server version skew.
pub fn reports_version_skew(stderr: &str) -> bool {
    stderr.contains(VERSION_SKEW_MARKER)
}

/// Where the self-update task runs and which state it deploys from.
#[derive(Debug, Clone, PartialEq)]
pub struct SelfUpdateTask {
    pub state: PathBuf,
    pub image: String,
}

impl SelfUpdateTask {
    /// `None` unless a state location reachable from the task is configured.
    pub fn from_config(config: &SelfUpdateConfig) -> Option<Self> {
        let state = config.state.clone()?;
        Some(Self {
            state,
            image: config
                .image
                .clone()
                .unwrap_or_else(|| SELF_UPDATE_IMAGE.to_string()),
        })
    }
}

/// The pipeline that re-runs `deploy --self-update` from inside the service.
pub fn self_update_pipeline(
    task: &SelfUpdateTask,
    args: &DeployArgs,
    config: &Configuration,
) -> serde_json::Value {
    let mut deploy_args = vec![
        "--state".to_string(),
        task.state.display().to_string(),
        "deploy".to_string(),
        "--self-update".to_string(),
        "--region".to_string(),
        config.region.clone(),
        "--workers".to_string(),
        config.worker_count.to_string(),
        "--worker-size".to_string(),
        config.worker_size.clone(),
        "--web-size".to_string(),
        config.web_size.clone(),
    ];
    if let Some(domain) = &args.domain {
        deploy_args.push("--domain".to_string());
        deploy_args.push(domain.clone());
    }
    deploy_args.push(config.project.clone());

    json!({
        "jobs": [{
            "name": "self-update",
            "serial": true,
            "plan": [{
                "task": "self-update",
                "config": {
                    "platform": "linux",
                    "image_resource": {
                        "type": "registry-image",
                        "source": { "repository": task.image },
                    },
                    "params": {
                        "AWS_REGION": config.region,
                        "AWS_ACCESS_KEY_ID": AWS_ACCESS_KEY_PARAM,
                        "AWS_SECRET_ACCESS_KEY": AWS_SECRET_KEY_PARAM,
                        "DEPLOYMENT": config.deployment,
                    },
                    "run": {
                        "path": "flightdeck",
                        "args": deploy_args,
                    },
                },
            }],
        }],
    })
}

pub struct FlyFactory {
    fly: String,
    task: Option<SelfUpdateTask>,
}

impl FlyFactory {
    pub fn new(fly: &str, task: Option<SelfUpdateTask>) -> Self {
        Self {
            fly: fly.to_string(),
            task,
        }
    }
}

impl PipelineClientFactory for FlyFactory {
    fn build(&self, credentials: Credentials) -> anyhow::Result<Box<dyn PipelineClient>> {
        Ok(Box::new(FlyClient {
            fly: self.fly.clone(),
            credentials,
            task: self.task.clone(),
        }))
    }
}

pub struct FlyClient {
    fly: String,
    credentials: Credentials,
    task: Option<SelfUpdateTask>,
}

impl FlyClient {
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.fly);
        cmd.arg("--target").arg(&self.credentials.target);
        cmd
    }

    async fn login(&self, insecure: bool, allow_version_mismatch: bool) -> anyhow::Result<()> {
        let mut cmd = self.command();
        cmd.arg("login");
        if insecure {
            cmd.arg("--insecure");
        }
        cmd.arg("--concourse-url")
            .arg(&self.credentials.api)
            .arg("--username")
            .arg(&self.credentials.username)
            .arg("--password")
            .arg(&self.credentials.password);

        let output = cmd.output().await.context("failed to execute fly login")?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            bail!("fly login failed: {}", stderr.trim());
        }
        if reports_version_skew(&stderr) {
            if !allow_version_mismatch {
                bail!("fly version does not match {}: {}", self.credentials.api, stderr.trim());
            }
            debug!(api = %self.credentials.api, "tolerating fly version skew");
        }
        Ok(())
    }
}

impl Release for FlyClient {
    fn cleanup(&mut self) -> anyhow::Result<()> {
        // The target stays in the operator's fly config for later use.
        Ok(())
    }
}

#[async_trait]
impl PipelineClient for FlyClient {
    async fn can_connect(&self) -> anyhow::Result<bool> {
        let address = api_address(&self.credentials.api);
        match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&address)).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) => {
                debug!(%address, error = %e, "CI service unreachable");
                Ok(false)
            }
            Err(_) => {
                debug!(%address, "CI service connection timed out");
                Ok(false)
            }
        }
    }

    async fn set_default_pipeline(
        &self,
        args: &DeployArgs,
        config: &Configuration,
        allow_version_mismatch: bool,
    ) -> anyhow::Result<()> {
        self.login(!config.web_user_provided_cert, allow_version_mismatch)
            .await?;

        let Some(task) = &self.task else {
            warn!(
                fly_target = %self.credentials.target,
                "self-update pipeline not installed: [self_update].state is not configured"
            );
            return Ok(());
        };

        let pipeline = serde_yaml::to_string(&self_update_pipeline(task, args, config))?;
        let mut file = tempfile::Builder::new()
            .prefix("flightdeck-pipeline-")
            .suffix(".yml")
            .tempfile()?;
        file.write_all(pipeline.as_bytes())?;

        let mut set = self.command();
        set.arg("set-pipeline")
            .arg("--non-interactive")
            .arg("--pipeline")
            .arg(SELF_UPDATE_PIPELINE)
            .arg("--config")
            .arg(file.path());
        run_inherited(&mut set, "fly set-pipeline").await?;

        let mut unpause = self.command();
        unpause
            .arg("unpause-pipeline")
            .arg("--pipeline")
            .arg(SELF_UPDATE_PIPELINE);
        run_inherited(&mut unpause, "fly unpause-pipeline").await?;

        info!(fly_target = %self.credentials.target, pipeline = SELF_UPDATE_PIPELINE, "pipeline set");
        Ok(())
    }
}
