//! Director deploys with the `bosh create-env` CLI.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use flightdeck_core::{Configuration, Metadata};
use flightdeck_deploy::{Director, DirectorFactory, DirectorOutcome, Release};
use serde::Serialize;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{info, warn};

use super::run_inherited;

const MANIFEST_FILE: &str = "director.yml";
const VARS_FILE: &str = "vars.yml";
const STATE_FILE: &str = "state.json";
const CREDS_FILE: &str = "creds.yml";
const UPGRADE_LOG: &str = "upgrade.log";

/// Variables interpolated into the director manifest.
#[derive(Debug, Serialize)]
pub struct DirectorVars {
    pub deployment: String,
    pub region: String,
    pub director_public_ip: String,
    pub director_private_ip: String,
    pub director_ca_cert: String,
    pub director_cert: String,
    pub director_key: String,
    pub web_public_ip: String,
    pub domain: String,
    pub web_ca_cert: String,
    pub web_cert: String,
    pub web_key: String,
    pub director_security_group_id: String,
    pub vms_security_group_id: String,
    pub public_subnet_id: String,
    pub private_subnet_id: String,
    pub worker_count: u32,
    pub worker_size: String,
    pub web_size: String,
    pub admin_username: String,
    pub admin_password: String,
}

impl DirectorVars {
    pub fn new(config: &Configuration, metadata: &Metadata) -> Self {
        Self {
            deployment: config.deployment.clone(),
            region: config.region.clone(),
            director_public_ip: metadata.director_public_ip.value.clone(),
            director_private_ip: flightdeck_deploy::certs::DIRECTOR_PRIVATE_IP.to_string(),
            director_ca_cert: config.director_certs.ca_cert.clone(),
            director_cert: config.director_certs.cert.clone(),
            director_key: config.director_certs.key.clone(),
            web_public_ip: metadata.web_public_ip.value.clone(),
            domain: config.domain.clone(),
            web_ca_cert: config.web_certs.ca_cert.clone(),
            web_cert: config.web_certs.cert.clone(),
            web_key: config.web_certs.key.clone(),
            director_security_group_id: metadata.director_security_group_id.value.clone(),
            vms_security_group_id: metadata.vms_security_group_id.value.clone(),
            public_subnet_id: metadata.public_subnet_id.value.clone(),
            private_subnet_id: metadata.private_subnet_id.value.clone(),
            worker_count: config.worker_count,
            worker_size: config.worker_size.clone(),
            web_size: config.web_size.clone(),
            admin_username: config.admin_username.clone(),
            admin_password: config.admin_password.clone(),
        }
    }
}

pub struct BoshFactory {
    bosh: String,
    manifest: PathBuf,
}

impl BoshFactory {
    pub fn new(bosh: &str, manifest: PathBuf) -> Self {
        Self {
            bosh: bosh.to_string(),
            manifest,
        }
    }
}

impl DirectorFactory for BoshFactory {
    fn build(&self, config: &Configuration, metadata: &Metadata) -> anyhow::Result<Box<dyn Director>> {
        let workdir = tempfile::Builder::new().prefix("flightdeck-bosh-").tempdir()?;
        std::fs::copy(&self.manifest, workdir.path().join(MANIFEST_FILE)).with_context(|| {
            format!("failed to read director manifest {}", self.manifest.display())
        })?;
        let vars = serde_yaml::to_string(&DirectorVars::new(config, metadata))?;
        std::fs::write(workdir.path().join(VARS_FILE), vars)?;

        Ok(Box::new(BoshDirector {
            bosh: self.bosh.clone(),
            workdir: Some(workdir),
        }))
    }
}

pub struct BoshDirector {
    bosh: String,
    workdir: Option<TempDir>,
}

impl BoshDirector {
    fn dir(&self) -> anyhow::Result<&Path> {
        self.workdir
            .as_ref()
            .map(TempDir::path)
            .context("director client already released")
    }

    fn create_env(&self) -> anyhow::Result<Command> {
        let dir = self.dir()?;
        let mut cmd = Command::new(&self.bosh);
        cmd.arg("create-env")
            .arg(MANIFEST_FILE)
            .arg("--state")
            .arg(STATE_FILE)
            .arg("--vars-store")
            .arg(CREDS_FILE)
            .arg("--vars-file")
            .arg(VARS_FILE)
            .current_dir(dir);
        Ok(cmd)
    }

    async fn run(&mut self, state: &[u8], creds: &[u8], detach: bool) -> anyhow::Result<()> {
        let dir = self.dir()?.to_path_buf();
        std::fs::write(dir.join(STATE_FILE), state)?;
        std::fs::write(dir.join(CREDS_FILE), creds)?;

        let mut cmd = self.create_env()?;
        if !detach {
            return run_inherited(&mut cmd, "bosh create-env").await;
        }

        // The upgrade outlives this process, so its files must too.
        let log = std::fs::File::create(dir.join(UPGRADE_LOG))?;
        cmd.stdin(Stdio::null())
            .stdout(log.try_clone()?)
            .stderr(log);
        let child = cmd.spawn().context("failed to execute bosh create-env")?;
        if let Some(dir) = self.workdir.take() {
            let kept = dir.keep();
            info!(pid = ?child.id(), log = ?kept.join(UPGRADE_LOG), "director upgrade started");
        }
        Ok(())
    }

    fn read_back(dir: &Path, name: &str, fallback: &[u8]) -> Vec<u8> {
        match std::fs::read(dir.join(name)) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = name, error = %e, "director left no file behind");
                fallback.to_vec()
            }
        }
    }
}

impl Release for BoshDirector {
    fn cleanup(&mut self) -> anyhow::Result<()> {
        if let Some(dir) = self.workdir.take() {
            dir.close()?;
        }
        Ok(())
    }
}

#[async_trait]
impl Director for BoshDirector {
    async fn deploy(&mut self, state: Vec<u8>, creds: Vec<u8>, detach: bool) -> DirectorOutcome {
        let result = self.run(&state, &creds, detach).await;

        // A detached upgrade has not produced anything yet.
        let (state, creds) = match (detach, self.dir()) {
            (false, Ok(dir)) => (
                Self::read_back(dir, STATE_FILE, &state),
                Self::read_back(dir, CREDS_FILE, &creds),
            ),
            _ => (state, creds),
        };
        DirectorOutcome {
            state,
            creds,
            result,
        }
    }
}
