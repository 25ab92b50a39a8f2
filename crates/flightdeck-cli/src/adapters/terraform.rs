//! Infrastructure provisioning with the `terraform` CLI.
//!
//! Each provisioner works in its own temporary directory seeded with the
//! template files and a generated `terraform.tfvars.json`. Terraform's own
//! state is kept as an asset in the state store between runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use flightdeck_core::{Configuration, Metadata};
use flightdeck_deploy::error::FirstError;
use flightdeck_deploy::{Provisioner, ProvisionerFactory, Release};
use flightdeck_state::ConfigStore;
use serde::Serialize;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

use super::{run_captured, run_inherited};

/// Asset holding terraform's state file.
pub const TERRAFORM_STATE_ASSET: &str = "terraform.tfstate";

const TFVARS_FILE: &str = "terraform.tfvars.json";
const STATE_FILE: &str = "terraform.tfstate";

/// Input variables passed to the templates.
#[derive(Debug, Serialize, PartialEq)]
pub struct TerraformVars {
    pub region: String,
    pub deployment: String,
    pub project: String,
    pub source_access_ip: String,
    pub hosted_zone_id: String,
    pub hosted_zone_record_prefix: String,
    pub domain: String,
    pub rds_instance_class: String,
}

impl From<&Configuration> for TerraformVars {
    fn from(config: &Configuration) -> Self {
        Self {
            region: config.region.clone(),
            deployment: config.deployment.clone(),
            project: config.project.clone(),
            source_access_ip: config.source_access_ip.clone(),
            hosted_zone_id: config.hosted_zone_id.clone(),
            hosted_zone_record_prefix: config.hosted_zone_record_prefix.clone(),
            domain: config.domain.clone(),
            rds_instance_class: config.db_instance_class.clone(),
        }
    }
}

/// Copy the top-level `.tf` files of `templates` into `dest`.
fn seed_templates(templates: &Path, dest: &Path) -> anyhow::Result<usize> {
    let entries = std::fs::read_dir(templates)
        .with_context(|| format!("failed to read templates at {}", templates.display()))?;
    let mut copied = 0;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "tf") {
            if let Some(name) = path.file_name() {
                std::fs::copy(&path, dest.join(name))?;
                copied += 1;
            }
        }
    }
    if copied == 0 {
        anyhow::bail!("no .tf files found in {}", templates.display());
    }
    Ok(copied)
}

pub struct TerraformFactory {
    terraform: String,
    templates: PathBuf,
    store: Arc<dyn ConfigStore>,
}

impl TerraformFactory {
    pub fn new(terraform: &str, templates: PathBuf, store: Arc<dyn ConfigStore>) -> Self {
        Self {
            terraform: terraform.to_string(),
            templates,
            store,
        }
    }
}

impl ProvisionerFactory for TerraformFactory {
    fn build(&self, iaas: &str, config: &Configuration) -> anyhow::Result<Box<dyn Provisioner>> {
        if iaas != "AWS" {
            anyhow::bail!("unsupported IaaS {iaas}");
        }

        let workdir = tempfile::Builder::new().prefix("flightdeck-tf-").tempdir()?;
        let copied = seed_templates(&self.templates, workdir.path())?;

        let vars = serde_json::to_vec_pretty(&TerraformVars::from(config))?;
        std::fs::write(workdir.path().join(TFVARS_FILE), vars)?;

        if self.store.has_asset(TERRAFORM_STATE_ASSET)? {
            let state = self.store.load_asset(TERRAFORM_STATE_ASSET)?;
            std::fs::write(workdir.path().join(STATE_FILE), state)?;
        }

        debug!(dir = ?workdir.path(), templates = copied, "terraform workdir prepared");
        Ok(Box::new(TerraformProvisioner {
            terraform: self.terraform.clone(),
            workdir: Some(workdir),
            store: self.store.clone(),
        }))
    }
}

pub struct TerraformProvisioner {
    terraform: String,
    workdir: Option<TempDir>,
    store: Arc<dyn ConfigStore>,
}

impl TerraformProvisioner {
    fn dir(&self) -> anyhow::Result<&Path> {
        self.workdir
            .as_ref()
            .map(TempDir::path)
            .context("terraform provisioner already released")
    }

    fn command(&self, args: &[&str]) -> anyhow::Result<Command> {
        let mut cmd = Command::new(&self.terraform);
        cmd.args(args).current_dir(self.dir()?);
        Ok(cmd)
    }

    /// Copy terraform's state back into the store.
    fn save_state(&self) -> anyhow::Result<()> {
        let path = self.dir()?.join(STATE_FILE);
        if !path.is_file() {
            return Ok(());
        }
        let state = std::fs::read(&path)?;
        self.store.store_asset(TERRAFORM_STATE_ASSET, &state)?;
        Ok(())
    }
}

impl Release for TerraformProvisioner {
    fn cleanup(&mut self) -> anyhow::Result<()> {
        if let Some(dir) = self.workdir.take() {
            dir.close()?;
        }
        Ok(())
    }
}

#[async_trait]
impl Provisioner for TerraformProvisioner {
    async fn apply(&mut self, destroy: bool) -> anyhow::Result<()> {
        run_inherited(
            &mut self.command(&["init", "-input=false"])?,
            "terraform init",
        )
        .await?;

        let mut args = vec!["apply", "-auto-approve", "-input=false"];
        if destroy {
            args.push("-destroy");
        }
        info!(destroy, "running terraform apply");
        let applied = run_inherited(&mut self.command(&args)?, "terraform apply").await;

        // Whatever terraform created must be tracked even if apply failed.
        let mut first = FirstError::default();
        first.record(applied);
        first.record(self.save_state());
        first.into_result()
    }

    async fn output(&mut self) -> anyhow::Result<Metadata> {
        let stdout = run_captured(&mut self.command(&["output", "-json"])?, "terraform output").await?;
        Ok(Metadata::from_output_json(&stdout)?)
    }
}
