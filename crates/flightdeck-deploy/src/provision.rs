//! Infrastructure provisioning step.

use flightdeck_core::{Configuration, Metadata};
use tracing::info;

use crate::collaborators::{Collaborators, Scoped};
use crate::error::{DeployError, DeployResult};

/// Converge the infrastructure for `config` and return its validated
/// outputs. The provisioner is released before this returns.
pub async fn provision(deps: &Collaborators, config: &Configuration) -> DeployResult<Metadata> {
    let iaas = deps.cloud.iaas();
    let provisioner = deps
        .provisioners
        .build(iaas, config)
        .map_err(DeployError::Provision)?;
    let mut provisioner = Scoped::new("provisioner", provisioner);

    info!(deployment = %config.deployment, %iaas, "applying infrastructure");
    provisioner.apply(false).await.map_err(DeployError::Provision)?;

    let metadata = provisioner.output().await.map_err(DeployError::Provision)?;
    metadata.assert_valid()?;

    info!(
        deployment = %config.deployment,
        web_ip = %metadata.web_public_ip.value,
        director_ip = %metadata.director_public_ip.value,
        "infrastructure ready"
    );
    Ok(metadata)
}
