//! Deployment coordinator: runs the configuration-management director and
//! persists what it returns.

use flightdeck_core::{Configuration, Metadata};
use flightdeck_state::{CREDS_ASSET, ConfigStore, STATE_ASSET, StateError};
use serde::Deserialize;
use tracing::{debug, info};

use crate::collaborators::{Collaborators, Scoped};
use crate::error::{DeployError, DeployResult, FirstError};

/// Port the secrets store listens on, on the web node.
pub const SECRETS_STORE_PORT: u16 = 8844;

/// User the secrets store CLI authenticates as.
pub const SECRETS_STORE_USERNAME: &str = "credhub-cli";

/// Subset of the director's generated credentials file we consume.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DirectorCreds {
    pub credhub_cli_password: String,
    #[serde(rename = "credhub-tls")]
    pub credhub_tls: TlsEntry,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TlsEntry {
    pub ca: String,
}

impl DirectorCreds {
    /// Parse the credentials blob. A blank blob carries no credentials.
    pub fn parse(bytes: &[u8]) -> DeployResult<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_slice(bytes)?)
    }
}

/// Load an asset, treating absence as an empty blob.
fn load_or_empty(store: &dyn ConfigStore, name: &str) -> DeployResult<Vec<u8>> {
    if !store.has_asset(name)? {
        return Ok(Vec::new());
    }
    match store.load_asset(name) {
        Ok(bytes) => Ok(bytes),
        Err(StateError::AssetNotFound { .. }) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Deploy the director and record its state, credentials and the secrets
/// store access derived from them.
///
/// Both blobs are stored even when the deploy fails, so the next run picks
/// up whatever the director managed to create. The first failure among the
/// deploy and the two stores is returned.
pub async fn deploy_director(
    deps: &Collaborators,
    config: &mut Configuration,
    metadata: &Metadata,
    detach: bool,
) -> DeployResult<()> {
    let director = deps
        .directors
        .build(config, metadata)
        .map_err(DeployError::Director)?;
    let mut director = Scoped::new("director", director);

    let store = deps.store.as_ref();
    let state = load_or_empty(store, STATE_ASSET)?;
    let creds = load_or_empty(store, CREDS_ASSET)?;
    debug!(state_bytes = state.len(), creds_bytes = creds.len(), "loaded director assets");

    info!(deployment = %config.deployment, detach, "deploying director");
    let outcome = director.deploy(state, creds, detach).await;

    let mut first = FirstError::default();
    first.record(outcome.result.map_err(DeployError::Director));
    first.record(
        store
            .store_asset(STATE_ASSET, &outcome.state)
            .map_err(DeployError::from),
    );
    first.record(
        store
            .store_asset(CREDS_ASSET, &outcome.creds)
            .map_err(DeployError::from),
    );
    first.into_result()?;

    let creds = DirectorCreds::parse(&outcome.creds)?;
    config.secrets_store.url = format!(
        "https://{}:{SECRETS_STORE_PORT}/",
        metadata.web_public_ip.value
    );
    config.secrets_store.username = SECRETS_STORE_USERNAME.to_string();
    config.secrets_store.password = creds.credhub_cli_password;
    config.secrets_store.ca_cert = creds.credhub_tls.ca;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_secrets_from_creds() {
        let yaml = b"admin_password: hunter2\ncredhub_cli_password: s3cret\ncredhub-tls:\n  ca: |\n    -----BEGIN CERTIFICATE-----\n    abc\n    -----END CERTIFICATE-----\n  certificate: ignored\n";
        let creds = DirectorCreds::parse(yaml).unwrap();
        assert_eq!(creds.credhub_cli_password, "s3cret");
        assert!(creds.credhub_tls.ca.starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[test]
    fn blank_creds_are_empty() {
        assert_eq!(DirectorCreds::parse(b"").unwrap(), DirectorCreds::default());
        assert_eq!(DirectorCreds::parse(b"  \n").unwrap(), DirectorCreds::default());
    }

    #[test]
    fn missing_keys_default() {
        let creds = DirectorCreds::parse(b"other: value\n").unwrap();
        assert_eq!(creds, DirectorCreds::default());
    }

    #[test]
    fn malformed_creds_are_an_error() {
        let err = DirectorCreds::parse(b"credhub-tls: [unterminated").unwrap_err();
        assert!(matches!(err, DeployError::CredentialsParse(_)));
    }
}
