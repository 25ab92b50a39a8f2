//! Persisted deployment configuration.
//!
//! A [`Configuration`] describes one named deployment. It is JSON-serialized
//! into the state store between runs and mutated by the orchestrator during
//! a run. Every field defaults so that records written by older versions
//! still load.

use serde::{Deserialize, Serialize};

use crate::args::DeployArgs;
use crate::sizes;

/// Prefix applied to project names to form deployment names.
pub const DEPLOYMENT_PREFIX: &str = "flightdeck-";

/// Username of the initial administrative user.
pub const ADMIN_USERNAME: &str = "admin";

const PASSWORD_LEN: usize = 20;
const PASSWORD_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Build the deployment name for a project.
pub fn deployment_name(project: &str) -> String {
    format!("{DEPLOYMENT_PREFIX}{project}")
}

/// CA certificate, certificate and private key, all PEM-encoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CertificateBundle {
    pub ca_cert: String,
    pub cert: String,
    pub key: String,
}

impl CertificateBundle {
    pub fn is_empty(&self) -> bool {
        self.ca_cert.is_empty() && self.cert.is_empty() && self.key.is_empty()
    }
}

/// Access details for the secrets store, derived from the director's
/// credentials after each deploy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SecretsStoreAccess {
    pub url: String,
    pub username: String,
    pub password: String,
    pub ca_cert: String,
}

/// The persisted record for one deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Configuration {
    // ── Identity ──────────────────────────────────────────────────
    pub project: String,
    pub deployment: String,
    /// Locked once set; cross-region redeploys are rejected.
    pub region: String,

    // ── Network ───────────────────────────────────────────────────
    /// Public domain of the web endpoint, or its IP for IP-based access.
    pub domain: String,
    /// Operator address allowed through the firewall.
    pub source_access_ip: String,
    pub hosted_zone_id: String,
    pub hosted_zone_record_prefix: String,
    pub director_public_ip: String,

    // ── Sizing ────────────────────────────────────────────────────
    pub worker_count: u32,
    pub worker_size: String,
    pub web_size: String,
    pub db_instance_class: String,

    // ── Credentials ───────────────────────────────────────────────
    pub admin_username: String,
    pub admin_password: String,

    // ── Certificates ──────────────────────────────────────────────
    pub director_certs: CertificateBundle,
    pub web_certs: CertificateBundle,
    /// The web certificate was supplied by the operator and must never be
    /// regenerated.
    pub web_user_provided_cert: bool,

    pub secrets_store: SecretsStoreAccess,
}

impl Configuration {
    /// Create a fresh configuration for a first deploy.
    pub fn from_args(args: &DeployArgs) -> Result<Self, getrandom::Error> {
        let db_size = args.db_size.as_deref().unwrap_or(sizes::DEFAULT_DB_SIZE);
        let db_instance_class = sizes::db_instance_class(db_size)
            .or_else(|| sizes::db_instance_class(sizes::DEFAULT_DB_SIZE))
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            project: args.project.clone(),
            deployment: deployment_name(&args.project),
            region: args.region.clone(),
            worker_count: args.worker_count,
            worker_size: args.worker_size.clone(),
            web_size: args.web_size.clone(),
            db_instance_class,
            admin_username: ADMIN_USERNAME.to_string(),
            admin_password: generate_password()?,
            ..Default::default()
        })
    }
}

/// Random alphanumeric password for the administrative user.
pub fn generate_password() -> Result<String, getrandom::Error> {
    let mut password = String::with_capacity(PASSWORD_LEN);
    let mut buf = [0u8; PASSWORD_LEN];
    while password.len() < PASSWORD_LEN {
        getrandom::getrandom(&mut buf)?;
        let remaining = PASSWORD_LEN - password.len();
        password.extend(buf.iter().filter_map(|b| password_char(*b)).take(remaining));
    }
    Ok(password)
}

/// Map a random byte onto the alphabet. Bytes past the largest multiple of
/// the alphabet size are rejected so every character is equally likely.
fn password_char(byte: u8) -> Option<char> {
    let limit = 256 - 256 % PASSWORD_ALPHABET.len();
    let index = byte as usize;
    (index < limit).then(|| PASSWORD_ALPHABET[index % PASSWORD_ALPHABET.len()] as char)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_args_derives_identity_and_sizing() {
        let mut args = DeployArgs::new("ci", "eu-west-2");
        args.worker_count = 3;
        args.db_size = Some("large".to_string());

        let config = Configuration::from_args(&args).unwrap();
        assert_eq!(config.deployment, "flightdeck-ci");
        assert_eq!(config.region, "eu-west-2");
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.db_instance_class, "db.m4.large");
        assert_eq!(config.admin_username, "admin");
        assert!(config.director_certs.is_empty());
        assert!(config.domain.is_empty());
    }

    #[test]
    fn from_args_uses_default_db_class() {
        let config = Configuration::from_args(&DeployArgs::new("ci", "us-east-1")).unwrap();
        assert_eq!(config.db_instance_class, "db.t2.small");
    }

    #[test]
    fn password_bytes_past_last_full_cycle_are_rejected() {
        assert_eq!(password_char(0), Some('a'));
        assert_eq!(password_char(61), Some('9'));
        assert_eq!(password_char(62), Some('a'));
        assert_eq!(password_char(247), Some('9'));
        assert_eq!(password_char(248), None);
        assert_eq!(password_char(255), None);
    }

    #[test]
    fn passwords_are_alphanumeric_and_distinct() {
        let a = generate_password().unwrap();
        let b = generate_password().unwrap();
        assert_eq!(a.len(), 20);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn older_records_load_with_defaults() {
        let json = r#"{"project":"ci","deployment":"flightdeck-ci","region":"eu-west-1"}"#;
        let config: Configuration = serde_json::from_str(json).unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert!(!config.web_user_provided_cert);
        assert!(config.web_certs.is_empty());
    }
}
