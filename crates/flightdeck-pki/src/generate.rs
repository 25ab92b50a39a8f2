//! Certificate bundle generation.

use std::net::IpAddr;

use flightdeck_core::CertificateBundle;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SanType};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::info;

/// Endpoint certificates are valid for one year.
pub const LEAF_VALIDITY_DAYS: i64 = 365;

const CA_VALIDITY_DAYS: i64 = 10 * 365;
const ORGANIZATION: &str = "Flightdeck";

#[derive(Debug, Error)]
pub enum PkiError {
    #[error("at least one certificate subject is required")]
    NoSubjects,

    #[error("invalid certificate subject {subject}: {reason}")]
    InvalidSubject { subject: String, reason: String },

    #[error("certificate generation failed: {0}")]
    Generation(#[from] rcgen::Error),
}

pub type PkiResult<T> = Result<T, PkiError>;

/// Generate a CA and an endpoint certificate for `subjects`, valid for
/// [`LEAF_VALIDITY_DAYS`].
pub fn generate_bundle(identity: &str, subjects: &[&str]) -> PkiResult<CertificateBundle> {
    generate_bundle_valid_for(identity, subjects, Duration::days(LEAF_VALIDITY_DAYS))
}

/// Generate a bundle whose endpoint certificate expires after `validity`.
pub fn generate_bundle_valid_for(
    identity: &str,
    subjects: &[&str],
    validity: Duration,
) -> PkiResult<CertificateBundle> {
    let Some(common_name) = subjects.first() else {
        return Err(PkiError::NoSubjects);
    };
    let now = OffsetDateTime::now_utc();

    let mut ca_params = CertificateParams::default();
    ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    let mut dn = DistinguishedName::new();
    dn.push(DnType::OrganizationName, ORGANIZATION);
    dn.push(DnType::CommonName, format!("{identity} CA"));
    ca_params.distinguished_name = dn;
    ca_params.not_before = now - Duration::hours(1);
    ca_params.not_after = now + Duration::days(CA_VALIDITY_DAYS);

    let ca_key = KeyPair::generate()?;
    let ca_cert = ca_params.self_signed(&ca_key)?;

    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::OrganizationName, ORGANIZATION);
    dn.push(DnType::CommonName, *common_name);
    params.distinguished_name = dn;
    for subject in subjects {
        params.subject_alt_names.push(san_for(subject)?);
    }
    params.not_before = now - Duration::hours(1);
    params.not_after = now + validity;

    let key = KeyPair::generate()?;
    let cert = params.signed_by(&key, &ca_cert, &ca_key)?;

    info!(%identity, sans = subjects.len(), "generated certificate bundle");

    Ok(CertificateBundle {
        ca_cert: ca_cert.pem(),
        cert: cert.pem(),
        key: key.serialize_pem(),
    })
}

fn san_for(subject: &str) -> PkiResult<SanType> {
    if let Ok(ip) = subject.parse::<IpAddr>() {
        return Ok(SanType::IpAddress(ip));
    }
    let name = subject
        .to_string()
        .try_into()
        .map_err(|e: rcgen::Error| PkiError::InvalidSubject {
            subject: subject.to_string(),
            reason: e.to_string(),
        })?;
    Ok(SanType::DnsName(name))
}
