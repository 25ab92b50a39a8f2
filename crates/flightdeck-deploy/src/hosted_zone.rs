//! Hosted-zone binding for deployments with a public domain.

use std::io::Write;

use flightdeck_core::Configuration;
use tracing::info;

use crate::collaborators::{CloudClient, HostedZone};
use crate::error::{DeployError, DeployResult};

/// Whether `zone` is `domain` itself or one of its dot-separated parents.
pub fn zone_matches(domain: &str, zone: &str) -> bool {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    let zone = zone.trim_end_matches('.').to_ascii_lowercase();
    !zone.is_empty() && (domain == zone || domain.ends_with(&format!(".{zone}")))
}

/// Pick the zone with the longest name that matches `domain`.
pub fn longest_matching_zone<'a>(domain: &str, zones: &'a [HostedZone]) -> Option<&'a HostedZone> {
    zones
        .iter()
        .filter(|zone| zone_matches(domain, &zone.name))
        .max_by_key(|zone| zone.name.trim_end_matches('.').len())
}

/// Record name relative to the zone: `a.sub.example.com` in
/// `sub.example.com` is `a`. The zone apex has an empty prefix.
pub fn record_prefix(domain: &str, zone: &str) -> String {
    let zone = zone.trim_end_matches('.');
    if domain.eq_ignore_ascii_case(zone) {
        return String::new();
    }
    let cut = domain.len().saturating_sub(zone.len() + 1);
    match domain.get(cut..) {
        Some(suffix) if suffix.eq_ignore_ascii_case(&format!(".{zone}")) => domain[..cut].to_string(),
        _ => domain.to_string(),
    }
}

/// Resolve the hosted zone for `domain` and bind it to the configuration.
pub async fn bind_hosted_zone(
    cloud: &dyn CloudClient,
    domain: &str,
    config: &mut Configuration,
    stderr: &mut dyn Write,
) -> DeployResult<HostedZone> {
    let zone = cloud
        .find_longest_matching_hosted_zone(domain)
        .await
        .map_err(DeployError::Dns)?
        .ok_or_else(|| DeployError::HostedZoneNotFound(domain.to_string()))?;

    config.hosted_zone_id = zone.id.clone();
    config.hosted_zone_record_prefix = record_prefix(domain, &zone.name);
    config.domain = domain.to_string();

    writeln!(
        stderr,
        "\nWARNING: adding record {domain} to Route53 hosted zone {} ID: {}\n",
        zone.name, zone.id
    )?;
    info!(%domain, zone = %zone.name, zone_id = %zone.id, "bound hosted zone");
    Ok(zone)
}
