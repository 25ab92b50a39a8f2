//! Hosted-zone lookup through the `aws` CLI.

use async_trait::async_trait;
use flightdeck_deploy::hosted_zone::longest_matching_zone;
use flightdeck_deploy::{CloudClient, HostedZone};
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::run_captured;

const ZONE_ID_PREFIX: &str = "/hostedzone/";

#[derive(Debug, Deserialize)]
struct ListHostedZones {
    #[serde(rename = "HostedZones", default)]
    hosted_zones: Vec<ZoneEntry>,
}

#[derive(Debug, Deserialize)]
struct ZoneEntry {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
}

/// Parse `aws route53 list-hosted-zones` output into bare zone names and IDs.
pub fn parse_hosted_zones(json: &[u8]) -> anyhow::Result<Vec<HostedZone>> {
    let listing: ListHostedZones = serde_json::from_slice(json)?;
    Ok(listing
        .hosted_zones
        .into_iter()
        .map(|zone| HostedZone {
            name: zone.name.trim_end_matches('.').to_string(),
            id: zone
                .id
                .strip_prefix(ZONE_ID_PREFIX)
                .unwrap_or(&zone.id)
                .to_string(),
        })
        .collect())
}

pub struct Route53 {
    aws: String,
}

impl Route53 {
    pub fn new(aws: &str) -> Self {
        Self {
            aws: aws.to_string(),
        }
    }
}

#[async_trait]
impl CloudClient for Route53 {
    fn iaas(&self) -> &str {
        "AWS"
    }

    async fn find_longest_matching_hosted_zone(
        &self,
        domain: &str,
    ) -> anyhow::Result<Option<HostedZone>> {
        let mut cmd = Command::new(&self.aws);
        cmd.args(["route53", "list-hosted-zones", "--output", "json"]);
        let stdout = run_captured(&mut cmd, "aws route53 list-hosted-zones").await?;

        let zones = parse_hosted_zones(&stdout)?;
        debug!(count = zones.len(), %domain, "listed hosted zones");
        Ok(longest_matching_zone(domain, &zones).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "HostedZones": [
            {"Id": "/hostedzone/Z1ABC", "Name": "example.com.", "CallerReference": "a"},
            {"Id": "/hostedzone/Z2DEF", "Name": "team.example.com.", "CallerReference": "b"}
        ]
    }"#;

    #[test]
    fn strips_id_prefix_and_trailing_dot() {
        let zones = parse_hosted_zones(LISTING.as_bytes()).unwrap();
        assert_eq!(
            zones[0],
            HostedZone {
                name: "example.com".to_string(),
                id: "Z1ABC".to_string(),
            }
        );
        let best = longest_matching_zone("ci.team.example.com", &zones).unwrap();
        assert_eq!(best.id, "Z2DEF");
    }

    #[test]
    fn empty_listing_has_no_zones() {
        assert!(parse_hosted_zones(b"{}").unwrap().is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_hosted_zones(b"not json").is_err());
    }
}
