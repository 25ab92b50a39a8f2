//! Configuration requirement resolution.
//!
//! Runs twice per deploy. Before provisioning it applies everything that
//! shapes the infrastructure (region lock, database size, operator access,
//! DNS zone). After provisioning it fills in what depends on the
//! infrastructure's outputs (domain fallback, certificates, sizing).

use std::io::Write;

use flightdeck_core::{Configuration, DeployArgs, Metadata, sizes};
use tracing::{debug, info};

use crate::certs::{ensure_director_certs, ensure_web_certs};
use crate::error::{DeployError, DeployResult};
use crate::hosted_zone::bind_hosted_zone;
use crate::orchestrator::Orchestrator;

/// Reject a deploy into a region other than the one on record. An empty
/// stored region means the deployment was never pinned.
pub fn check_region(stored: &str, requested: &str) -> DeployResult<()> {
    if !stored.is_empty() && stored != requested {
        return Err(DeployError::RegionConflict {
            previous: stored.to_string(),
            requested: requested.to_string(),
        });
    }
    Ok(())
}

/// Copy the per-run sizing arguments onto the configuration.
pub fn apply_sizing(args: &DeployArgs, config: &mut Configuration) {
    config.worker_count = args.worker_count;
    config.worker_size = args.worker_size.clone();
    config.web_size = args.web_size.clone();
}

/// Override the database instance class when a size was requested.
/// Returns whether the class changed.
pub fn apply_db_size(args: &DeployArgs, config: &mut Configuration) -> bool {
    let Some(class) = args.db_size.as_deref().and_then(sizes::db_instance_class) else {
        return false;
    };
    if config.db_instance_class == class {
        return false;
    }
    config.db_instance_class = class.to_string();
    true
}

impl Orchestrator {
    /// Resolve requirements that must be known before provisioning.
    pub(crate) async fn resolve_pre_infra(&mut self, config: &mut Configuration) -> DeployResult<()> {
        check_region(&config.region, &self.args.region)?;
        config.region = self.args.region.clone();

        if apply_db_size(&self.args, config) {
            debug!(class = %config.db_instance_class, "database instance class overridden");
        }

        // A self-update runs from inside the deployment, whose address must
        // not replace the operator's.
        if !self.args.self_update {
            let ip = self
                .deps
                .user_ip
                .find_user_ip()
                .await
                .map_err(DeployError::UserIp)?;
            if config.source_access_ip != ip {
                config.source_access_ip = ip;
                writeln!(
                    self.stderr,
                    "\nWARNING: allowing access from local machine (address: {})\n",
                    config.source_access_ip
                )?;
                info!(ip = %config.source_access_ip, "operator access address updated");
                self.deps.store.update(config)?;
            }
        }

        if let Some(domain) = self.args.domain.clone() {
            let committed_domain = config.domain.clone();
            bind_hosted_zone(self.deps.cloud.as_ref(), &domain, config, &mut self.stderr).await?;

            // The domain is committed together with its web certificate once
            // provisioning succeeds. Until then the stored record keeps the
            // domain the current certificate was issued for.
            let mut checkpoint = config.clone();
            checkpoint.domain = committed_domain;
            self.deps.store.update(&checkpoint)?;
        }

        Ok(())
    }

    /// Resolve requirements that depend on provisioning outputs, then
    /// checkpoint the configuration.
    pub(crate) async fn resolve_post_infra(
        &mut self,
        previous_domain: &str,
        config: &mut Configuration,
        metadata: &Metadata,
    ) -> DeployResult<()> {
        if self.args.domain.is_none() {
            config.domain = metadata.web_public_ip.value.clone();
        }
        let domain_changed = previous_domain != config.domain;
        if domain_changed {
            debug!(previous = %previous_domain, current = %config.domain, "domain changed");
        }

        ensure_director_certs(config, metadata, self.deps.certs.as_ref(), &mut self.stdout)?;
        ensure_web_certs(
            self.args.tls.as_ref(),
            domain_changed,
            config,
            self.deps.certs.as_ref(),
        )?;

        apply_sizing(&self.args, config);
        config.director_public_ip = metadata.director_public_ip.value.clone();

        self.deps.store.update(config)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpinned_region_accepts_any() {
        assert!(check_region("", "eu-west-1").is_ok());
    }

    #[test]
    fn same_region_is_accepted() {
        assert!(check_region("eu-west-1", "eu-west-1").is_ok());
    }

    #[test]
    fn region_change_is_rejected() {
        let err = check_region("eu-west-1", "us-east-1").unwrap_err();
        assert!(matches!(
            err,
            DeployError::RegionConflict { ref previous, ref requested }
                if previous == "eu-west-1" && requested == "us-east-1"
        ));
    }

    #[test]
    fn db_size_maps_to_instance_class() {
        let mut args = DeployArgs::new("ci", "eu-west-1");
        args.db_size = Some("large".to_string());
        let mut config = Configuration {
            db_instance_class: "db.t2.small".to_string(),
            ..Default::default()
        };

        assert!(apply_db_size(&args, &mut config));
        assert_eq!(config.db_instance_class, "db.m4.large");
        assert!(!apply_db_size(&args, &mut config));
    }

    #[test]
    fn absent_db_size_keeps_class() {
        let args = DeployArgs::new("ci", "eu-west-1");
        let mut config = Configuration {
            db_instance_class: "db.m4.xlarge".to_string(),
            ..Default::default()
        };
        assert!(!apply_db_size(&args, &mut config));
        assert_eq!(config.db_instance_class, "db.m4.xlarge");
    }

    #[test]
    fn sizing_follows_args() {
        let mut args = DeployArgs::new("ci", "eu-west-1");
        args.worker_count = 3;
        args.worker_size = "large".to_string();
        args.web_size = "medium".to_string();
        let mut config = Configuration::default();

        apply_sizing(&args, &mut config);

        assert_eq!(config.worker_count, 3);
        assert_eq!(config.worker_size, "large");
        assert_eq!(config.web_size, "medium");
    }
}
