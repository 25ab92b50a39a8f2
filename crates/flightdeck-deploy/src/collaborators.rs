//! Contracts for the external systems the orchestrator drives.
//!
//! Each long-lived client (provisioner, director, pipeline client) is built
//! by an injected factory and must be wrapped in [`Scoped`] so its
//! [`Release::cleanup`] runs when the enclosing step returns, including
//! early returns on error. Stateless services (DNS, operator IP,
//! certificate generation) are shared handles.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use async_trait::async_trait;
use flightdeck_core::{CertificateBundle, Configuration, DeployArgs, Metadata};
use flightdeck_state::ConfigStore;
use tracing::{debug, warn};

/// Resources held by a client handle that must be released.
pub trait Release: Send + Sync {
    fn cleanup(&mut self) -> anyhow::Result<()>;
}

/// Guard that releases its handle when dropped.
pub struct Scoped<T: Release + ?Sized> {
    name: &'static str,
    inner: Box<T>,
}

impl<T: Release + ?Sized> Scoped<T> {
    pub fn new(name: &'static str, inner: Box<T>) -> Self {
        Self { name, inner }
    }
}

impl<T: Release + ?Sized> Deref for Scoped<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: Release + ?Sized> DerefMut for Scoped<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: Release + ?Sized> Drop for Scoped<T> {
    fn drop(&mut self) {
        match self.inner.cleanup() {
            Ok(()) => debug!(client = self.name, "released"),
            Err(e) => warn!(client = self.name, error = %e, "cleanup failed"),
        }
    }
}

// ── Infrastructure provisioning ────────────────────────────────────

#[async_trait]
pub trait Provisioner: Release {
    /// Converge infrastructure. `destroy` tears it down instead.
    async fn apply(&mut self, destroy: bool) -> anyhow::Result<()>;

    /// Structured outputs of the last apply.
    async fn output(&mut self) -> anyhow::Result<Metadata>;
}

pub trait ProvisionerFactory: Send + Sync {
    fn build(&self, iaas: &str, config: &Configuration) -> anyhow::Result<Box<dyn Provisioner>>;
}

// ── Configuration-management director ──────────────────────────────

/// Result of a director deploy. The state and credentials blobs are
/// returned even when the deploy itself failed.
#[derive(Debug)]
pub struct DirectorOutcome {
    pub state: Vec<u8>,
    pub creds: Vec<u8>,
    pub result: anyhow::Result<()>,
}

#[async_trait]
pub trait Director: Release {
    /// Deploy using the previous opaque `state` and `creds`. With `detach`
    /// the call returns once the upgrade has been initiated.
    async fn deploy(&mut self, state: Vec<u8>, creds: Vec<u8>, detach: bool) -> DirectorOutcome;
}

pub trait DirectorFactory: Send + Sync {
    fn build(
        &self,
        config: &Configuration,
        metadata: &Metadata,
    ) -> anyhow::Result<Box<dyn Director>>;
}

// ── CI administrative client ───────────────────────────────────────

/// Login details for the CI service's API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub target: String,
    pub api: String,
    pub username: String,
    pub password: String,
}

#[async_trait]
pub trait PipelineClient: Release {
    /// Whether the CI service answers at its API address.
    async fn can_connect(&self) -> anyhow::Result<bool>;

    /// Install the default self-update pipeline. With
    /// `allow_version_mismatch` a client/server version skew is tolerated.
    async fn set_default_pipeline(
        &self,
        args: &DeployArgs,
        config: &Configuration,
        allow_version_mismatch: bool,
    ) -> anyhow::Result<()>;
}

pub trait PipelineClientFactory: Send + Sync {
    fn build(&self, credentials: Credentials) -> anyhow::Result<Box<dyn PipelineClient>>;
}

// ── Cloud, network and certificate services ────────────────────────

/// A DNS hosted zone owned by the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    /// Zone name without a trailing dot, e.g. `example.com`.
    pub name: String,
    pub id: String,
}

#[async_trait]
pub trait CloudClient: Send + Sync {
    /// Name of the IaaS, passed to the provisioner factory.
    fn iaas(&self) -> &str;

    /// The owned zone whose name is the longest suffix of `domain`.
    async fn find_longest_matching_hosted_zone(
        &self,
        domain: &str,
    ) -> anyhow::Result<Option<HostedZone>>;
}

#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Public address of the machine running the deploy.
    async fn find_user_ip(&self) -> anyhow::Result<String>;
}

pub trait CertGenerator: Send + Sync {
    fn generate(&self, identity: &str, subjects: &[&str]) -> anyhow::Result<CertificateBundle>;
}

/// Everything the orchestrator talks to, injected at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ConfigStore>,
    pub cloud: Arc<dyn CloudClient>,
    pub user_ip: Arc<dyn IpResolver>,
    pub certs: Arc<dyn CertGenerator>,
    pub provisioners: Arc<dyn ProvisionerFactory>,
    pub directors: Arc<dyn DirectorFactory>,
    pub pipelines: Arc<dyn PipelineClientFactory>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counting(Arc<AtomicU32>);

    impl Release for Counting {
        fn cleanup(&mut self) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl Release for Failing {
        fn cleanup(&mut self) -> anyhow::Result<()> {
            anyhow::bail!("already gone")
        }
    }

    fn early_return(released: Arc<AtomicU32>) -> Result<(), &'static str> {
        let _guard = Scoped::new("counting", Box::new(Counting(released)));
        Err::<(), _>("step failed")?;
        Ok(())
    }

    #[test]
    fn releases_on_drop() {
        let released = Arc::new(AtomicU32::new(0));
        {
            let _guard = Scoped::new("counting", Box::new(Counting(released.clone())));
            assert_eq!(released.load(Ordering::SeqCst), 0);
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn releases_on_early_return() {
        let released = Arc::new(AtomicU32::new(0));
        assert!(early_return(released.clone()).is_err());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_cleanup_does_not_panic() {
        let guard: Scoped<dyn Release> = Scoped::new("failing", Box::new(Failing));
        drop(guard);
    }
}
