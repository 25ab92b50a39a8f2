use flightdeck_core::CertificateBundle;
use flightdeck_deploy::CertGenerator;

/// Issues bundles with a fresh CA per call.
pub struct PkiGenerator;

impl CertGenerator for PkiGenerator {
    fn generate(&self, identity: &str, subjects: &[&str]) -> anyhow::Result<CertificateBundle> {
        Ok(flightdeck_pki::generate_bundle(identity, subjects)?)
    }
}
