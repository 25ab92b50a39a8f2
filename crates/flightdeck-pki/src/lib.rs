//! flightdeck-pki: TLS material for Flightdeck deployments.
//!
//! Every bundle gets its own self-signed CA; the endpoint certificate is
//! signed by it and carries an IP or DNS SAN per subject.

pub mod generate;

pub use generate::{PkiError, PkiResult, generate_bundle, generate_bundle_valid_for};
