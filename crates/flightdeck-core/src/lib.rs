pub mod args;
pub mod config;
pub mod metadata;
pub mod sizes;
pub mod types;

pub use args::{ArgsError, DeployArgs, UserCert};
pub use config::FlightdeckConfig;
pub use metadata::{Metadata, MetadataError, OutputValue};
pub use types::*;
