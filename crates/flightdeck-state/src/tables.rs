//! redb table definitions for the Flightdeck state store.

use redb::TableDefinition;

/// Deployment configurations keyed by deployment name.
pub const CONFIGS: TableDefinition<&str, &[u8]> = TableDefinition::new("configs");

/// Raw asset bytes keyed by `{deployment}/{asset}`.
pub const ASSETS: TableDefinition<&str, &[u8]> = TableDefinition::new("assets");
