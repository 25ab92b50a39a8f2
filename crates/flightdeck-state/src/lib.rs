//! flightdeck-state: persistent state for Flightdeck deployments.
//!
//! Backed by [redb](https://docs.rs/redb). Each deployment owns one
//! [`Configuration`](flightdeck_core::Configuration) record plus a set of
//! named binary assets (the director's opaque state and credentials).
//!
//! # Architecture
//!
//! Configurations are JSON-serialized into redb's `&[u8]` value columns,
//! keyed by deployment name. Assets are stored raw under
//! `{deployment}/{asset}` keys.
//!
//! [`StateStore`] is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).
//! [`ProjectStore`] scopes it to a single deployment and implements the
//! [`ConfigStore`] contract the orchestrator consumes.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::{ConfigStore, ProjectStore, StateStore, CREDS_ASSET, STATE_ASSET};
