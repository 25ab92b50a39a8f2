//! StateStore: redb-backed persistence for Flightdeck.
//!
//! Provides typed operations over deployment configurations and raw
//! operations over named assets. The store supports both on-disk and
//! in-memory backends (the latter for testing).
//!
//! redb holds an exclusive lock on the database file while it is open, so
//! two local runs against the same state file cannot interleave.

use std::path::Path;
use std::sync::Arc;

use flightdeck_core::{Configuration, DeployArgs, deployment_name};
use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Asset holding the director's opaque deploy state.
pub const STATE_ASSET: &str = "director-state.json";

/// Asset holding the director's generated credentials.
pub const CREDS_ASSET: &str = "director-creds.yml";

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Persistence contract for a single deployment's configuration and assets.
pub trait ConfigStore: Send + Sync {
    /// Load the stored configuration, or create and persist a new one.
    /// The flag is `true` when the configuration was created.
    fn load_or_create(&self, args: &DeployArgs) -> StateResult<(Configuration, bool)>;

    /// Persist the configuration, replacing the stored record.
    fn update(&self, config: &Configuration) -> StateResult<()>;

    fn has_asset(&self, name: &str) -> StateResult<bool>;

    /// Load an asset. Absent assets are `StateError::AssetNotFound`.
    fn load_asset(&self, name: &str) -> StateResult<Vec<u8>>;

    fn store_asset(&self, name: &str, data: &[u8]) -> StateResult<()>;
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(|e| open_error(path, e))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Open a state store that must already exist. Never creates the file.
    pub fn open_existing(path: &Path) -> StateResult<Self> {
        if !path.is_file() {
            return Err(StateError::Missing(path.to_path_buf()));
        }
        Self::open(path)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Scope the store to the deployment belonging to `project`.
    pub fn project(&self, project: &str) -> ProjectStore {
        ProjectStore {
            store: self.clone(),
            deployment: deployment_name(project),
        }
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(CONFIGS).map_err(map_err!(Table))?;
        txn.open_table(ASSETS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Configurations ─────────────────────────────────────────────

    /// Insert or update a configuration under `deployment`.
    pub fn put_config(&self, deployment: &str, config: &Configuration) -> StateResult<()> {
        let value = serde_json::to_vec(config).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CONFIGS).map_err(map_err!(Table))?;
            table
                .insert(deployment, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%deployment, "configuration stored");
        Ok(())
    }

    pub fn get_config(&self, deployment: &str) -> StateResult<Option<Configuration>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CONFIGS).map_err(map_err!(Table))?;
        match table.get(deployment).map_err(map_err!(Read))? {
            Some(guard) => {
                let config: Configuration =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(config))
            }
            None => Ok(None),
        }
    }

    /// List all stored configurations.
    pub fn list_configs(&self) -> StateResult<Vec<Configuration>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CONFIGS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let config: Configuration =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(config);
        }
        Ok(results)
    }

    // ── Assets ─────────────────────────────────────────────────────

    pub fn put_asset(&self, deployment: &str, name: &str, data: &[u8]) -> StateResult<()> {
        let key = asset_key(deployment, name);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ASSETS).map_err(map_err!(Table))?;
            table.insert(key.as_str(), data).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, bytes = data.len(), "asset stored");
        Ok(())
    }

    pub fn get_asset(&self, deployment: &str, name: &str) -> StateResult<Option<Vec<u8>>> {
        let key = asset_key(deployment, name);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ASSETS).map_err(map_err!(Table))?;
        let value = table
            .get(key.as_str())
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }
}

fn open_error(path: &Path, err: redb::DatabaseError) -> StateError {
    match err {
        redb::DatabaseError::DatabaseAlreadyOpen => StateError::Locked(path.to_path_buf()),
        other => StateError::Open(other.to_string()),
    }
}

fn asset_key(deployment: &str, name: &str) -> String {
    format!("{deployment}/{name}")
}

/// A [`StateStore`] scoped to one deployment.
#[derive(Clone)]
pub struct ProjectStore {
    store: StateStore,
    deployment: String,
}

impl ProjectStore {
    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    /// The stored configuration, if this deployment exists.
    pub fn load(&self) -> StateResult<Option<Configuration>> {
        self.store.get_config(&self.deployment)
    }
}

impl ConfigStore for ProjectStore {
    fn load_or_create(&self, args: &DeployArgs) -> StateResult<(Configuration, bool)> {
        if let Some(config) = self.store.get_config(&self.deployment)? {
            return Ok((config, false));
        }

        let mut config = Configuration::from_args(args).map_err(map_err!(Create))?;
        config.deployment = self.deployment.clone();
        self.store.put_config(&self.deployment, &config)?;
        debug!(deployment = %self.deployment, "created new configuration");
        Ok((config, true))
    }

    fn update(&self, config: &Configuration) -> StateResult<()> {
        self.store.put_config(&self.deployment, config)
    }

    fn has_asset(&self, name: &str) -> StateResult<bool> {
        Ok(self.store.get_asset(&self.deployment, name)?.is_some())
    }

    fn load_asset(&self, name: &str) -> StateResult<Vec<u8>> {
        self.store
            .get_asset(&self.deployment, name)?
            .ok_or_else(|| StateError::AssetNotFound {
                deployment: self.deployment.clone(),
                name: name.to_string(),
            })
    }

    fn store_asset(&self, name: &str, data: &[u8]) -> StateResult<()> {
        self.store.put_asset(&self.deployment, name, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_args() -> DeployArgs {
        DeployArgs::new("ci", "eu-west-1")
    }

    // ── Configurations ─────────────────────────────────────────────

    #[test]
    fn load_or_create_creates_once() {
        let store = StateStore::open_in_memory().unwrap().project("ci");

        let (created, was_created) = store.load_or_create(&test_args()).unwrap();
        assert!(was_created);
        assert_eq!(created.deployment, "flightdeck-ci");

        let (loaded, was_created) = store.load_or_create(&test_args()).unwrap();
        assert!(!was_created);
        assert_eq!(loaded, created);
    }

    #[test]
    fn update_replaces_record() {
        let store = StateStore::open_in_memory().unwrap().project("ci");
        let (mut config, _) = store.load_or_create(&test_args()).unwrap();

        config.domain = "ci.example.com".to_string();
        config.worker_count = 4;
        store.update(&config).unwrap();

        let reloaded = store.load().unwrap().unwrap();
        assert_eq!(reloaded.domain, "ci.example.com");
        assert_eq!(reloaded.worker_count, 4);
    }

    #[test]
    fn projects_are_isolated() {
        let store = StateStore::open_in_memory().unwrap();
        store.project("a").load_or_create(&DeployArgs::new("a", "eu-west-1")).unwrap();
        store.project("b").load_or_create(&DeployArgs::new("b", "us-east-1")).unwrap();

        let all = store.list_configs().unwrap();
        assert_eq!(all.len(), 2);
        let b = store.project("b").load().unwrap().unwrap();
        assert_eq!(b.region, "us-east-1");
    }

    // ── Assets ─────────────────────────────────────────────────────

    #[test]
    fn assets_roundtrip() {
        let store = StateStore::open_in_memory().unwrap().project("ci");
        assert!(!store.has_asset(STATE_ASSET).unwrap());

        store.store_asset(STATE_ASSET, b"{\"vm\":1}").unwrap();
        assert!(store.has_asset(STATE_ASSET).unwrap());
        assert_eq!(store.load_asset(STATE_ASSET).unwrap(), b"{\"vm\":1}");
    }

    #[test]
    fn missing_asset_is_not_found() {
        let store = StateStore::open_in_memory().unwrap().project("ci");
        assert!(matches!(
            store.load_asset(CREDS_ASSET),
            Err(StateError::AssetNotFound { deployment, name })
                if deployment == "flightdeck-ci" && name == "director-creds.yml"
        ));
    }

    #[test]
    fn assets_scoped_per_deployment() {
        let store = StateStore::open_in_memory().unwrap();
        store.project("a").store_asset(CREDS_ASSET, b"a").unwrap();
        assert!(!store.project("b").has_asset(CREDS_ASSET).unwrap());
    }

    #[test]
    fn empty_asset_is_present() {
        let store = StateStore::open_in_memory().unwrap().project("ci");
        store.store_asset(STATE_ASSET, b"").unwrap();
        assert!(store.has_asset(STATE_ASSET).unwrap());
        assert!(store.load_asset(STATE_ASSET).unwrap().is_empty());
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn open_existing_never_creates() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("absent").join("state.redb");

        let err = StateStore::open_existing(&db_path).err().unwrap();

        assert!(matches!(err, StateError::Missing(ref p) if *p == db_path));
        assert!(!dir.path().join("absent").exists());
    }

    #[test]
    fn open_existing_reads_stored_config() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("state.redb");
        {
            let store = StateStore::open(&db_path).unwrap().project("ci");
            store.load_or_create(&test_args()).unwrap();
        }

        let store = StateStore::open_existing(&db_path).unwrap();
        assert!(store.project("ci").load().unwrap().is_some());
    }

    #[test]
    fn second_open_is_locked_out() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("state.redb");
        let _held = StateStore::open(&db_path).unwrap();

        let err = StateStore::open(&db_path).err().unwrap();

        assert!(matches!(err, StateError::Locked(ref p) if *p == db_path));
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("state.redb");

        {
            let store = StateStore::open(&db_path).unwrap().project("ci");
            let (mut config, _) = store.load_or_create(&test_args()).unwrap();
            config.region = "ap-southeast-2".to_string();
            store.update(&config).unwrap();
            store.store_asset(STATE_ASSET, b"state").unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap().project("ci");
        let config = store.load().unwrap().unwrap();
        assert_eq!(config.region, "ap-southeast-2");
        assert_eq!(store.load_asset(STATE_ASSET).unwrap(), b"state");
    }
}
