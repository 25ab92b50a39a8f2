use std::path::{Path, PathBuf};

use anyhow::Context;
use flightdeck_core::FlightdeckConfig;
use flightdeck_state::StateStore;

pub mod deploy;
pub mod info;

const DEFAULT_STATE_PATH: &str = "flightdeck.redb";

/// State database location: flag, then `[paths].state`, then the default.
pub fn state_path(settings: &FlightdeckConfig, flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| settings.paths().state)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH))
}

pub fn open_store(path: &Path) -> anyhow::Result<StateStore> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    StateStore::open(path)
        .with_context(|| format!("failed to open state database {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightdeck_core::config::PathsConfig;

    #[test]
    fn flag_wins_over_file() {
        let settings = FlightdeckConfig {
            paths: Some(PathsConfig {
                state: Some(PathBuf::from("/srv/state.redb")),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            state_path(&settings, Some(PathBuf::from("local.redb"))),
            PathBuf::from("local.redb")
        );
        assert_eq!(state_path(&settings, None), PathBuf::from("/srv/state.redb"));
        assert_eq!(
            state_path(&FlightdeckConfig::default(), None),
            PathBuf::from(DEFAULT_STATE_PATH)
        );
    }

    #[test]
    fn creates_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.redb");
        open_store(&path).unwrap();
        assert!(path.is_file());
    }
}
