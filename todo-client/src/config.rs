/// Client configuration and persisted UI selection.
///
/// client.json        -> server URL, debounce window, rollback policy, version checks
/// client-state.json  -> last selected list id, restored on start-up
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use todo_core::config::{app_config_dir, load_or_default, write_json_file, ConfigError};

pub const SERVER_URL_ENV: &str = "TODO_LISTS_SERVER_URL";

/// What to do with an optimistic completion toggle the server rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollbackPolicy {
    /// Leave the local flag as the user set it; local and server may diverge.
    #[default]
    Keep,
    /// Put the flag back to what it was before the toggle.
    Revert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub rollback: RollbackPolicy,
    /// Send `If-Match` with every save so concurrent edits surface as 409.
    #[serde(default)]
    pub version_checks: bool,
}

fn default_server_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            debounce_ms: default_debounce_ms(),
            rollback: RollbackPolicy::default(),
            version_checks: false,
        }
    }
}

impl ClientConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

pub fn default_config_path() -> PathBuf {
    app_config_dir().join("client.json")
}

pub fn load_config(path: &Path) -> ClientConfig {
    let mut config: ClientConfig = load_or_default(path);
    if let Ok(url) = std::env::var(SERVER_URL_ENV) {
        config.server_url = url;
    }
    config
}

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ClientState {
    #[serde(default, rename = "activeList")]
    active_list: Option<String>,
}

/// Remembers which list was selected across client runs.
#[derive(Debug, Clone)]
pub struct SelectionStore {
    path: PathBuf,
}

impl SelectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Self {
        Self::new(app_config_dir().join("client-state.json"))
    }

    pub fn load(&self) -> Option<String> {
        let state: ClientState = load_or_default(&self.path);
        state.active_list
    }

    pub fn save(&self, list_id: &str) -> Result<(), ConfigError> {
        write_json_file(
            &self.path,
            &ClientState {
                active_list: Some(list_id.to_string()),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server_url, "http://localhost:3001");
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.rollback, RollbackPolicy::Keep);
        assert!(!config.version_checks);
    }

    #[test]
    fn test_parse_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        fs::write(&path, r#"{ "rollback": "revert", "debounce_ms": 250 }"#).unwrap();

        let config: ClientConfig = load_or_default(&path);

        assert_eq!(config.rollback, RollbackPolicy::Revert);
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.server_url, "http://localhost:3001");
    }

    #[test]
    fn test_selection_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::new(dir.path().join("client-state.json"));
        assert_eq!(store.load(), None);

        store.save("0000000002").unwrap();
        assert_eq!(store.load().as_deref(), Some("0000000002"));

        store.save("0000000001").unwrap();
        assert_eq!(store.load().as_deref(), Some("0000000001"));
    }
}
