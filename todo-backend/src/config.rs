/// Configuration for the todo backend.
/// Reads server.json from ~/.config/todo-lists/server.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use todo_core::config::{app_config_dir, load_or_default};
use todo_core::store::memory::DEFAULT_LISTS;
use todo_core::types::TodoList;

pub const CONFIG_PATH_ENV: &str = "TODO_LISTS_CONFIG";
pub const PORT_ENV: &str = "TODO_LISTS_PORT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Lists the store starts with. Anything written later is lost on restart.
    #[serde(default = "default_lists")]
    pub lists: Vec<TodoList>,
}

fn default_port() -> u16 {
    3001
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_lists() -> Vec<TodoList> {
    DEFAULT_LISTS
        .iter()
        .map(|(id, title)| TodoList::new(*id, *title))
        .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            lists: default_lists(),
        }
    }
}

/// Config path: `$TODO_LISTS_CONFIG` if set, else ~/.config/todo-lists/server.json
pub fn default_config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| app_config_dir().join("server.json"))
}

/// Load config from path. Returns defaults if the file doesn't exist or is invalid.
pub fn load_config(path: &Path) -> ServerConfig {
    load_or_default(path)
}

/// Apply `$TODO_LISTS_PORT` on top of a loaded config.
pub fn apply_env_overrides(mut config: ServerConfig) -> ServerConfig {
    if let Ok(raw) = std::env::var(PORT_ENV) {
        match raw.parse() {
            Ok(port) => config.port = port,
            Err(e) => log::warn!(target: "todo.config", "Ignoring {}={:?}: {}", PORT_ENV, raw, e),
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3001);
        assert_eq!(config.bind_address, "127.0.0.1");
        let ids: Vec<&str> = config.lists.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["0000000001", "0000000002"]);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        fs::write(&path, r#"{ "port": 4000 }"#).unwrap();

        let config = load_config(&path);

        assert_eq!(config.port, 4000);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.lists.len(), 2);
    }

    #[test]
    fn test_custom_lists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        fs::write(
            &path,
            r#"{ "lists": [ { "id": "groceries", "title": "Groceries",
                 "todos": [ { "text": "milk", "completed": false } ] } ] }"#,
        )
        .unwrap();

        let config = load_config(&path);

        assert_eq!(config.lists.len(), 1);
        assert_eq!(config.lists[0].id, "groceries");
        assert_eq!(
            config.lists[0].todos[0],
            serde_json::json!({ "text": "milk", "completed": false })
        );
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("nope.json"));
        assert_eq!(config.port, 3001);
    }
}
