/// Shared config file helpers used by both the backend and the client.
///
/// Files are plain JSON under `<config dir>/todo-lists/`. A missing or
/// unreadable file falls back to the type's defaults.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

pub const APP_DIR: &str = "todo-lists";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// `~/.config/todo-lists` (or platform equivalent), falling back to `./todo-lists`.
pub fn app_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a config file, logging and returning defaults when it is missing or invalid.
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match read_json_file(path) {
        Ok(value) => value,
        Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            log::info!(target: "todo.config", "No config at {}, using defaults", path.display());
            T::default()
        }
        Err(e) => {
            log::warn!(target: "todo.config", "{}, using defaults", e);
            T::default()
        }
    }
}

/// Write JSON atomically: write to a sibling .tmp file, then rename over the target.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    let content = serde_json::to_string_pretty(value).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp_path).map_err(io_err)?;
    file.write_all(content.as_bytes()).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    fs::rename(&tmp_path, path).map_err(io_err)?;
    Ok(())
}
