use env_logger::{Builder, Env};
use log::{Level, SetLoggerError};
use std::io::Write;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp_ms: u64,
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// One line per entry; embedded newlines are escaped so entries stay greppable.
pub fn format_log_line(entry: &LogEntry) -> String {
    format!(
        "{} [{}] [{}] {}",
        entry.timestamp_ms,
        entry.level,
        entry.target,
        entry.message.replace('\n', "\\n")
    )
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Install the stderr logger. `RUST_LOG` overrides [`DEFAULT_FILTER`].
pub fn init() -> Result<(), SetLoggerError> {
    Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER))
        .format(|buf, record| {
            let entry = LogEntry {
                timestamp_ms: now_ms(),
                level: record.level(),
                target: record.target().to_string(),
                message: record.args().to_string(),
            };
            writeln!(buf, "{}", format_log_line(&entry))
        })
        .try_init()
}
