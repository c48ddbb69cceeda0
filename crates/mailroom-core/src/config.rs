use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// Top-level configuration for the mailroom service.
///
/// Loaded from `~/.mailroom/config.toml` by default. The intent rule set is
/// a separate JSON document referenced by `pipeline.rules_path`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailroomConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl MailroomConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MailroomConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP intake port.
    pub port: u16,
    /// Address the HTTP intake binds to.
    pub bind_address: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            port: 8080,
            bind_address: "127.0.0.1".to_string(),
        }
    }
}

/// Pipeline and intake settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Path to the intent rules JSON document.
    pub rules_path: String,
    /// Messages accepted but not yet picked up by the intake worker.
    pub queue_capacity: usize,
    /// Upper bound on pipeline runs in flight at once.
    pub max_concurrent_runs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rules_path: "intent_rules.json".to_string(),
            queue_capacity: 1024,
            max_concurrent_runs: 64,
        }
    }
}

/// Which action-execution backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    /// Record each call in the SQLite `action_log` table.
    #[default]
    Sqlite,
    /// Only log the rendered `EXEC` statement.
    Log,
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file for the action log and failure records.
    pub database_path: String,
    /// Action-execution backend.
    pub executor: ExecutorKind,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "~/.mailroom/mailroom.db".to_string(),
            executor: ExecutorKind::Sqlite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MailroomError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = MailroomConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.port, 8080);
        assert_eq!(config.general.bind_address, "127.0.0.1");
        assert_eq!(config.pipeline.rules_path, "intent_rules.json");
        assert_eq!(config.pipeline.queue_capacity, 1024);
        assert_eq!(config.storage.executor, ExecutorKind::Sqlite);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"
port = 9090
bind_address = "0.0.0.0"

[pipeline]
rules_path = "/etc/mailroom/rules.json"
queue_capacity = 16
max_concurrent_runs = 4

[storage]
database_path = "/var/lib/mailroom/db.sqlite"
executor = "log"
"#;
        let file = create_temp_config(content);
        let config = MailroomConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.port, 9090);
        assert_eq!(config.pipeline.rules_path, "/etc/mailroom/rules.json");
        assert_eq!(config.pipeline.queue_capacity, 16);
        assert_eq!(config.pipeline.max_concurrent_runs, 4);
        assert_eq!(config.storage.executor, ExecutorKind::Log);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "warn"
"#;
        let file = create_temp_config(content);
        let config = MailroomConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.port, 8080);
        assert_eq!(config.pipeline.max_concurrent_runs, 64);
    }

    #[test]
    fn test_load_unknown_executor_fails() {
        let file = create_temp_config("[storage]\nexecutor = \"oracle\"\n");
        let err = MailroomConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, MailroomError::Config(_)));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = MailroomConfig::load(Path::new("/nonexistent/mailroom.toml")).unwrap_err();
        assert!(matches!(err, MailroomError::Io(_)));
    }
}
