//! CLI argument definitions for the mailroom binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::{Path, PathBuf};

/// Mailroom - classifies incoming messages by keyword rules and dispatches
/// stored-procedure calls.
#[derive(Parser, Debug)]
#[command(name = "mailroom", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Path to the intent rule file (JSON).
    #[arg(short = 'r', long = "rules")]
    pub rules: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// SQLite database path.
    #[arg(short = 'd', long = "database")]
    pub database: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > MAILROOM_CONFIG env var > ~/.mailroom/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("MAILROOM_CONFIG") {
            return PathBuf::from(p);
        }
        expand_home("~/.mailroom/config.toml")
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > MAILROOM_PORT env var > config file value > 8080.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        self.resolve_port_with(std::env::var("MAILROOM_PORT").ok().as_deref(), config_port)
    }

    fn resolve_port_with(&self, env_port: Option<&str>, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Some(p) = env_port.and_then(|v| v.parse::<u16>().ok()) {
            return p;
        }
        if config_port != 0 {
            return config_port;
        }
        8080
    }

    /// Resolve the rule file path. Priority: --rules flag > config file value.
    pub fn resolve_rules_path(&self, config_rules: &str) -> PathBuf {
        match self.rules {
            Some(ref p) => p.clone(),
            None => expand_home(config_rules),
        }
    }

    /// Resolve the database path. Priority: --database flag > config file value.
    pub fn resolve_database_path(&self, config_database: &str) -> PathBuf {
        match self.database {
            Some(ref p) => p.clone(),
            None => expand_home(config_database),
        }
    }

    /// Resolve the log level. Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix("~/") {
        Some(rest) => rest,
        None => return PathBuf::from(path),
    };
    #[cfg(target_os = "windows")]
    let home = std::env::var("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var("HOME");
    match home {
        Ok(home) => Path::new(&home).join(rest),
        Err(_) => PathBuf::from(path),
    }
}
