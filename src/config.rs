use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::fs::LockManager;

/// Config file used when `PATHGUARD_CONFIG` is not set.
pub const DEFAULT_CONFIG_FILE: &str = "pathguard.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub www: WwwConfig,
    pub fs: FsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WwwConfig {
    pub root: PathBuf,
    pub index: String,
    /// Added to every response
    pub headers: HashMap<String, String>,
}

impl Default for WwwConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./wwwroot_dev"),
            index: "index.html".to_string(),
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Unset means lock waits never time out
    pub lock_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Config {
    /// Loads `PATHGUARD_CONFIG`, else `pathguard.yaml` if present, else
    /// defaults; then applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var_os("PATHGUARD_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?,
            None => Self::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("LISTEN") {
            self.server.listen_addr = addr;
        }
        if let Ok(root) = std::env::var("WWW_ROOT") {
            self.www.root = PathBuf::from(root);
        }
        match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => self.logging.format = LogFormat::Json,
            Ok("pretty") => self.logging.format = LogFormat::Pretty,
            Ok(other) => tracing::warn!(value = other, "ignoring unknown LOG_FORMAT"),
            Err(_) => {}
        }
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.fs.lock_timeout_ms.map(Duration::from_millis)
    }

    pub fn lock_manager(&self) -> LockManager {
        match self.lock_timeout() {
            Some(timeout) => LockManager::with_timeout(timeout),
            None => LockManager::new(),
        }
    }
}
