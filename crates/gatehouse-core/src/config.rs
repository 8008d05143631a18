//! Application configuration management.
//!
//! This module handles loading and saving the configuration: the storage
//! namespace and backend, session lifetime, simulated latency and password
//! scheme.
//!
//! Configuration is stored at `~/.config/gatehouse/config.json`. Any field can
//! be overridden with a `GATEHOUSE_*` environment variable.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{PasswordScheme, SessionManager, SessionOptions, DEFAULT_SESSION_TTL_HOURS};
use crate::storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore, Storage};

/// Application name used for config/data directory paths
const APP_NAME: &str = "gatehouse";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Storage namespace; yields the keys `admin_token`, `admin_user`, ...
const DEFAULT_NAMESPACE: &str = "admin";

/// Upper bound on session lifetime (ten years).
const MAX_SESSION_TTL_HOURS: i64 = 10 * 365 * 24;

const ENV_NAMESPACE: &str = "GATEHOUSE_NAMESPACE";
const ENV_SESSION_TTL_HOURS: &str = "GATEHOUSE_SESSION_TTL_HOURS";
const ENV_LATENCY_MS: &str = "GATEHOUSE_LATENCY_MS";
const ENV_BACKEND: &str = "GATEHOUSE_BACKEND";
const ENV_PASSWORD_SCHEME: &str = "GATEHOUSE_PASSWORD_SCHEME";
const ENV_DATA_DIR: &str = "GATEHOUSE_DATA_DIR";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "keyring" | "keychain" => Ok(StorageBackend::Keyring),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub namespace: String,
    pub session_ttl_hours: i64,
    pub latency_ms: u64,
    pub backend: StorageBackend,
    pub password_scheme: PasswordScheme,
    pub data_dir: Option<PathBuf>,
    /// Email of the last successful login, offered as the default next time.
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            latency_ms: 0,
            backend: StorageBackend::default(),
            password_scheme: PasswordScheme::default(),
            data_dir: None,
            last_email: None,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)?.with_overrides(|name| std::env::var(name).ok())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply overrides from `lookup`, normally the process environment.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(namespace) = lookup(ENV_NAMESPACE) {
            self.namespace = namespace;
        }
        if let Some(hours) = lookup(ENV_SESSION_TTL_HOURS) {
            self.session_ttl_hours = hours
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of hours", ENV_SESSION_TTL_HOURS))?;
        }
        if let Some(ms) = lookup(ENV_LATENCY_MS) {
            self.latency_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of milliseconds", ENV_LATENCY_MS))?;
        }
        if let Some(backend) = lookup(ENV_BACKEND) {
            self.backend = backend.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(scheme) = lookup(ENV_PASSWORD_SCHEME) {
            self.password_scheme = scheme.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        self.session_ttl()?;
        Ok(self)
    }

    /// Validated session lifetime: positive and at most ten years.
    pub fn session_ttl(&self) -> Result<Duration> {
        let hours = self.session_ttl_hours;
        if hours <= 0 {
            anyhow::bail!("session_ttl_hours must be positive, got {}", hours);
        }
        if hours > MAX_SESSION_TTL_HOURS {
            anyhow::bail!(
                "session_ttl_hours must be at most {}, got {}",
                MAX_SESSION_TTL_HOURS,
                hours
            );
        }
        Duration::try_hours(hours)
            .ok_or_else(|| anyhow::anyhow!("session_ttl_hours out of range: {}", hours))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn session_options(&self) -> Result<SessionOptions> {
        Ok(SessionOptions {
            ttl: self.session_ttl()?,
            latency: StdDuration::from_millis(self.latency_ms),
            password_scheme: self.password_scheme,
        })
    }

    pub fn open_backend(&self) -> Result<Arc<dyn KeyValueStore>> {
        Ok(match self.backend {
            StorageBackend::File => {
                let store = FileStore::new(self.data_dir()?).context("Failed to open data directory")?;
                debug!(data_dir = %store.data_dir().display(), "Using file store");
                Arc::new(store)
            }
            StorageBackend::Keyring => Arc::new(KeyringStore::new(APP_NAME)),
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        })
    }

    pub fn session_manager(&self) -> Result<SessionManager> {
        let options = self.session_options()?;
        let storage = Storage::new(self.open_backend()?, self.namespace.clone());
        Ok(SessionManager::with_options(storage, options))
    }
}
