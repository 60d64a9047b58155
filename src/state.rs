use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::db::LedgerDb;
use crate::error::ServiceError;
use crate::types::Config;

/// Shared application state: configuration plus the ledger connection.
///
/// Commands lock `db` for their whole duration, so at most one command
/// touches the connection at a time.
pub struct AppState {
    pub config: Mutex<Config>,
    pub db: Mutex<Option<LedgerDb>>,
}

impl AppState {
    /// Load config and open the ledger. A database that fails to open leaves
    /// the state usable; commands then report the ledger as unavailable.
    pub fn new() -> Self {
        let config = match load_config() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{e}. Using default configuration.");
                Config::default()
            }
        };

        let opened = database_path(&config)
            .and_then(|path| LedgerDb::open_at(path).map_err(ServiceError::from));
        let db = match opened {
            Ok(db) => Some(db),
            Err(e) => {
                log::warn!("Failed to open ledger database: {e}. Ledger features disabled.");
                None
            }
        };

        Self::with_db(config, db)
    }

    pub fn with_db(config: Config, db: Option<LedgerDb>) -> Self {
        Self {
            config: Mutex::new(config),
            db: Mutex::new(db),
        }
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Config {
        self.config.lock().clone()
    }

    /// Run `f` against the open ledger.
    pub fn with_ledger<T>(
        &self,
        f: impl FnOnce(&LedgerDb) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let guard = self.db.lock();
        let db = guard
            .as_ref()
            .ok_or_else(|| ServiceError::Config("ledger database is not open".to_string()))?;
        f(db)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the database location: the configured override or `~/.chitbook/chitbook.db`.
pub fn database_path(config: &Config) -> Result<PathBuf, ServiceError> {
    match config.database_path.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => Ok(PathBuf::from(p)),
        _ => Ok(LedgerDb::default_path()?),
    }
}

/// Get the config file path (~/.chitbook/config.json)
pub fn config_path() -> Result<PathBuf, ServiceError> {
    let home = dirs::home_dir()
        .ok_or_else(|| ServiceError::Config("could not find home directory".to_string()))?;
    Ok(home.join(".chitbook").join("config.json"))
}

/// Load configuration from ~/.chitbook/config.json. A missing file yields defaults.
pub fn load_config() -> Result<Config, ServiceError> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config, ServiceError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path)
        .map_err(|e| ServiceError::Config(format!("failed to read {}: {e}", path.display())))?;
    let config: Config = serde_json::from_str(&content)
        .map_err(|e| ServiceError::Config(format!("failed to parse {}: {e}", path.display())))?;
    config
        .validate()
        .map_err(|e| ServiceError::Config(format!("{}: {e}", path.display())))?;
    Ok(config)
}

/// Apply `mutator` to the in-memory config and write it back to disk.
pub fn update_config(
    state: &AppState,
    mutator: impl FnOnce(&mut Config),
) -> Result<Config, ServiceError> {
    update_config_at(state, &config_path()?, mutator)
}

pub fn update_config_at(
    state: &AppState,
    path: &Path,
    mutator: impl FnOnce(&mut Config),
) -> Result<Config, ServiceError> {
    let mut guard = state.config.lock();
    let mut config = guard.clone();
    mutator(&mut config);
    config.validate().map_err(ServiceError::Config)?;

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| ServiceError::Config(format!("failed to create config dir: {e}")))?;
        }
    }
    let content = serde_json::to_string_pretty(&config)
        .map_err(|e| ServiceError::Config(format!("failed to serialize config: {e}")))?;
    crate::util::atomic_write_str(path, &content)
        .map_err(|e| ServiceError::Config(format!("failed to write config: {e}")))?;

    *guard = config.clone();
    log::info!("Configuration written to {}", path.display());
    Ok(config)
}
