//! Конфигурация Download Hasher.
//!
//! Источник — TOML-файл. Путь берётся из `DOWNLOAD_HASHER_CONFIG`, иначе
//! `<config_dir>/download-hasher/config.toml`, если он существует. Все ключи
//! необязательны; отсутствующие получают значения по умолчанию.
//!
//! ```toml
//! watch_dir = "/home/me/Downloads"
//! ignored_extensions = [".tmp", ".crdownload", ".part"]
//! debounce_window_ms = 5000
//! algorithms = ["MD5", "SHA1", "SHA256"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;

use crate::error::HasherError;
use crate::hashing::{HashAlgorithm, DEFAULT_ALGORITHMS};
use crate::log_appender::DEFAULT_CHUNK_SIZE;

/// Переменная окружения с явным путём к конфигу.
pub const CONFIG_ENV_VAR: &str = "DOWNLOAD_HASHER_CONFIG";

/// Имя журнала по умолчанию (в папке Documents, скрытый файл).
pub const DEFAULT_LOG_FILE_NAME: &str = ".file_hashes.txt";

const CONFIG_DIR_NAME: &str = "download-hasher";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HasherConfig {
  /// Наблюдаемая директория. `None` — папка Downloads пользователя.
  pub watch_dir: Option<PathBuf>,
  /// Файл журнала. `None` — `<Documents>/.file_hashes.txt`.
  pub log_file: Option<PathBuf>,
  pub ignored_extensions: Vec<String>,
  pub debounce_window_ms: u64,
  pub retry_interval_ms: u64,
  pub stabilization_timeout_ms: u64,
  pub notifications_enabled: bool,
  pub algorithms: Vec<HashAlgorithm>,
  /// Размер блока при копировании старого журнала.
  pub copy_chunk_size: usize,
}

impl Default for HasherConfig {
  fn default() -> Self {
    Self {
      watch_dir: None,
      log_file: None,
      ignored_extensions: vec![".tmp".to_string(), ".crdownload".to_string()],
      debounce_window_ms: 5000,
      retry_interval_ms: 100,
      stabilization_timeout_ms: 5000,
      notifications_enabled: true,
      algorithms: DEFAULT_ALGORITHMS.to_vec(),
      copy_chunk_size: DEFAULT_CHUNK_SIZE,
    }
  }
}

impl HasherConfig {
  pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(raw)
  }

  pub fn load(path: &Path) -> Result<Self, HasherError> {
    let raw = std::fs::read_to_string(path)?;
    let config = Self::from_toml_str(&raw).map_err(|source| HasherError::Config {
      path: path.to_path_buf(),
      source,
    })?;
    info!("Loaded config from {}", path.display());
    Ok(config)
  }

  /// Загрузить конфиг из стандартных мест либо вернуть значения по умолчанию.
  ///
  /// Путь из `DOWNLOAD_HASHER_CONFIG` обязан существовать.
  pub fn load_default() -> Result<Self, HasherError> {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
      return Self::load(Path::new(&explicit));
    }

    if let Some(path) = default_config_path().filter(|p| p.is_file()) {
      return Self::load(&path);
    }

    debug!("No config file found, using defaults");
    Ok(Self::default())
  }

  /// Путь к журналу с учётом значения по умолчанию.
  pub fn log_file_path(&self) -> Result<PathBuf, HasherError> {
    if let Some(path) = &self.log_file {
      return Ok(path.clone());
    }
    let documents = dirs::document_dir().ok_or(HasherError::DocumentsDirNotFound)?;
    Ok(documents.join(DEFAULT_LOG_FILE_NAME))
  }

  pub fn debounce_window(&self) -> Duration {
    Duration::from_millis(self.debounce_window_ms)
  }

  pub fn retry_interval(&self) -> Duration {
    Duration::from_millis(self.retry_interval_ms)
  }

  pub fn stabilization_timeout(&self) -> Duration {
    Duration::from_millis(self.stabilization_timeout_ms)
  }
}

fn default_config_path() -> Option<PathBuf> {
  dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
