use std::path::PathBuf;
use std::time::Duration;

/// Единый тип ошибок Download Hasher.
#[derive(thiserror::Error, Debug)]
pub enum HasherError {
  #[error("Downloads directory is not available on this OS/user")]
  DownloadsDirNotFound,

  #[error("Documents directory is not available on this OS/user")]
  DocumentsDirNotFound,

  #[error("Invalid path: {0}")]
  InvalidPath(String),

  #[error("Watcher is already running")]
  WatcherAlreadyRunning,

  #[error("Watcher is not running")]
  WatcherNotRunning,

  #[error("Unsupported hash algorithm: {0}")]
  UnsupportedAlgorithm(String),

  #[error("File did not become readable within {waited:?}: {path:?}")]
  StabilizationTimeout { path: PathBuf, waited: Duration },

  #[error("File vanished before it could be hashed: {0:?}")]
  FileVanished(PathBuf),

  #[error("Hash count mismatch: expected {expected}, got {actual}")]
  HashCountMismatch { expected: usize, actual: usize },

  #[error("Cannot update hash log {path:?}: {source}")]
  LogWrite {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Invalid config file {path:?}: {source}")]
  Config {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Notify error: {0}")]
  Notify(#[from] notify::Error),
}
