//! Стабилизация файла перед хешированием.
//!
//! ОС присылает несколько уведомлений на одну логическую запись, а писатель
//! (браузер, загрузчик) может ещё держать файл открытым. Стабилизатор:
//! - отбрасывает шум (директории, временные расширения, лишние виды событий);
//! - подавляет дубликаты в окне debounce;
//! - ждёт, пока файл можно будет открыть на чтение, и хеширует его.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, trace, warn};

use crate::config::HasherConfig;
use crate::error::HasherError;
use crate::file_watcher::events::{ChangeEvent, ChangeKind};
use crate::hashing::{compute_hashes, HashAlgorithm, HashResult, DEFAULT_ALGORITHMS};

/// Параметры стабилизации.
#[derive(Clone, Debug)]
pub struct StabilizerConfig {
  /// Расширения в нижнем регистре с ведущей точкой.
  pub ignored_extensions: Vec<String>,
  pub debounce_window: Duration,
  pub retry_interval: Duration,
  /// Отсчитывается от первой попытки открыть файл.
  pub stabilization_timeout: Duration,
  pub algorithms: Vec<HashAlgorithm>,
}

impl Default for StabilizerConfig {
  fn default() -> Self {
    Self {
      ignored_extensions: vec![".tmp".to_string(), ".crdownload".to_string()],
      debounce_window: Duration::from_millis(5000),
      retry_interval: Duration::from_millis(100),
      stabilization_timeout: Duration::from_millis(5000),
      algorithms: DEFAULT_ALGORITHMS.to_vec(),
    }
  }
}

impl From<&HasherConfig> for StabilizerConfig {
  fn from(cfg: &HasherConfig) -> Self {
    Self {
      ignored_extensions: cfg
        .ignored_extensions
        .iter()
        .map(|ext| normalize_extension(ext))
        .collect(),
      debounce_window: cfg.debounce_window(),
      retry_interval: cfg.retry_interval(),
      stabilization_timeout: cfg.stabilization_timeout(),
      algorithms: cfg.algorithms.clone(),
    }
  }
}

fn normalize_extension(ext: &str) -> String {
  let ext = ext.trim().to_lowercase();
  if ext.starts_with('.') {
    ext
  } else {
    format!(".{ext}")
  }
}

/// Способ открыть файл на чтение.
///
/// Шов для тестов: позволяет смоделировать файл, который писатель ещё держит.
pub trait SourceOpener: Send {
  type Source: Read + Seek;

  fn open(&self, path: &Path) -> io::Result<Self::Source>;
}

/// Открытие через файловую систему.
///
/// На Windows файл открывается с разделением только на чтение: пока писатель
/// держит дескриптор на запись, открытие падает с sharing violation.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsOpener;

impl SourceOpener for FsOpener {
  type Source = File;

  #[cfg(target_os = "windows")]
  fn open(&self, path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_SHARE_READ: u32 = 0x0000_0001;
    std::fs::OpenOptions::new()
      .read(true)
      .share_mode(FILE_SHARE_READ)
      .open(path)
  }

  #[cfg(not(target_os = "windows"))]
  fn open(&self, path: &Path) -> io::Result<File> {
    File::open(path)
  }
}

/// Последний принятый путь и момент его принятия.
#[derive(Clone, Debug, Default)]
pub struct DebounceState {
  last: Option<(String, Instant)>,
}

impl DebounceState {
  /// Подавить ли событие для `key` в момент `at`.
  pub fn should_suppress(&self, key: &str, at: Instant, window: Duration) -> bool {
    match &self.last {
      Some((last_key, last_at)) => {
        last_key == key && at.saturating_duration_since(*last_at) < window
      }
      None => false,
    }
  }

  pub fn record(&mut self, key: String, at: Instant) {
    self.last = Some((key, at));
  }
}

/// Причина, по которой событие отброшено до попытки хеширования.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
  Directory,
  IgnoredExtension,
  UnsupportedKind(ChangeKind),
  Debounced,
}

impl fmt::Display for Rejection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Directory => f.write_str("directory"),
      Self::IgnoredExtension => f.write_str("ignored extension"),
      Self::UnsupportedKind(kind) => write!(f, "unsupported kind {kind:?}"),
      Self::Debounced => f.write_str("duplicate within debounce window"),
    }
  }
}

/// Успешно стабилизированный и захешированный файл.
#[derive(Clone, Debug)]
pub struct StabilizedFile {
  pub path: PathBuf,
  pub observed_at: Instant,
  pub hashes: Vec<HashResult>,
}

/// Решает, когда (и нужно ли) хешировать файл.
#[derive(Debug)]
pub struct FileStabilizer<O: SourceOpener = FsOpener> {
  config: StabilizerConfig,
  opener: O,
  debounce: DebounceState,
}

impl FileStabilizer<FsOpener> {
  pub fn new(config: StabilizerConfig) -> Self {
    Self::with_opener(config, FsOpener)
  }
}

impl<O: SourceOpener> FileStabilizer<O> {
  pub fn with_opener(config: StabilizerConfig, opener: O) -> Self {
    Self {
      config,
      opener,
      debounce: DebounceState::default(),
    }
  }

  pub fn config(&self) -> &StabilizerConfig {
    &self.config
  }

  /// Обработать сырое событие. `None` — событие отброшено или файл так и
  /// не стал доступен; ошибки только логируются.
  pub fn on_raw_event(&mut self, event: ChangeEvent) -> Option<StabilizedFile> {
    if let Err(reason) = self.screen(&event) {
      trace!("Skipping {}: {reason}", event.path.display());
      return None;
    }

    match self.hash_when_readable(&event.path) {
      Ok(hashes) => Some(StabilizedFile {
        path: event.path,
        observed_at: event.timestamp,
        hashes,
      }),
      Err(HasherError::FileVanished(path)) => {
        debug!("File vanished before hashing: {}", path.display());
        None
      }
      Err(err @ HasherError::StabilizationTimeout { .. }) => {
        warn!("{err}");
        None
      }
      Err(err) => {
        error!("Cannot hash {}: {err}", event.path.display());
        None
      }
    }
  }

  /// Фильтры и debounce (без обращения к содержимому файла).
  ///
  /// Состояние debounce обновляется только для принятых событий.
  pub fn screen(&mut self, event: &ChangeEvent) -> Result<(), Rejection> {
    if event.path.is_dir() {
      return Err(Rejection::Directory);
    }
    if self.is_ignored_extension(&event.path) {
      return Err(Rejection::IgnoredExtension);
    }
    if !matches!(event.kind, ChangeKind::Created | ChangeKind::Modified) {
      return Err(Rejection::UnsupportedKind(event.kind));
    }

    let key = event.path.to_string_lossy().to_lowercase();
    if self
      .debounce
      .should_suppress(&key, event.timestamp, self.config.debounce_window)
    {
      return Err(Rejection::Debounced);
    }
    self.debounce.record(key, event.timestamp);
    Ok(())
  }

  fn is_ignored_extension(&self, path: &Path) -> bool {
    let Some(ext) = path.extension() else {
      return false;
    };
    let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
    self.config.ignored_extensions.iter().any(|ignored| *ignored == ext)
  }

  /// Открыть файл с повторами и посчитать хеши.
  fn hash_when_readable(&self, path: &Path) -> Result<Vec<HashResult>, HasherError> {
    let started = Instant::now();
    let algorithms = &self.config.algorithms;

    loop {
      if !path.exists() {
        return Err(HasherError::FileVanished(path.to_path_buf()));
      }

      match self.opener.open(path) {
        Ok(mut source) => match compute_hashes(&mut source, algorithms) {
          Ok(hashes) if hashes.len() == algorithms.len() => return Ok(hashes),
          Ok(hashes) => {
            return Err(HasherError::HashCountMismatch {
              expected: algorithms.len(),
              actual: hashes.len(),
            })
          }
          Err(HasherError::Io(err)) => trace!("Read of {} failed: {err}", path.display()),
          Err(err) => return Err(err),
        },
        Err(err) => trace!("Open of {} failed: {err}", path.display()),
      }

      let waited = started.elapsed();
      if waited >= self.config.stabilization_timeout {
        return Err(HasherError::StabilizationTimeout {
          path: path.to_path_buf(),
          waited,
        });
      }
      thread::sleep(self.config.retry_interval);
    }
  }
}
