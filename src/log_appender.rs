//! Журнал хешей.
//!
//! Новые записи добавляются в начало файла. Обновление crash-safe: новая
//! запись и старое содержимое собираются во временном файле рядом с журналом,
//! и только последним шагом временный файл атомарно переименовывается поверх
//! журнала. Любой сбой до этого шага оставляет журнал нетронутым.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Local};
use log::{debug, warn};
use tempfile::NamedTempFile;

use crate::error::HasherError;
use crate::hashing::HashResult;

/// Размер блока копирования старого журнала (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

#[cfg(target_os = "windows")]
pub const LINE_ENDING: &str = "\r\n";
#[cfg(not(target_os = "windows"))]
pub const LINE_ENDING: &str = "\n";

/// `Thursday 03/14/2013 03:09:26:053 PM`
const TIMESTAMP_FORMAT: &str = "%A %m/%d/%Y %I:%M:%S:%3f %p";
const LABEL_WIDTH: usize = 12;
const STAGING_PREFIX: &str = ".hash-log-";
const STAGING_SUFFIX: &str = ".tmp";

/// Запись журнала. После создания не меняется.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
  pub timestamp: DateTime<Local>,
  pub path: PathBuf,
  pub hashes: Vec<HashResult>,
}

impl LogEntry {
  /// Запись с текущим локальным временем.
  pub fn new(path: impl Into<PathBuf>, hashes: Vec<HashResult>) -> Self {
    Self {
      timestamp: Local::now(),
      path: path.into(),
      hashes,
    }
  }

  /// Текст записи: заголовок, по строке на алгоритм, пустая строка.
  pub fn render(&self) -> String {
    let mut out = format!(
      "{}  --  {}{LINE_ENDING}",
      self.timestamp.format(TIMESTAMP_FORMAT),
      self.path.display()
    );
    for hash in &self.hashes {
      let label = format!("{}:", hash.algorithm.label());
      out.push_str(&format!(
        "{:<width$}{}{LINE_ENDING}",
        label,
        hash.hex_digest,
        width = LABEL_WIDTH
      ));
    }
    out.push_str(LINE_ENDING);
    out
  }

  /// Тело уведомления: `LABEL: digest` построчно.
  pub fn notification_body(&self) -> String {
    self
      .hashes
      .iter()
      .map(|h| format!("{}: {}", h.algorithm.label(), h.hex_digest))
      .collect::<Vec<_>>()
      .join("\n")
  }
}

/// Добавляет записи в начало журнала.
#[derive(Debug)]
pub struct LogAppender {
  path: PathBuf,
  chunk_size: usize,
  write_guard: Mutex<()>,
}

impl LogAppender {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      chunk_size: DEFAULT_CHUNK_SIZE,
      write_guard: Mutex::new(()),
    }
  }

  pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
    self.chunk_size = chunk_size.max(1);
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Добавить запись в начало журнала.
  ///
  /// Внутри процесса вызовы сериализуются мьютексом, между процессами —
  /// advisory-блокировкой на `<журнал>.lock`.
  pub fn append(&self, entry: &LogEntry) -> Result<(), HasherError> {
    let _guard = self
      .write_guard
      .lock()
      .unwrap_or_else(PoisonError::into_inner);

    self
      .append_locked(entry)
      .map_err(|source| HasherError::LogWrite {
        path: self.path.clone(),
        source,
      })
  }

  fn append_locked(&self, entry: &LogEntry) -> io::Result<()> {
    // Каталог нужен уже для lock-файла.
    fs::create_dir_all(self.log_dir())?;
    let mut lock = fd_lock::RwLock::new(self.open_lock_file()?);
    let _cross_process = lock.write()?;

    let staged = self.stage(entry)?;
    staged.persist(&self.path).map_err(|err| err.error)?;

    if let Err(err) = hide_file(&self.path) {
      warn!("Cannot hide hash log {}: {err}", self.path.display());
    }
    debug!("Hash log updated: {}", self.path.display());
    Ok(())
  }

  /// Собрать новое содержимое журнала во временном файле.
  ///
  /// Журнал не меняется; временный файл удаляется при drop, если его
  /// не переименовали.
  fn stage(&self, entry: &LogEntry) -> io::Result<NamedTempFile> {
    let dir = self.log_dir();
    let mut staged = tempfile::Builder::new()
      .prefix(STAGING_PREFIX)
      .suffix(STAGING_SUFFIX)
      .tempfile_in(dir)?;

    staged.write_all(entry.render().as_bytes())?;
    clear_readonly(&self.path)?;
    let copied = self.copy_existing_into(staged.as_file_mut())?;
    // tempfile создаёт файл с правами 0600; rename не должен их менять.
    if let Some(permissions) = existing_permissions(&self.path)? {
      staged.as_file().set_permissions(permissions)?;
    }
    staged.as_file().sync_all()?;

    debug!("Staged hash log entry with {copied} bytes of history");
    Ok(staged)
  }

  /// Дописать старый журнал блоками по `chunk_size`. Отсутствующий журнал — пустой.
  fn copy_existing_into(&self, dest: &mut File) -> io::Result<u64> {
    let mut source = match File::open(&self.path) {
      Ok(file) => file,
      Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
      Err(err) => return Err(err),
    };

    let len = source.metadata()?.len();
    let buf_size = usize::try_from(len)
      .unwrap_or(usize::MAX)
      .clamp(1, self.chunk_size);
    let mut buf = vec![0u8; buf_size];
    let mut copied = 0u64;

    loop {
      let n = match source.read(&mut buf) {
        Ok(0) => break,
        Ok(n) => n,
        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
        Err(err) => return Err(err),
      };
      dest.write_all(&buf[..n])?;
      copied += n as u64;
    }

    Ok(copied)
  }

  /// Временный файл должен лежать на том же томе, иначе rename не атомарен.
  fn log_dir(&self) -> &Path {
    self
      .path
      .parent()
      .filter(|p| !p.as_os_str().is_empty())
      .unwrap_or_else(|| Path::new("."))
  }

  fn open_lock_file(&self) -> io::Result<File> {
    let mut name = self
      .path
      .file_name()
      .map(|n| n.to_os_string())
      .unwrap_or_default();
    name.push(".lock");

    OpenOptions::new()
      .create(true)
      .truncate(false)
      .write(true)
      .open(self.path.with_file_name(name))
  }
}

fn existing_permissions(path: &Path) -> io::Result<Option<fs::Permissions>> {
  match fs::metadata(path) {
    Ok(m) => Ok(Some(m.permissions())),
    Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(err) => Err(err),
  }
}

fn clear_readonly(path: &Path) -> io::Result<()> {
  let metadata = match fs::metadata(path) {
    Ok(m) => m,
    Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
    Err(err) => return Err(err),
  };

  let mut permissions = metadata.permissions();
  if !permissions.readonly() {
    return Ok(());
  }

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    permissions.set_mode(permissions.mode() | 0o200);
  }
  #[cfg(not(unix))]
  #[allow(clippy::permissions_set_readonly_false)]
  permissions.set_readonly(false);

  fs::set_permissions(path, permissions)
}

#[cfg(target_os = "windows")]
fn hide_file(path: &Path) -> io::Result<()> {
  use windows::core::HSTRING;
  use windows::Win32::Storage::FileSystem::{
    GetFileAttributesW, SetFileAttributesW, FILE_ATTRIBUTE_HIDDEN, FILE_FLAGS_AND_ATTRIBUTES,
    INVALID_FILE_ATTRIBUTES,
  };

  let wide = HSTRING::from(path.as_os_str());
  // SAFETY: `wide` — валидная nul-terminated строка на время вызовов.
  let current = unsafe { GetFileAttributesW(&wide) };
  if current == INVALID_FILE_ATTRIBUTES {
    return Err(io::Error::last_os_error());
  }
  unsafe { SetFileAttributesW(&wide, FILE_FLAGS_AND_ATTRIBUTES(current | FILE_ATTRIBUTE_HIDDEN.0)) }
    .map_err(io::Error::from)
}

#[cfg(not(target_os = "windows"))]
fn hide_file(path: &Path) -> io::Result<()> {
  // Вне Windows скрытость определяется ведущей точкой в имени.
  let dotted = path
    .file_name()
    .is_some_and(|name| name.to_string_lossy().starts_with('.'));
  if !dotted {
    debug!("Hash log {} is not a dot-file and stays visible", path.display());
  }
  Ok(())
}
