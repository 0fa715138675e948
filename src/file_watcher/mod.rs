//! Модуль мониторинга файловой системы.
//!
//! Отвечает за:
//! - определение наблюдаемой директории (по умолчанию `Downloads`)
//! - запуск рекурсивного `notify` watcher
//! - единственный воркер, который последовательно прогоняет события через роутер
//! - graceful shutdown

pub mod events;

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::HasherError;
use crate::router::EventRouter;
use crate::stabilizer::SourceOpener;

pub use events::{ChangeEvent, ChangeKind};

/// Имя папки загрузок, если `dirs` её не знает.
pub const DEFAULT_DOWNLOADS_FOLDER_NAME: &str = "Downloads";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Handle запущенного watcher'а.
#[derive(Debug)]
pub struct WatcherHandle {
  stop_tx: mpsc::Sender<()>,
  join: Option<thread::JoinHandle<()>>,
  watch_dir: PathBuf,
}

impl WatcherHandle {
  pub fn watch_dir(&self) -> &Path {
    &self.watch_dir
  }

  /// Остановить воркер и дождаться его завершения.
  ///
  /// Если воркер сейчас ждёт стабилизации файла, остановка наступит после неё.
  pub fn stop(mut self) -> Result<(), HasherError> {
    let _ = self.stop_tx.send(());
    if let Some(join) = self.join.take() {
      let _ = join.join();
    }
    Ok(())
  }
}

/// Определить директорию наблюдения.
///
/// `override_path` должен быть абсолютным; директория создаётся при отсутствии.
/// Без него используется папка загрузок пользователя.
pub fn resolve_watch_dir(override_path: Option<&Path>) -> Result<PathBuf, HasherError> {
  match override_path {
    Some(p) => ensure_override_dir(p),
    None => default_downloads_dir(),
  }
}

fn default_downloads_dir() -> Result<PathBuf, HasherError> {
  dirs::download_dir()
    .or_else(|| dirs::home_dir().map(|home| home.join(DEFAULT_DOWNLOADS_FOLDER_NAME)))
    .ok_or(HasherError::DownloadsDirNotFound)
}

fn ensure_override_dir(override_path: &Path) -> Result<PathBuf, HasherError> {
  if override_path.as_os_str().is_empty() {
    return Err(HasherError::InvalidPath("empty watch_dir".to_string()));
  }
  if !override_path.is_absolute() {
    return Err(HasherError::InvalidPath(format!(
      "watch_dir must be absolute: {}",
      override_path.display()
    )));
  }
  std::fs::create_dir_all(override_path)?;
  Ok(override_path.to_path_buf())
}

/// Запустить watcher.
///
/// `router` переезжает в поток воркера: события обрабатываются строго
/// по одному, состояние debounce никто больше не трогает.
pub fn start_watcher<O>(
  watch_dir: PathBuf,
  router: EventRouter<O>,
) -> Result<WatcherHandle, HasherError>
where
  O: SourceOpener + 'static,
{
  info!("Starting watcher for: {}", watch_dir.display());

  let (stop_tx, stop_rx) = mpsc::channel::<()>();
  let (event_tx, event_rx) = mpsc::channel::<Result<notify::Event, notify::Error>>();

  let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
    // best-effort send; если receiver уже закрыт — просто игнорируем.
    let _ = event_tx.send(res);
  })?;
  watcher.watch(&watch_dir, RecursiveMode::Recursive)?;

  let join = thread::spawn(move || {
    // watcher живёт, пока жив воркер.
    let _watcher = watcher;
    let mut router = router;

    loop {
      // 1) graceful shutdown
      if stop_rx.try_recv().is_ok() {
        info!("Watcher shutdown requested");
        break;
      }

      // 2) обработка событий notify
      match event_rx.recv_timeout(POLL_INTERVAL) {
        Ok(Ok(event)) => {
          debug!("notify event: {:?}", event.kind);
          for change in events::from_notify(&event) {
            router.route(change);
          }
        }
        Ok(Err(err)) => {
          warn!("notify error: {err}");
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
          // тик
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
          warn!("notify channel disconnected");
          break;
        }
      }
    }

    info!("Watcher thread finished");
  });

  Ok(WatcherHandle {
    stop_tx,
    join: Some(join),
    watch_dir,
  })
}
