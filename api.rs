//! Управляющая поверхность для оболочки (tray/консоль).
//!
//! Тонкий слой: запуск/остановка наблюдения и команды меню
//! ("Open Log", "Toggle Notifications", "Exit"). Вся логика — в `src/*` модулях.
//!
//! Контракт: одна активная сессия на процесс. Повторный старт без остановки
//! возвращает [`HasherError::WatcherAlreadyRunning`].

use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::config::HasherConfig;
use crate::error::HasherError;
use crate::file_watcher;
use crate::logging;
use crate::notifier::{self, NotificationToggle, Notifier};
use crate::router::EventRouter;
use log::{debug, info};

/// Запущенная сессия наблюдения.
struct Session {
    watcher: file_watcher::WatcherHandle,
    log_file: PathBuf,
    notifications: NotificationToggle,
}

static SESSION: Lazy<Mutex<Option<Session>>> = Lazy::new(|| Mutex::new(None));

/// Инициализация логирования.
pub fn init_logging() {
    logging::init_logging();
}

/// Запуск наблюдения.
///
/// Возвращает фактический путь директории наблюдения (для отображения в UI).
pub fn start_watching(
    config: &HasherConfig,
    notifier: Arc<dyn Notifier>,
) -> Result<String, HasherError> {
    logging::init_logging();

    // Примечание: recover from poisoned mutex - если предыдущий поток паниковал,
    // мы всё равно можем безопасно продолжить работу.
    let mut guard = SESSION
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if guard.is_some() {
        return Err(HasherError::WatcherAlreadyRunning);
    }

    let watch_dir = file_watcher::resolve_watch_dir(config.watch_dir.as_deref())?;
    let router = EventRouter::from_config(config, notifier)?;
    let log_file = router.log_path().to_path_buf();
    let notifications = router.notifications().clone();
    info!("Hash log: {}", log_file.display());

    let watcher = file_watcher::start_watcher(watch_dir, router)?;
    let watch_dir = watcher.watch_dir().to_string_lossy().to_string();
    *guard = Some(Session {
        watcher,
        log_file,
        notifications,
    });
    Ok(watch_dir)
}

/// Остановить мониторинг (graceful shutdown). Без активной сессии — no-op.
pub fn stop_watching() -> Result<(), HasherError> {
    // Сначала вынимаем сессию, чтобы не держать мьютекс во время join.
    let session = SESSION
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .take();

    match session {
        Some(s) => s.watcher.stop(),
        None => {
            debug!("stop_watching called without an active session");
            Ok(())
        }
    }
}

/// Переключить показ уведомлений. Возвращает новое состояние.
pub fn toggle_notifications() -> Result<bool, HasherError> {
    let guard = SESSION
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let session = guard.as_ref().ok_or(HasherError::WatcherNotRunning)?;
    let enabled = session.notifications.toggle();
    info!("Notifications {}", if enabled { "enabled" } else { "disabled" });
    Ok(enabled)
}

/// Открыть журнал хешей приложением по умолчанию.
///
/// Если журнала ещё нет, ничего не делает.
pub fn open_log() -> Result<(), HasherError> {
    let log_file = {
        let guard = SESSION
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard
            .as_ref()
            .ok_or(HasherError::WatcherNotRunning)?
            .log_file
            .clone()
    };

    if !log_file.exists() {
        debug!("Hash log {} does not exist yet", log_file.display());
        return Ok(());
    }
    notifier::open_in_default_app(&log_file)?;
    Ok(())
}
