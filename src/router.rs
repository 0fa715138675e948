//! Маршрутизация: стабилизатор -> журнал -> уведомление.

use std::sync::Arc;

use log::{error, info};

use crate::config::HasherConfig;
use crate::error::HasherError;
use crate::file_watcher::events::ChangeEvent;
use crate::log_appender::{LogAppender, LogEntry};
use crate::logging::LogContext;
use crate::notifier::{NotificationToggle, Notifier};
use crate::stabilizer::{FileStabilizer, FsOpener, SourceOpener, StabilizerConfig};

const LOG_FAILURE_TITLE: &str = "Download Hasher";

/// Связывает поток событий с хешированием, журналом и уведомлениями.
///
/// Владеет состоянием debounce (через стабилизатор), поэтому должен
/// принадлежать одному воркеру.
pub struct EventRouter<O: SourceOpener = FsOpener> {
  stabilizer: FileStabilizer<O>,
  appender: Arc<LogAppender>,
  notifier: Arc<dyn Notifier>,
  notifications: NotificationToggle,
}

impl EventRouter<FsOpener> {
  /// Собрать рабочий конвейер по конфигу.
  pub fn from_config(
    config: &HasherConfig,
    notifier: Arc<dyn Notifier>,
  ) -> Result<Self, HasherError> {
    let appender = LogAppender::new(config.log_file_path()?).with_chunk_size(config.copy_chunk_size);
    Ok(Self::new(
      FileStabilizer::new(StabilizerConfig::from(config)),
      Arc::new(appender),
      notifier,
      NotificationToggle::new(config.notifications_enabled),
    ))
  }
}

impl<O: SourceOpener> EventRouter<O> {
  pub fn new(
    stabilizer: FileStabilizer<O>,
    appender: Arc<LogAppender>,
    notifier: Arc<dyn Notifier>,
    notifications: NotificationToggle,
  ) -> Self {
    Self {
      stabilizer,
      appender,
      notifier,
      notifications,
    }
  }

  pub fn notifications(&self) -> &NotificationToggle {
    &self.notifications
  }

  pub fn log_path(&self) -> &std::path::Path {
    self.appender.path()
  }

  /// Обработать одно событие. `Some` — запись попала в журнал.
  ///
  /// Ошибки не выходят наружу: воркер продолжает со следующим событием.
  pub fn route(&mut self, event: ChangeEvent) -> Option<LogEntry> {
    let stabilized = self.stabilizer.on_raw_event(event)?;
    let ctx = LogContext::with_operation("route");
    let entry = LogEntry::new(stabilized.path, stabilized.hashes);

    if let Err(err) = self.appender.append(&entry) {
      error!("[{ctx}] {err}");
      self.notifier.show(
        LOG_FAILURE_TITLE,
        &format!("Hashes for {} were not saved: {err}", entry.path.display()),
      );
      return None;
    }
    info!(
      "[{ctx}] Logged {} hash(es) for {}",
      entry.hashes.len(),
      entry.path.display()
    );

    if self.notifications.is_enabled() {
      self
        .notifier
        .show(&entry.path.display().to_string(), &entry.notification_body());
    }
    Some(entry)
  }
}
