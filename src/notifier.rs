//! Коллаборатор уведомлений (tray/UI).
//!
//! Ядро только передаёт пары `(title, body)`; как их показать, решает
//! реализация [`Notifier`].

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;

/// Получатель уведомлений "файл захеширован" и предупреждений.
pub trait Notifier: Send + Sync {
    fn show(&self, title: &str, body: &str);
}

/// Уведомления в лог. Используется, когда нет графической оболочки.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, title: &str, body: &str) {
        info!(target: "download_hasher::notification", "{title}\n{body}");
    }
}

/// Переключатель показа уведомлений, общий для воркера и UI.
#[derive(Debug, Clone)]
pub struct NotificationToggle(Arc<AtomicBool>);

impl NotificationToggle {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }

    /// Инвертировать и вернуть новое состояние.
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::Relaxed)
    }
}

impl Default for NotificationToggle {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Открыть файл приложением по умолчанию.
pub fn open_in_default_app(path: &Path) -> io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(path).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .arg("/C")
            .arg("start")
            .arg("")
            .arg(path)
            .spawn()?;
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        std::process::Command::new("xdg-open").arg(path).spawn()?;
    }
    Ok(())
}
