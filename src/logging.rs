//! Нормализованное логирование для Download Hasher.
//!
//! ## Уровни логов
//! - `ERROR`: событие не удалось обработать по внутренней причине
//! - `WARN`:  файл не стабилизировался, журнал не обновился, ошибки notify
//! - `INFO`:  старт/стоп watcher'а, записи в журнал хешей
//! - `DEBUG`: отброшенные события, детали обновления журнала
//! - `TRACE`: каждая попытка открыть файл
//!
//! ## Корреляция событий
//! Обработка одного события помечается `correlation_id` из [`LogContext`],
//! чтобы связать строки стабилизации, записи в журнал и уведомления.
//!
//! ## Использование
//! ```ignore
//! use download_hasher::logging::{init_logging, LogContext};
//!
//! init_logging(); // вызывается один раз при старте
//!
//! let ctx = LogContext::with_operation("route");
//! log::info!(target: "download_hasher::router", "[{ctx}] File hashed");
//! ```

use std::fmt;
use std::sync::Once;

use log::{Level, LevelFilter};
use std::io::Write;

static INIT: Once = Once::new();

/// Инициализировать логирование (idempotent).
///
/// Управление уровнем логов: переменная окружения `RUST_LOG`.
/// Примеры:
/// - `RUST_LOG=info` — только INFO и выше
/// - `RUST_LOG=download_hasher=debug` — DEBUG для нашего crate
/// - `RUST_LOG=trace` — максимально детальный вывод
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_module("download_hasher", LevelFilter::Info)
            .filter_module("notify", LevelFilter::Warn)
            .parse_env("RUST_LOG")
            .format(|buf, record| {
                let level = match record.level() {
                    Level::Error => "E",
                    Level::Warn => "W",
                    Level::Info => "I",
                    Level::Debug => "D",
                    Level::Trace => "T",
                };

                // Формат: [timestamp] [LEVEL] [target] message
                writeln!(
                    buf,
                    "[{}] [{}] [{}] {}",
                    chrono::Local::now().format("%H:%M:%S%.3f"),
                    level,
                    record.target(),
                    record.args()
                )
            })
            .try_init();
    });
}

/// Контекст логирования с корреляционным ID.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Уникальный идентификатор для корреляции событий.
    pub correlation_id: String,
    /// Опциональный контекст операции.
    pub operation: Option<String>,
}

impl LogContext {
    pub fn with_operation(operation: impl Into<String>) -> Self {
        Self {
            correlation_id: generate_correlation_id(),
            operation: Some(operation.into()),
        }
    }
}

/// `corr_..` или `corr_../operation` — префикс строк лога.
impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operation {
            Some(op) => write!(f, "{}/{}", self.correlation_id, op),
            None => f.write_str(&self.correlation_id),
        }
    }
}

/// Формат: `corr_<timestamp_ms>_<counter>`
fn generate_correlation_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let timestamp = chrono::Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("corr_{}_{}", timestamp, counter % 10000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_display_includes_operation() {
        let ctx = LogContext::with_operation("route");
        assert_eq!(ctx.to_string(), format!("{}/route", ctx.correlation_id));

        let bare = LogContext {
            operation: None,
            ..ctx.clone()
        };
        assert_eq!(bare.to_string(), ctx.correlation_id);
    }

    #[test]
    fn test_log_context_with_operation() {
        let ctx = LogContext::with_operation("route");
        assert!(ctx.correlation_id.starts_with("corr_"));
        assert_eq!(ctx.operation, Some("route".to_string()));
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        let ctx1 = LogContext::with_operation("route");
        let ctx2 = LogContext::with_operation("route");
        assert_ne!(ctx1.correlation_id, ctx2.correlation_id);
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
