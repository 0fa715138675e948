//! Download Hasher Core
//!
//! Следит за папкой загрузок, дожидается, пока новый файл будет дописан
//! и освобождён, считает его хеши и добавляет запись в начало скрытого
//! журнала. Отрисовка уведомлений и tray-меню — внешний коллаборатор
//! (см. [`notifier::Notifier`]).

pub mod config;
pub mod error;
pub mod file_watcher;
pub mod hashing;
pub mod log_appender;
pub mod logging;
pub mod notifier;
pub mod router;
pub mod stabilizer;

// Управляющая поверхность лежит в корне `api.rs`, рядом с Cargo.toml.
#[path = "../api.rs"]
pub mod api;

pub use api::*;
