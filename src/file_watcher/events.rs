//! Внутренние типы событий file_watcher.
//!
//! `notify` отдаёт свои `Event` с набором путей; здесь они раскладываются
//! в плоские [`ChangeEvent`], с которыми работает стабилизатор.

use std::path::PathBuf;
use std::time::Instant;

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind};

/// Вид изменения. Хешируются только `Created` и `Modified`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
    Renamed,
    Other,
}

/// Сырое событие изменения файла.
#[derive(Clone, Debug)]
pub struct ChangeEvent {
    /// Абсолютный путь к файлу.
    pub path: PathBuf,
    pub kind: ChangeKind,
    /// Момент получения события (монотонные часы, для debounce).
    pub timestamp: Instant,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self::at(path, kind, Instant::now())
    }

    pub fn at(path: impl Into<PathBuf>, kind: ChangeKind, timestamp: Instant) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp,
        }
    }
}

/// Разложить событие `notify` на [`ChangeEvent`] по одному на путь.
///
/// Переименование "в" наблюдаемое дерево считается созданием файла:
/// браузеры докачивают в `.crdownload` и затем переименовывают результат.
pub fn from_notify(event: &Event) -> Vec<ChangeEvent> {
    let now = Instant::now();

    match &event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .last()
            .map(|p| ChangeEvent::at(p.clone(), ChangeKind::Created, now))
            .into_iter()
            .collect(),
        kind => {
            let change_kind = classify(kind);
            event
                .paths
                .iter()
                .map(|p| ChangeEvent::at(p.clone(), change_kind, now))
                .collect()
        }
    }
}

/// Платформы, где открытие на чтение не ждёт писателя, зато есть
/// событие "файл закрыт после записи" (inotify).
const CLOSE_WRITE_IS_DONE_SIGNAL: bool = cfg!(any(target_os = "linux", target_os = "android"));

fn classify(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Renamed,
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => ChangeKind::Modified,
        // Файл ещё пишется: хешировать рано, дождёмся Close(Write).
        EventKind::Create(_) | EventKind::Modify(_) if CLOSE_WRITE_IS_DONE_SIGNAL => ChangeKind::Other,
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Removed,
        EventKind::Access(_) | EventKind::Other | EventKind::Any => ChangeKind::Other,
    }
}
