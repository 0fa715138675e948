//! Интеграционные тесты для file_watcher.
//!
//! Настоящий `notify` watcher над временными директориями: файл "докачивается"
//! в соседней директории и переименовывается в наблюдаемую, как это делают браузеры.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use download_hasher::file_watcher::{resolve_watch_dir, start_watcher, WatcherHandle};
use download_hasher::log_appender::LogAppender;
use download_hasher::notifier::{NotificationToggle, Notifier};
use download_hasher::router::EventRouter;
use download_hasher::stabilizer::{FileStabilizer, StabilizerConfig};

const ABC_MD5: &str = "900150983cd24fb0d6963f7d28e17f72";
const ABC_SHA1: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";

/// Собирает уведомления для проверки.
#[derive(Default)]
struct CollectingNotifier {
    shown: Mutex<Vec<(String, String)>>,
}

impl CollectingNotifier {
    fn titles(&self) -> Vec<String> {
        self.shown
            .lock()
            .unwrap()
            .iter()
            .map(|(title, _)| title.clone())
            .collect()
    }
}

impl Notifier for CollectingNotifier {
    fn show(&self, title: &str, body: &str) {
        self.shown
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }
}

struct Fixture {
    watched: TempDir,
    staging: TempDir,
    docs: TempDir,
    notifier: Arc<CollectingNotifier>,
    handle: Option<WatcherHandle>,
}

impl Fixture {
    fn start() -> Self {
        let watched = TempDir::new().expect("Failed to create watched dir");
        let staging = TempDir::new().expect("Failed to create staging dir");
        let docs = TempDir::new().expect("Failed to create docs dir");
        let notifier = Arc::new(CollectingNotifier::default());

        let config = StabilizerConfig {
            retry_interval: Duration::from_millis(20),
            stabilization_timeout: Duration::from_millis(1000),
            ..StabilizerConfig::default()
        };
        let router = EventRouter::new(
            FileStabilizer::new(config),
            Arc::new(LogAppender::new(docs.path().join(".file_hashes.txt"))),
            notifier.clone(),
            NotificationToggle::new(true),
        );
        let handle = start_watcher(watched.path().to_path_buf(), router)
            .expect("Failed to start watcher");

        // Даём watcher'у время на запуск
        thread::sleep(Duration::from_millis(200));

        Self {
            watched,
            staging,
            docs,
            notifier,
            handle: Some(handle),
        }
    }

    fn log_path(&self) -> PathBuf {
        self.docs.path().join(".file_hashes.txt")
    }

    fn log_content(&self) -> String {
        fs::read_to_string(self.log_path()).unwrap_or_default()
    }

    /// "Докачать" файл и переместить его в наблюдаемую директорию.
    fn deliver(&self, relative: &str, data: &[u8]) -> PathBuf {
        let staged = self.staging.path().join(relative.replace('/', "_"));
        fs::write(&staged, data).expect("Failed to write staged file");
        let target = self.watched.path().join(relative);
        fs::rename(&staged, &target).expect("Failed to move file into place");
        target
    }

    fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop().expect("Failed to stop watcher");
        }
    }
}

/// Ждать, пока журнал не начнёт содержать `needle`.
fn wait_for_log(fixture: &Fixture, needle: &str, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if fixture.log_content().contains(needle) {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}

// ============================================================================
// Тесты базовой функциональности
// ============================================================================

#[test]
fn test_watcher_starts_and_stops_successfully() {
    let fixture = Fixture::start();
    assert_eq!(
        fixture.handle.as_ref().unwrap().watch_dir(),
        fixture.watched.path()
    );
    fixture.stop();
}

#[test]
fn test_delivered_file_is_hashed_and_logged() {
    let fixture = Fixture::start();

    let target = fixture.deliver("setup.iso", b"abc");

    let found = wait_for_log(&fixture, "setup.iso", Duration::from_secs(5));
    assert!(found, "Watcher did not log the delivered file within timeout");

    let log = fixture.log_content();
    assert!(log.contains(&format!("  --  {}", target.display())));
    assert!(log.contains(&format!("MD5:        {ABC_MD5}")));
    assert!(log.contains(&format!("SHA1:       {ABC_SHA1}")));
    assert!(fixture
        .notifier
        .titles()
        .contains(&target.display().to_string()));

    fixture.stop();
}

// Нужен сигнал "писатель закончил": Close(Write) в inotify или отказ
// в открытии на Windows.
#[cfg(any(target_os = "linux", target_os = "windows"))]
#[test]
fn test_file_written_in_place_is_hashed_when_complete() {
    use std::io::Write;

    let fixture = Fixture::start();
    let target = fixture.watched.path().join("slow.bin");

    {
        let mut file = fs::File::create(&target).expect("Failed to create file");
        file.write_all(b"a").unwrap();
        file.flush().unwrap();
        thread::sleep(Duration::from_millis(700));
        file.write_all(b"bc").unwrap();
    }

    let found = wait_for_log(&fixture, ABC_MD5, Duration::from_secs(5));
    assert!(found, "Final contents were not hashed:\n{}", fixture.log_content());
    assert!(
        !fixture.log_content().contains("0cc175b9c0f1b6a831c399e269772661"),
        "Partial contents must not be logged"
    );

    fixture.stop();
}

#[test]
fn test_newest_entry_comes_first() {
    let fixture = Fixture::start();

    fixture.deliver("first.bin", b"abc");
    assert!(wait_for_log(&fixture, "first.bin", Duration::from_secs(5)));
    fixture.deliver("second.bin", b"abc");
    assert!(wait_for_log(&fixture, "second.bin", Duration::from_secs(5)));

    let log = fixture.log_content();
    let first = log.find("first.bin").unwrap();
    let second = log.find("second.bin").unwrap();
    assert!(second < first, "Newest entry must be at the top:\n{log}");

    fixture.stop();
}

#[test]
fn test_files_in_subdirectories_are_hashed() {
    let fixture = Fixture::start();

    fs::create_dir(fixture.watched.path().join("nested")).expect("Failed to create subdir");
    thread::sleep(Duration::from_millis(300));
    fixture.deliver("nested/inner.zip", b"abc");

    assert!(wait_for_log(&fixture, "inner.zip", Duration::from_secs(5)));
    fixture.stop();
}

// ============================================================================
// Тесты фильтрации
// ============================================================================

#[test]
fn test_partial_downloads_are_ignored() {
    let fixture = Fixture::start();

    fs::write(fixture.watched.path().join("movie.mkv.crdownload"), b"part").unwrap();
    fs::write(fixture.watched.path().join("Installer.TMP"), b"part").unwrap();

    // Ждём немного
    thread::sleep(Duration::from_millis(800));

    assert!(
        !fixture.log_path().exists(),
        "Partial downloads must not be logged, got:\n{}",
        fixture.log_content()
    );
    fixture.stop();
}

#[test]
fn test_watcher_ignores_directories() {
    let fixture = Fixture::start();

    fs::create_dir(fixture.watched.path().join("subdir")).expect("Failed to create subdir");

    // Ждём немного
    thread::sleep(Duration::from_millis(500));

    assert!(!fixture.log_path().exists(), "Directories must not be logged");
    assert!(fixture.notifier.titles().is_empty());
    fixture.stop();
}

// ============================================================================
// Тесты обработки ошибок
// ============================================================================

#[test]
fn test_resolve_rejects_empty_path() {
    let result = resolve_watch_dir(Some(Path::new("")));
    assert!(result.is_err());
    if let Err(err) = result {
        assert!(err.to_string().contains("empty watch_dir"));
    }
}

#[test]
fn test_resolve_rejects_relative_path() {
    let result = resolve_watch_dir(Some(Path::new("relative/path")));
    assert!(result.is_err());
    if let Err(err) = result {
        assert!(err.to_string().contains("must be absolute"));
    }
}

#[test]
fn test_resolve_creates_directory_if_not_exists() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let non_existent = temp_dir
        .path()
        .join("subdir")
        .join("nested")
        .join("watch_dir");

    let resolved = resolve_watch_dir(Some(&non_existent)).expect("Failed to resolve");

    assert!(non_existent.is_dir());
    assert_eq!(resolved, non_existent);
}

// ============================================================================
// Тесты graceful shutdown
// ============================================================================

#[test]
fn test_watcher_stops_cleanly() {
    let fixture = Fixture::start();

    // Останавливаем и проверяем, что это не блокирует навечно
    let start = Instant::now();
    fixture.stop();
    let elapsed = start.elapsed();

    // Graceful shutdown должен завершиться быстро
    assert!(
        elapsed < Duration::from_secs(2),
        "Stop took too long: {:?}",
        elapsed
    );
}
