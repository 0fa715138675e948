//! Консольная оболочка Download Hasher.
//!
//! Заменяет tray-меню командами из stdin: `open`, `toggle`, `exit`.
//! EOF на stdin тоже завершает работу.

use std::io::{self, BufRead};
use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info, warn};

use download_hasher::config::HasherConfig;
use download_hasher::error::HasherError;
use download_hasher::notifier::LogNotifier;

fn run() -> Result<(), HasherError> {
    let config = HasherConfig::load_default()?;
    let watch_dir = download_hasher::start_watching(&config, Arc::new(LogNotifier))?;
    info!("Hashing new files in {watch_dir} (commands: open, toggle, exit)");

    for line in io::stdin().lock().lines() {
        match line?.trim() {
            "" => {}
            "open" => {
                if let Err(err) = download_hasher::open_log() {
                    warn!("Cannot open hash log: {err}");
                }
            }
            "toggle" => {
                download_hasher::toggle_notifications()?;
            }
            "exit" | "quit" => break,
            other => warn!("Unknown command: {other}"),
        }
    }

    download_hasher::stop_watching()
}

fn main() -> ExitCode {
    download_hasher::init_logging();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            let _ = download_hasher::stop_watching();
            ExitCode::FAILURE
        }
    }
}
