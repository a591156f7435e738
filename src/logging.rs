//! Logging setup: terminal plus a daily log file
//!
//! Log files live in `literature/logs/litreview-YYYY-MM-DD.log` and are kept
//! for a week. `RUST_LOG` overrides the default filter.

use chrono::{Local, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "litreview=info,litreview_lib=info";
const VERBOSE_FILTER: &str = "litreview=debug,litreview_lib=debug";
const LOG_PREFIX: &str = "litreview-";
const KEEP_DAYS: i64 = 7;

/// Install the global subscriber. Returns today's log file, if one could be opened.
pub fn init_logging(log_dir: &Path, verbose: bool) -> Option<PathBuf> {
    let default_filter = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let log_file = open_log_file(log_dir);

    let file_layer = log_file
        .as_ref()
        .and_then(|(_, file)| file.try_clone().ok())
        .map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init();

    log_file.map(|(path, _)| path)
}

fn open_log_file(log_dir: &Path) -> Option<(PathBuf, File)> {
    if fs::create_dir_all(log_dir).is_err() {
        return None;
    }

    let today = Local::now().date_naive();
    clean_old_logs(log_dir, today);

    let log_path = log_dir.join(log_file_name(today));
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok()
        .map(|file| (log_path, file))
}

fn log_file_name(date: NaiveDate) -> String {
    format!("{}{}.log", LOG_PREFIX, date.format("%Y-%m-%d"))
}

/// Remove log files older than a week. Returns how many were removed.
fn clean_old_logs(log_dir: &Path, today: NaiveDate) -> usize {
    let Ok(entries) = fs::read_dir(log_dir) else {
        return 0;
    };

    let cutoff = today - chrono::Duration::days(KEEP_DAYS);
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let date = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(LOG_PREFIX))
            .and_then(|n| n.strip_suffix(".log"))
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        if let Some(date) = date {
            if date < cutoff && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
        assert_eq!(log_file_name(date), "litreview-2024-01-09.log");
    }

    #[test]
    fn test_clean_old_logs_keeps_recent_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        for name in [
            "litreview-2024-03-01.log",
            "litreview-2024-03-13.log",
            "litreview-2024-03-19.log",
            "other-2024-01-01.log",
            "litreview-notadate.log",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }

        assert_eq!(clean_old_logs(dir.path(), today), 1);
        assert!(!dir.path().join("litreview-2024-03-01.log").exists());
        assert!(dir.path().join("litreview-2024-03-19.log").exists());
        assert!(dir.path().join("other-2024-01-01.log").exists());
    }

    #[test]
    fn test_open_log_file_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (path, _file) = open_log_file(&dir.path().join("logs")).unwrap();
        assert!(path.exists());
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with(LOG_PREFIX));
    }
}
