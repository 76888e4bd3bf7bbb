//! Session logger: a `log` backend that writes to a single file in the OS
//! data directory.
//!
//! The file is **truncated (overwritten) at each launch**, so it only ever
//! contains output from the most-recent session.
//!
//! Log location:
//!   Windows:  `%APPDATA%\Backdrop\backdrop.log`
//!   Linux:    `~/.local/share/Backdrop/backdrop.log`
//!   macOS:    `~/Library/Application Support/Backdrop/backdrop.log`
//!
//! Warnings and errors are mirrored to stderr. `BACKDROP_LOG` picks the level
//! (`error`, `warn`, `info`, `debug`, `trace`); the default is `info`.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{Level, LevelFilter, Log, Metadata, Record};

static LOGGER: OnceLock<SessionLogger> = OnceLock::new();

struct SessionLogger {
    file: Option<Mutex<File>>,
    path: PathBuf,
    level: LevelFilter,
    /// Mirror warnings and errors to stderr.
    echo: bool,
}

impl SessionLogger {
    fn write_line(&self, line: &str) {
        if let Some(mutex) = &self.file
            && let Ok(mut file) = mutex.lock()
        {
            let _ = writeln!(file, "{}", line);
        }
    }
}

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(&timestamp(), record.level(), &record.args().to_string());
        self.write_line(&line);
        if self.echo && record.level() <= Level::Warn {
            eprintln!("{}", line);
        }
    }

    fn flush(&self) {
        if let Some(mutex) = &self.file
            && let Ok(mut file) = mutex.lock()
        {
            let _ = file.flush();
        }
    }
}

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static Path> {
    LOGGER.get().map(|l| l.path.as_path())
}

/// Initialise the session logger with the level from `BACKDROP_LOG`.
pub fn init() {
    let level = std::env::var("BACKDROP_LOG")
        .ok()
        .and_then(|v| parse_level(&v))
        .unwrap_or(LevelFilter::Info);
    init_with_level(level, true);
}

/// Initialise the session logger.  Only the first call has any effect.
///
/// * Creates (or truncates) the log file.
/// * Installs a panic hook that writes the panic message to the log before
///   propagating to the default handler.
pub fn init_with_level(level: LevelFilter, echo: bool) {
    if LOGGER.get().is_some() {
        return;
    }
    let path = log_file_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    // Open file, truncating any previous session's content
    let file = match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
    {
        Ok(f) => Some(Mutex::new(f)),
        Err(e) => {
            // Not fatal: keep logging to stderr only
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            None
        }
    };

    let logger = LOGGER.get_or_init(|| SessionLogger {
        file,
        path,
        level,
        echo,
    });
    if log::set_logger(logger).is_err() {
        return;
    }
    log::set_max_level(level);

    logger.write_line(&format!(
        "=== Backdrop session started {} ===",
        human_timestamp()
    ));
    logger.write_line(&format!("Log file: {}", logger.path.display()));
    logger.write_line("");

    // Panic hook mirrors panic info to the log, then runs the default handler
    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(l) = LOGGER.get() {
            l.write_line(&format!("[{}] [PANIC] {}", timestamp(), info));
        }
        prev(info);
    }));
}

fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

fn format_line(ts: &str, level: Level, msg: &str) -> String {
    format!("[{}] [{}] {}", ts, level, msg)
}

fn log_file_path() -> PathBuf {
    data_dir().join("Backdrop").join("backdrop.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    // Linux / fallback
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

/// HH:MM:SS (UTC) within the current day.
fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => {
            let secs = d.as_secs();
            let h = (secs % 86400) / 3600;
            let m = (secs % 3600) / 60;
            let s = secs % 60;
            format!("{:02}:{:02}:{:02}", h, m, s)
        }
        Err(_) => "??:??:??".to_string(),
    }
}

fn human_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format!("(unix {})", d.as_secs()),
        Err(_) => "(unknown time)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level("DEBUG"), Some(LevelFilter::Debug));
        assert_eq!(parse_level(" warning "), Some(LevelFilter::Warn));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn lines_carry_time_and_level() {
        assert_eq!(
            format_line("12:00:01", Level::Warn, "[AI] slow"),
            "[12:00:01] [WARN] [AI] slow"
        );
    }

    #[test]
    fn timestamp_is_clock_shaped() {
        let ts = timestamp();
        assert_eq!(ts.len(), 8);
        assert_eq!(ts.matches(':').count(), 2);
    }
}
