// Author: Mode Control Entity contributors
// License: MIT

use std::fmt::Arguments;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

use chrono::Local;
use once_cell::sync::Lazy;

const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_KEEP_BACKUPS: u32 = 5;

#[derive(PartialEq, PartialOrd, Clone, Copy, Debug)]
pub enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl Level {
    fn color(self) -> &'static str {
        match self {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[36m",
            Level::Debug => "\x1b[90m",
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Level::Error => "ERR",
            Level::Warn => "WRN",
            Level::Info => "INF",
            Level::Debug => "DBG",
        }
    }
}

const RESET_COLOR: &str = "\x1b[0m";

struct Config {
    level: Level,
    console: bool,
    use_colors: bool,
    file_path: Option<PathBuf>,
}

static GLOBAL: Lazy<Mutex<Config>> = Lazy::new(|| {
    Mutex::new(Config {
        level: Level::Info,
        console: true,
        use_colors: io::stdout().is_terminal(),
        file_path: None,
    })
});

static SESSION_SEPARATOR: Once = Once::new();

pub fn set_level(level: Level) {
    GLOBAL.lock().unwrap().level = level;
}

pub fn set_console_output(enabled: bool) {
    GLOBAL.lock().unwrap().console = enabled;
}

pub struct LogPolicy {
    pub max_bytes: u64,
    pub keep_backups: u32,
}

impl Default for LogPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            keep_backups: DEFAULT_KEEP_BACKUPS,
        }
    }
}

/// Rotates the log file if it has grown past `policy.max_bytes`, then points
/// future writes at `path`. Returns whether the next run header should be
/// preceded by a blank separator line (the file already had content).
pub fn enable_file_output(path: &Path, policy: LogPolicy) -> io::Result<bool> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let needs_blank = match fs::metadata(path) {
        Ok(meta) if meta.len() >= policy.max_bytes => {
            rotate(path, policy.keep_backups)?;
            false
        }
        Ok(meta) => meta.len() > 0,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(e),
    };

    GLOBAL.lock().unwrap().file_path = Some(path.to_path_buf());
    Ok(needs_blank)
}

pub fn run_header() -> String {
    format!(
        "==================== mced run start (pid={}) ====================",
        std::process::id()
    )
}

pub fn write_raw_blank_line(path: &Path) -> io::Result<()> {
    write_raw_line(path, "")
}

pub fn write_raw_line(path: &Path, line: &str) -> io::Result<()> {
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "{line}")?;
    Ok(())
}

fn rotate(path: &Path, keep_backups: u32) -> io::Result<()> {
    if keep_backups == 0 {
        let _ = fs::remove_file(path);
        return Ok(());
    }

    for i in (1..keep_backups).rev() {
        let from = rotated_name(path, i);
        let to = rotated_name(path, i + 1);
        if from.exists() {
            let _ = fs::rename(from, to);
        }
    }

    let _ = fs::rename(path, rotated_name(path, 1));
    Ok(())
}

fn rotated_name(base: &Path, n: u32) -> PathBuf {
    PathBuf::from(format!("{}.{n}", base.display()))
}

trait IsTerminal {
    fn is_terminal(&self) -> bool;
}

impl IsTerminal for io::Stdout {
    fn is_terminal(&self) -> bool {
        unsafe { libc::isatty(libc::STDOUT_FILENO) != 0 }
    }
}

#[doc(hidden)]
pub fn log_message(level: Level, prefix: &str, args: Arguments) {
    let config = GLOBAL.lock().unwrap();

    if level > config.level {
        return;
    }

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    let file_line = format!("[{timestamp}][{}][{prefix}] {args}", level.tag());

    if let Some(path) = &config.file_path {
        if let Err(e) = append_line(path, &file_line) {
            eprintln!("mced: failed to write log: {e}");
        }
    }

    if config.console && (config.level == Level::Debug || level == Level::Error) {
        let line = if config.use_colors {
            format!(
                "{}\u{25cf}{RESET_COLOR} [{timestamp}][{prefix}] {args}",
                level.color()
            )
        } else {
            file_line
        };

        match level {
            Level::Error => eprintln!("{line}"),
            _ => println!("{line}"),
        }
    }
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
    SESSION_SEPARATOR.call_once(|| {
        let _ = write_raw_line(path, &run_header());
    });

    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "{line}")
}

#[macro_export]
macro_rules! mlog {
    ($level:expr, $prefix:expr, $($arg:tt)*) => {
        $crate::log::log_message($level, $prefix, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! minfo {
    ($prefix:expr, $($arg:tt)*) => { $crate::mlog!($crate::log::Level::Info, $prefix, $($arg)*) };
}

#[macro_export]
macro_rules! mwarn {
    ($prefix:expr, $($arg:tt)*) => { $crate::mlog!($crate::log::Level::Warn, $prefix, $($arg)*) };
}

#[macro_export]
macro_rules! merror {
    ($prefix:expr, $($arg:tt)*) => { $crate::mlog!($crate::log::Level::Error, $prefix, $($arg)*) };
}

#[macro_export]
macro_rules! mdebug {
    ($prefix:expr, $($arg:tt)*) => { $crate::mlog!($crate::log::Level::Debug, $prefix, $($arg)*) };
}
