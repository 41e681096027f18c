use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Text returned by [`LogStore::tail`] when the log file does not exist yet
pub const NO_LOGS: &str = "No logs yet.";

/// Number of lines the UI shows in the log panel
pub const DEFAULT_TAIL_LINES: usize = 500;

/// Active file is rotated once it grows past this many bytes
pub const DEFAULT_ROTATE_BYTES: u64 = 10 * 1024 * 1024;

/// How much of the end of the file a tail read looks at
pub const DEFAULT_TAIL_WINDOW_BYTES: u64 = 64 * 1024;

pub const DEFAULT_LOG_FILE: &str = "spaces_app.log";

#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("Log file I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Log writer lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// One line of the log file.
///
/// Serializes as `{"level":..,"message":..,"time":..}` followed by the
/// context keys flattened into the same object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub time: String,
    #[serde(flatten)]
    pub context: Map<String, Value>,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            time: Local::now().to_rfc3339(),
            context: Map::new(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    /// Attach a context key
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogStoreConfig {
    pub path: PathBuf,
    pub rotate_bytes: u64,
    pub tail_window_bytes: u64,
    pub level: LogLevel,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_LOG_FILE),
            rotate_bytes: DEFAULT_ROTATE_BYTES,
            tail_window_bytes: DEFAULT_TAIL_WINDOW_BYTES,
            level: LogLevel::Info,
        }
    }
}

impl LogStoreConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Append-only JSON Lines file with size-based rotation and a bounded tail reader.
///
/// Appends are serialized through an internal lock. Tail reads take no lock
/// and may see a partially written last line, which is returned as-is.
#[derive(Debug)]
pub struct LogStore {
    config: LogStoreConfig,
    write_lock: Mutex<()>,
}

impl LogStore {
    /// Create a store for the configured path. The file itself is created on
    /// the first append.
    pub fn open(config: LogStoreConfig) -> Result<Self, LogStoreError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        debug!("Log store at {}", config.path.display());

        Ok(Self {
            config,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn config(&self) -> &LogStoreConfig {
        &self.config
    }

    /// Write one record as a line, rotating the active file first if this
    /// line would take it past the size threshold.
    pub fn append(&self, record: &LogRecord) -> Result<(), LogStoreError> {
        if record.level < self.config.level {
            return Ok(());
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().map_err(|_| LogStoreError::Poisoned)?;

        let current_size = match fs::metadata(&self.config.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        if current_size > 0 && current_size + line.len() as u64 > self.config.rotate_bytes {
            self.rotate()?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Append and report failures through tracing instead of returning them
    pub fn emit(&self, record: LogRecord) {
        if let Err(e) = self.append(&record) {
            warn!("Failed to append '{}' to {}: {}", record.message, self.config.path.display(), e);
        }
    }

    /// Last `max_lines` lines of the active file joined with `\n`.
    ///
    /// Never fails: a missing file yields [`NO_LOGS`] and a read error yields
    /// a diagnostic line describing it.
    pub fn tail(&self, max_lines: usize) -> String {
        match self.read_tail(max_lines) {
            Ok(Some(text)) => text,
            Ok(None) => NO_LOGS.to_string(),
            Err(e) => format!("Error reading log file: {}", e),
        }
    }

    fn read_tail(&self, max_lines: usize) -> io::Result<Option<String>> {
        let mut file = match File::open(&self.config.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let meta = file.metadata()?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", self.config.path.display()),
            ));
        }

        let size = meta.len();
        let window = self.config.tail_window_bytes;
        let start = size.saturating_sub(window);

        // Read one byte before the window so we can tell whether the first
        // line in it is whole.
        let read_from = start.saturating_sub(1);
        file.seek(SeekFrom::Start(read_from))?;
        let mut buf = Vec::with_capacity((size - read_from) as usize);
        file.take(size - read_from).read_to_end(&mut buf)?;

        let skip = ((start - read_from) as usize).min(buf.len());
        let window_bytes = &buf[skip..];
        let body = if start > 0 {
            // Only drop the leading fragment when a later line follows it.
            // A single record longer than the window is returned as the
            // window's trailing bytes.
            let content_end = buf
                .iter()
                .rposition(|b| *b != b'\n' && *b != b'\r')
                .map_or(0, |pos| pos + 1);
            match buf.iter().position(|b| *b == b'\n') {
                Some(pos) if pos + 1 < content_end => &buf[pos + 1..],
                _ => window_bytes,
            }
        } else {
            window_bytes
        };

        let data = String::from_utf8_lossy(body);
        let lines: Vec<&str> = data.trim().lines().collect();
        let skip = lines.len().saturating_sub(max_lines);
        Ok(Some(lines[skip..].join("\n")))
    }

    fn rotate(&self) -> io::Result<()> {
        let rotated = self.rotated_path();
        fs::rename(&self.config.path, &rotated)?;
        info!("Rotated {} to {}", self.config.path.display(), rotated.display());
        Ok(())
    }

    /// `dir/stem.2024-01-01_12-00-00_000000.ext`
    fn rotated_path(&self) -> PathBuf {
        let path = &self.config.path;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());
        let ext = path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "log".to_string());
        let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S_%6f").to_string();

        let mut candidate = path.with_file_name(format!("{}.{}.{}", stem, stamp, ext));
        let mut n = 1;
        while candidate.exists() {
            candidate = path.with_file_name(format!("{}.{}-{}.{}", stem, stamp, n, ext));
            n += 1;
        }
        candidate
    }
}
