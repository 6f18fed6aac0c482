use std::fs::File;
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::trace::trace::TraceEvent;

/// Open trace file plus bookkeeping for one explore run.
struct TraceFile {
    path: PathBuf,
    out: LineWriter<File>,
    written: usize,
    broken: bool,
}

impl TraceFile {
    fn append(&mut self, line: &str) {
        if self.broken {
            return;
        }
        match writeln!(self.out, "{}", line) {
            Ok(()) => self.written += 1,
            Err(e) => {
                // Warn once; a full disk must not flood the console.
                warn!(
                    "Trace file '{}' stopped accepting events after {}: {}",
                    self.path.display(),
                    self.written,
                    e
                );
                self.broken = true;
            }
        }
    }
}

/// Crawl trace written as JSON lines, one `TraceEvent` per line.
///
/// The file is truncated when the logger is created so each run leaves a
/// trace of its own. Every line is flushed as it is written. Opening or
/// writing failures are logged and the crawl carries on untraced.
pub struct TraceLogger {
    file: Option<Mutex<TraceFile>>,
}

impl TraceLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match File::create(path) {
            Ok(f) => {
                debug!("Tracing crawl to {}", path.display());
                Self {
                    file: Some(Mutex::new(TraceFile {
                        path: path.to_path_buf(),
                        out: LineWriter::new(f),
                        written: 0,
                        broken: false,
                    })),
                }
            }
            Err(e) => {
                warn!("Crawl trace disabled, cannot create '{}': {}", path.display(), e);
                Self::disabled()
            }
        }
    }

    /// A logger that drops every event.
    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    /// Number of events written so far.
    pub fn events_written(&self) -> usize {
        self.file
            .as_ref()
            .and_then(|f| f.lock().ok().map(|t| t.written))
            .unwrap_or(0)
    }

    pub fn log(&self, event: &TraceEvent) {
        let Some(file) = &self.file else {
            return;
        };
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!("Dropping trace event '{}': {}", event.event, e);
                return;
            }
        };
        // A poisoned lock only means another thread panicked mid-write.
        let mut trace = file.lock().unwrap_or_else(|p| p.into_inner());
        trace.append(&line);
    }
}
