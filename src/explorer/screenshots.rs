use std::fs;
use std::path::{Path, PathBuf};

/// Destination for screenshots taken when a screen is first recorded.
pub trait ScreenshotSink {
    /// Whether screenshots should be captured at all.
    fn enabled(&self) -> bool;

    /// Store `png` for screen `screen_name` under world state `state_label`.
    fn store(&mut self, state_label: &str, screen_name: &str, png: &[u8]) -> std::io::Result<PathBuf>;
}

/// Discards everything; used when no output directory is configured.
pub struct NoScreenshots;

impl ScreenshotSink for NoScreenshots {
    fn enabled(&self) -> bool {
        false
    }

    fn store(&mut self, _state_label: &str, _screen_name: &str, _png: &[u8]) -> std::io::Result<PathBuf> {
        Err(std::io::Error::other("screenshots disabled"))
    }
}

/// Writes `<dir>/<state>_<screen>.png`.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

impl ScreenshotSink for DirectorySink {
    fn enabled(&self) -> bool {
        true
    }

    fn store(&mut self, state_label: &str, screen_name: &str, png: &[u8]) -> std::io::Result<PathBuf> {
        let path = self
            .dir
            .join(format!("{}_{}.png", sanitize_filename(state_label), sanitize_filename(screen_name)));
        fs::write(&path, png)?;
        Ok(path)
    }
}

/// Sanitize a name into a safe filename component.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '=' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
