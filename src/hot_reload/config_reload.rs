use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::source::ChangeSource;
use super::watcher::FileWatcher;
use crate::config::SculptConfig;
use crate::ui::MessageQueue;

/// Configuration reloader
///
/// Watches the configuration file and re-reads it after an edit. A file
/// that no longer parses or validates is reported and ignored; the caller
/// keeps running with the configuration it already has.
pub struct ConfigReloader {
    path: PathBuf,
    watcher: FileWatcher<()>,
}

impl ConfigReloader {
    pub fn new(path: impl AsRef<Path>, debounce: Duration) -> Self {
        let path = path.as_ref().to_path_buf();
        let watcher = FileWatcher::new(parent_dir(&path), debounce);
        Self::from_watcher(path, watcher)
    }

    pub fn with_source(
        path: impl AsRef<Path>,
        debounce: Duration,
        source: Box<dyn ChangeSource>,
    ) -> Self {
        let path = path.as_ref().to_path_buf();
        let watcher = FileWatcher::with_source(parent_dir(&path), debounce, source);
        Self::from_watcher(path, watcher)
    }

    fn from_watcher(path: PathBuf, mut watcher: FileWatcher<()>) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        watcher.watch_file(&file_name, ());
        Self { path, watcher }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// New configuration when the file changed and still loads
    pub fn poll(&mut self, messages: &mut MessageQueue) -> Option<SculptConfig> {
        self.poll_at(messages, Instant::now())
    }

    /// `poll` with an explicit clock
    pub fn poll_at(&mut self, messages: &mut MessageQueue, now: Instant) -> Option<SculptConfig> {
        self.watcher.update_at(now);
        let changed = self.watcher.changed_files().count() > 0;
        if !changed {
            return None;
        }

        match SculptConfig::load(&self.path) {
            Ok(config) => {
                log::info!("[ConfigReloader] Reloaded {}", self.path.display());
                Some(config)
            }
            Err(e) => {
                messages.error(format!("Config reload failed: {}", e));
                None
            }
        }
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
