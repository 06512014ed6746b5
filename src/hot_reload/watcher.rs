use std::fmt::Debug;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::source::ChangeSource;

/// A file of interest, registered once per distinct name
#[derive(Debug, Clone, PartialEq)]
pub struct WatchedFile<U> {
    /// Path relative to the watched directory, `/` separated
    pub name: String,
    pub user_data: U,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ChangeState {
    /// Waiting for the debounce deadline
    Pending(Instant),
    /// Quiet period elapsed; waiting to be consumed
    Ready,
}

#[derive(Debug)]
struct ChangedFile {
    watched: usize,
    state: ChangeState,
}

/// File watcher with debouncing
///
/// Watches the files registered with `watch_file` inside one directory.
/// Each modification event starts (or restarts) a quiet period for that
/// file; once the period passes without another event the file becomes
/// ready and is handed out by `take_changed`. There is at most one change
/// entry per watched file, pending or ready.
pub struct FileWatcher<U> {
    dir: PathBuf,
    debounce: Duration,
    source: Option<Box<dyn ChangeSource>>,
    watched: Vec<WatchedFile<U>>,
    changed: Vec<ChangedFile>,
}

impl<U: Clone + PartialEq + Debug> FileWatcher<U> {
    /// Watch `dir` through the platform notifier. When the notifier cannot
    /// be opened the watcher is inert: `update` does nothing.
    pub fn new(dir: impl AsRef<Path>, debounce: Duration) -> Self {
        let dir = dir.as_ref();

        #[cfg(feature = "native")]
        let source = match super::source::NotifySource::open(dir) {
            Ok(source) => Some(Box::new(source) as Box<dyn ChangeSource>),
            Err(e) => {
                log::error!("[FileWatcher] Could not watch {}: {}", dir.display(), e);
                None
            }
        };

        #[cfg(not(feature = "native"))]
        let source = {
            log::warn!(
                "[FileWatcher] Built without the native notifier; {} is not watched",
                dir.display()
            );
            None
        };

        Self::from_parts(dir, debounce, source)
    }

    /// Watch `dir` through an explicit change source
    pub fn with_source(
        dir: impl AsRef<Path>,
        debounce: Duration,
        source: Box<dyn ChangeSource>,
    ) -> Self {
        Self::from_parts(dir.as_ref(), debounce, Some(source))
    }

    /// Watcher that never reports changes
    pub fn inert(dir: impl AsRef<Path>, debounce: Duration) -> Self {
        Self::from_parts(dir.as_ref(), debounce, None)
    }

    fn from_parts(dir: &Path, debounce: Duration, source: Option<Box<dyn ChangeSource>>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            debounce,
            source,
            watched: Vec::new(),
            changed: Vec::new(),
        }
    }

    /// False when the change source could not be opened
    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Register interest in `name`. Registering the same name again returns
    /// the existing index and keeps the first user data.
    pub fn watch_file(&mut self, name: &str, user_data: U) -> usize {
        let name = normalize(name);

        if let Some(index) = self.watched.iter().position(|file| file.name == name) {
            if self.watched[index].user_data != user_data {
                log::warn!(
                    "[FileWatcher] '{}' already watched with {:?}; ignoring {:?}",
                    name,
                    self.watched[index].user_data,
                    user_data
                );
            }
            return index;
        }

        if !self.dir.join(&name).exists() {
            log::warn!(
                "[FileWatcher] '{}' does not exist in {}",
                name,
                self.dir.display()
            );
        }

        self.watched.push(WatchedFile { name, user_data });
        self.watched.len() - 1
    }

    pub fn watched(&self, index: usize) -> Option<&WatchedFile<U>> {
        self.watched.get(index)
    }

    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }

    /// Non-blocking poll
    pub fn update(&mut self) {
        self.update_at(Instant::now());
    }

    /// `update` with an explicit clock
    pub fn update_at(&mut self, now: Instant) {
        let Some(source) = self.source.as_mut() else {
            return;
        };

        for path in source.poll_changes() {
            let path = normalize(&path.to_string_lossy());
            let Some(watched) = self.watched.iter().position(|file| matches_name(&path, &file.name))
            else {
                continue;
            };

            let deadline = now + self.debounce;
            match self.changed.iter_mut().find(|change| change.watched == watched) {
                // A newer event restarts the quiet period, also for entries
                // that were already ready but not consumed yet
                Some(change) => change.state = ChangeState::Pending(deadline),
                None => self.changed.push(ChangedFile {
                    watched,
                    state: ChangeState::Pending(deadline),
                }),
            }
        }

        for change in self.changed.iter_mut() {
            if let ChangeState::Pending(deadline) = change.state {
                if deadline <= now {
                    change.state = ChangeState::Ready;
                }
            }
        }
    }

    /// Consume the first ready file that can be opened for reading. Files
    /// that cannot be opened yet stay ready and are retried on the next call.
    pub fn take_changed(&mut self) -> Option<WatchedFile<U>> {
        let position = self.changed.iter().position(|change| {
            change.state == ChangeState::Ready
                && File::open(self.dir.join(&self.watched[change.watched].name)).is_ok()
        })?;

        let change = self.changed.remove(position);
        Some(self.watched[change.watched].clone())
    }

    /// Drain every consumable ready file
    pub fn changed_files(&mut self) -> impl Iterator<Item = WatchedFile<U>> + '_ {
        std::iter::from_fn(move || self.take_changed())
    }

    /// Number of entries still inside their quiet period
    pub fn pending_count(&self) -> usize {
        self.changed
            .iter()
            .filter(|change| matches!(change.state, ChangeState::Pending(_)))
            .count()
    }

    /// Number of entries waiting to be consumed
    pub fn ready_count(&self) -> usize {
        self.changed
            .iter()
            .filter(|change| change.state == ChangeState::Ready)
            .count()
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

/// `path` names the watched file either directly or with a directory prefix
fn matches_name(path: &str, name: &str) -> bool {
    path == name
        || path
            .strip_suffix(name)
            .map(|prefix| prefix.ends_with('/'))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_name() {
        assert!(matches_name("sculpt.comp.wgsl", "sculpt.comp.wgsl"));
        assert!(matches_name("/data/shaders/sculpt.comp.wgsl", "sculpt.comp.wgsl"));
        assert!(!matches_name("/data/shaders/xsculpt.comp.wgsl", "sculpt.comp.wgsl"));
        assert_eq!(normalize("shaders\\sculpt.comp.wgsl"), "shaders/sculpt.comp.wgsl");
    }
}
