//! Change sources
//!
//! A `ChangeSource` reports paths that were modified since the last poll.
//! `NotifySource` wraps the OS notification API through `notify`;
//! `ManualSource` is fed by hand.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

/// Batch of modified paths since the previous call. Must not block.
pub trait ChangeSource: Send {
    fn poll_changes(&mut self) -> Vec<PathBuf>;
}

#[cfg(feature = "native")]
pub use native::NotifySource;

#[cfg(feature = "native")]
mod native {
    use std::path::{Path, PathBuf};

    use crossbeam_channel::{unbounded, Receiver};
    use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

    use super::ChangeSource;
    use crate::hot_reload::error::{HotReloadErrorContext, HotReloadResult};

    /// Directory watch backed by the platform notifier
    pub struct NotifySource {
        // Dropping the watcher stops the notifications
        _watcher: RecommendedWatcher,
        rx: Receiver<PathBuf>,
    }

    impl NotifySource {
        /// Watch `dir` non-recursively
        pub fn open(dir: &Path) -> HotReloadResult<Self> {
            let display = dir.display().to_string();
            let (tx, rx) = unbounded();

            let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
                match res {
                    Ok(event) => {
                        if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                            for path in event.paths {
                                let _ = tx.send(path);
                            }
                        }
                    }
                    Err(e) => log::warn!("[NotifySource] Watch error: {}", e),
                }
            })
            .hot_reload_context(&display)?;

            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .hot_reload_context(&display)?;

            log::info!("[NotifySource] Watching {}", display);
            Ok(Self {
                _watcher: watcher,
                rx,
            })
        }
    }

    impl ChangeSource for NotifySource {
        fn poll_changes(&mut self) -> Vec<PathBuf> {
            self.rx.try_iter().collect()
        }
    }
}

/// Hand-fed source. Clones share the same queue, so one clone can be given
/// to a watcher while another injects events.
#[derive(Clone, Default)]
pub struct ManualSource {
    queue: Arc<Mutex<Vec<PathBuf>>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one modify event
    pub fn push(&self, path: impl Into<PathBuf>) {
        self.queue.lock().push(path.into());
    }
}

impl ChangeSource for ManualSource {
    fn poll_changes(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut *self.queue.lock())
    }
}
