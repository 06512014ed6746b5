//! Background tasks
//!
//! `Promise<T>` runs one closure on its own thread and hands the result
//! back through a mutex guarded box. The frame loop polls `is_finished`
//! without blocking; shutdown paths `join`.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::error::{EngineError, EngineResult};

struct Slot<T> {
    value: Option<T>,
    finished: bool,
}

pub struct Promise<T> {
    slot: Arc<Mutex<Slot<T>>>,
    thread: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Promise<T> {
    /// Run `work` on a new thread named `name`
    pub fn spawn<F>(name: &str, work: F) -> EngineResult<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(Slot {
            value: None,
            finished: false,
        }));
        let worker_slot = Arc::clone(&slot);

        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let value = work();
                let mut slot = worker_slot.lock();
                slot.value = Some(value);
                slot.finished = true;
            })
            .map_err(|e| EngineError::SystemError {
                component: "task".to_string(),
                error: format!("could not spawn '{}': {}", name, e),
            })?;

        Ok(Self {
            slot,
            thread: Some(thread),
        })
    }
}

impl<T> Promise<T> {
    /// Non-blocking. True once the worker returned or panicked; a slot that
    /// is locked right now counts as unfinished.
    pub fn is_finished(&self) -> bool {
        let stored = self
            .slot
            .try_lock()
            .map(|slot| slot.finished)
            .unwrap_or(false);
        stored || self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Take the value if the work has finished
    pub fn try_take(&mut self) -> Option<T> {
        let value = {
            let mut slot = self.slot.try_lock()?;
            if !slot.finished {
                return None;
            }
            slot.value.take()
        };
        self.reap();
        value
    }

    /// Block until the work has finished and take the value. `None` when the
    /// worker panicked or the value was already taken.
    pub fn join(mut self) -> Option<T> {
        self.reap();
        let value = self.slot.lock().value.take();
        value
    }

    fn reap(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("[Promise] Worker thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_poll_then_take() {
        let (release, gate) = bounded::<()>(0);
        let mut promise = Promise::spawn("test-task", move || {
            let _ = gate.recv();
            42
        })
        .unwrap();

        assert!(!promise.is_finished());
        assert_eq!(promise.try_take(), None);

        release.send(()).unwrap();
        assert_eq!(promise.join(), Some(42));
    }

    #[test]
    fn test_try_take_after_finish() {
        let mut promise = Promise::spawn("test-task", || "done").unwrap();
        while !promise.is_finished() {
            std::thread::yield_now();
        }
        assert_eq!(promise.try_take(), Some("done"));
        assert_eq!(promise.try_take(), None);
    }

    #[test]
    fn test_panicking_worker_joins_to_none() {
        let promise: Promise<u32> = Promise::spawn("test-task", || panic!("boom")).unwrap();
        while !promise.is_finished() {
            std::thread::yield_now();
        }
        assert_eq!(promise.join(), None);
    }
}
