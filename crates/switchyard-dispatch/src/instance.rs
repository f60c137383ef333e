//! Per-entry lazy construction.
//!
//! Every registered filter and handler owns one [`InstanceCell`]. The cell is
//! a small state machine guarded by its own mutex:
//!
//! ```text
//! Uninitialized ──get_or_try_init()──► Ready(instance)
//!               └────────────────────► Failed(reason)
//! Ready / Failed ──take()────────────► Uninitialized
//! ```
//!
//! The mutex is held for the duration of the factory call, which is the
//! "initializing" state: concurrent callers block on that entry only and then
//! observe the same instance or the same failure. Unrelated entries never
//! contend. A factory that panics is recorded as failed like one that
//! returns an error.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use switchyard_core::BoxError;

/// Observable state of a lazily constructed component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    /// Not constructed yet (or destroyed).
    Uninitialized,
    /// Constructed and shared by every chain that needs it.
    Ready,
    /// The factory failed; every later request observes the same failure.
    Failed,
}

enum InstanceState<T: ?Sized> {
    Uninitialized,
    Ready(Arc<T>),
    Failed(String),
}

pub(crate) struct InstanceCell<T: ?Sized> {
    state: Mutex<InstanceState<T>>,
}

impl<T: ?Sized> InstanceCell<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(InstanceState::Uninitialized),
        }
    }

    /// Returns the instance, running `init` if this is the first request.
    ///
    /// A failure is recorded and returned to every later caller without
    /// calling `init` again.
    pub(crate) fn get_or_try_init<F>(&self, init: F) -> Result<Arc<T>, String>
    where
        F: FnOnce() -> Result<Arc<T>, BoxError>,
    {
        let mut state = self.state.lock();
        match &*state {
            InstanceState::Ready(instance) => return Ok(Arc::clone(instance)),
            InstanceState::Failed(reason) => return Err(reason.clone()),
            InstanceState::Uninitialized => {}
        }

        let outcome = match panic::catch_unwind(AssertUnwindSafe(init)) {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err("factory panicked".to_string()),
        };

        match outcome {
            Ok(instance) => {
                *state = InstanceState::Ready(Arc::clone(&instance));
                Ok(instance)
            }
            Err(reason) => {
                *state = InstanceState::Failed(reason.clone());
                Err(reason)
            }
        }
    }

    /// Removes the instance, returning the cell to `Uninitialized`.
    pub(crate) fn take(&self) -> Option<Arc<T>> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, InstanceState::Uninitialized) {
            InstanceState::Ready(instance) => Some(instance),
            InstanceState::Failed(_) | InstanceState::Uninitialized => None,
        }
    }

    pub(crate) fn status(&self) -> InstanceStatus {
        match &*self.state.lock() {
            InstanceState::Uninitialized => InstanceStatus::Uninitialized,
            InstanceState::Ready(_) => InstanceStatus::Ready,
            InstanceState::Failed(_) => InstanceStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_init_runs_once() {
        let cell: InstanceCell<String> = InstanceCell::new();
        let calls = AtomicUsize::new(0);

        let first = cell
            .get_or_try_init(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new("a".to_string()))
            })
            .unwrap();
        let second = cell
            .get_or_try_init(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new("b".to_string()))
            })
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.status(), InstanceStatus::Ready);
    }

    #[test]
    fn test_failure_is_sticky() {
        let cell: InstanceCell<String> = InstanceCell::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let err = cell
                .get_or_try_init(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("boom".into())
                })
                .unwrap_err();
            assert_eq!(err, "boom");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.status(), InstanceStatus::Failed);
    }

    #[test]
    fn test_panicking_factory_is_a_sticky_failure() {
        let cell: InstanceCell<String> = InstanceCell::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let err = cell
                .get_or_try_init(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    panic!("factory exploded")
                })
                .unwrap_err();
            assert_eq!(err, "factory panicked");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.status(), InstanceStatus::Failed);
        assert!(cell.take().is_none());
    }

    #[test]
    fn test_take_resets() {
        let cell: InstanceCell<String> = InstanceCell::new();
        assert!(cell.take().is_none());

        cell.get_or_try_init(|| Ok(Arc::new("x".to_string())))
            .unwrap();
        assert_eq!(cell.take().as_deref().map(String::as_str), Some("x"));
        assert_eq!(cell.status(), InstanceStatus::Uninitialized);
        assert!(cell.take().is_none());
    }

    #[test]
    fn test_concurrent_first_use_constructs_once() {
        const THREADS: usize = 8;
        let cell: InstanceCell<String> = InstanceCell::new();
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);

        let instances: Vec<Arc<String>> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cell.get_or_try_init(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok(Arc::new("shared".to_string()))
                        })
                        .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    }
}
