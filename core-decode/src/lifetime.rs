//! # Lifetime Guard
//!
//! Delayed-release protocol between a decoder's owner and its decode
//! workers. The owner may drop a decoder while decode work is still queued or
//! running; whichever side finishes second releases the decoder's resources,
//! and it happens exactly once.
//!
//! ## State
//!
//! A single tagged word:
//!
//! ```text
//!  usize:  [ outstanding requests ... | RETIRED ]
//!            bits 1..                   bit 0
//! ```
//!
//! - ALIVE → RETIRED happens once, from the owner, by compare-and-exchange.
//! - Workers never write the RETIRED bit; they only observe it.
//! - Because the flag and the count live in the same word, the owner and
//!   the last finishing worker cannot both see the other side as gone.

use std::sync::atomic::{AtomicUsize, Ordering};

const RETIRED: usize = 1;
const ONE_TASK: usize = 2;

/// Who has to release the guarded resources after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    /// The other side is still around; do nothing.
    Keep,
    /// This caller observed the final transition and must release.
    Release,
}

impl Disposal {
    pub fn is_release(&self) -> bool {
        matches!(self, Disposal::Release)
    }
}

/// Result of [`LifetimeGuard::finish_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskCompletion {
    /// Requests still outstanding after this one.
    pub remaining: usize,
    pub disposal: Disposal,
}

/// Outstanding-request counter with a one-way retired flag.
#[derive(Debug, Default)]
pub struct LifetimeGuard {
    state: AtomicUsize,
}

impl LifetimeGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more request.
    ///
    /// Returns `None` once the guard is retired. Otherwise returns `true` if
    /// no request was outstanding, meaning the caller has to dispatch a
    /// worker.
    pub fn begin_task(&self) -> Option<bool> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current & RETIRED != 0 {
                return None;
            }
            match self.state.compare_exchange_weak(
                current,
                current + ONE_TASK,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(current < ONE_TASK),
                Err(actual) => current = actual,
            }
        }
    }

    /// Complete one request.
    pub fn finish_task(&self) -> TaskCompletion {
        let previous = self.state.fetch_sub(ONE_TASK, Ordering::AcqRel);
        debug_assert!(previous >= ONE_TASK, "finish_task without begin_task");

        let remaining = (previous >> 1).saturating_sub(1);
        let disposal = if previous == RETIRED | ONE_TASK {
            Disposal::Release
        } else {
            Disposal::Keep
        };

        TaskCompletion {
            remaining,
            disposal,
        }
    }

    /// Mark the owner as gone.
    ///
    /// Returns `Release` if nothing is outstanding. Calling it twice is a
    /// no-op that returns `Keep`.
    pub fn retire(&self) -> Disposal {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current & RETIRED != 0 {
                return Disposal::Keep;
            }
            match self.state.compare_exchange_weak(
                current,
                current | RETIRED,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) if current == 0 => return Disposal::Release,
                Ok(_) => return Disposal::Keep,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn is_retired(&self) -> bool {
        self.state.load(Ordering::Acquire) & RETIRED != 0
    }

    /// Requests registered and not yet finished.
    pub fn outstanding(&self) -> usize {
        self.state.load(Ordering::Acquire) >> 1
    }

    pub fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_first_request_dispatches() {
        let guard = LifetimeGuard::new();
        assert_eq!(guard.begin_task(), Some(true));
        assert_eq!(guard.begin_task(), Some(false));
        assert_eq!(guard.outstanding(), 2);

        assert_eq!(guard.finish_task().remaining, 1);
        let last = guard.finish_task();
        assert_eq!(last.remaining, 0);
        assert_eq!(last.disposal, Disposal::Keep);
        assert!(guard.is_idle());

        assert_eq!(guard.begin_task(), Some(true));
    }

    #[test]
    fn test_retire_when_idle_releases() {
        let guard = LifetimeGuard::new();
        assert_eq!(guard.retire(), Disposal::Release);
        assert!(guard.is_retired());
        assert_eq!(guard.retire(), Disposal::Keep);
        assert_eq!(guard.begin_task(), None);
    }

    #[test]
    fn test_retire_with_outstanding_defers_to_last_task() {
        let guard = LifetimeGuard::new();
        guard.begin_task();
        guard.begin_task();

        assert_eq!(guard.retire(), Disposal::Keep);
        assert_eq!(guard.begin_task(), None);

        assert_eq!(guard.finish_task().disposal, Disposal::Keep);
        let last = guard.finish_task();
        assert_eq!(last.remaining, 0);
        assert!(last.disposal.is_release());
    }

    #[test]
    fn test_randomized_release_exactly_once() {
        let mut rng = rand::thread_rng();

        for _ in 0..200 {
            let guard = Arc::new(LifetimeGuard::new());
            let releases = Arc::new(AtomicUsize::new(0));
            let tasks = rng.gen_range(0..6);
            let owner_delay = rng.gen_range(0..50);

            for _ in 0..tasks {
                guard.begin_task();
            }

            let workers: Vec<_> = (0..tasks)
                .map(|_| {
                    let guard = guard.clone();
                    let releases = releases.clone();
                    let spins = rng.gen_range(0..50);
                    thread::spawn(move || {
                        for _ in 0..spins {
                            std::hint::spin_loop();
                        }
                        if guard.finish_task().disposal.is_release() {
                            releases.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();

            for _ in 0..owner_delay {
                std::hint::spin_loop();
            }
            if guard.retire().is_release() {
                releases.fetch_add(1, Ordering::SeqCst);
            }

            for worker in workers {
                worker.join().unwrap();
            }

            assert_eq!(releases.load(Ordering::SeqCst), 1);
            assert!(guard.is_idle());
        }
    }
}
