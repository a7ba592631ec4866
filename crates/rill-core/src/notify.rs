//! One-to-many wakeup fabric with per-waiter cancellation.
//!
//! Subscriber threads park on the [`Notifier`] when caught up with the log.
//! Publishers call [`Notifier::notify_all`] after every state change, under
//! the same mutex the waiters evaluate their predicates under, so a woken
//! waiter always observes the state that caused the wakeup.
//!
//! Cancellation is a per-waiter [`TerminateSignal`]: raising it makes the
//! waiter's `wait_until` return regardless of the predicate, and the flag is
//! observable from inside the predicate itself. The notifier keeps a roster
//! of registered signals so stream teardown can cancel every worker at once,
//! including workers that are currently delivering rather than waiting.
//! Registration happens on the subscribing thread, under the publish mutex,
//! before the worker starts; this orders it against the teardown barrier.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};

// ---------------------------------------------------------------------------
// TerminateSignal
// ---------------------------------------------------------------------------

/// A raise-once cancellation flag shared between a worker and its handles.
///
/// Clones share the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct TerminateSignal {
    raised: Arc<AtomicBool>,
}

impl TerminateSignal {
    /// Creates a fresh, unraised signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal. Idempotent.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Returns whether the signal has been raised.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    fn same_flag(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.raised, &other.raised)
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Condvar-style notifier coupled with the stream's publish mutex.
///
/// Infallible by design: every operation either wakes threads or records
/// bookkeeping; none can fail.
#[derive(Debug, Default)]
pub struct Notifier {
    wakeups: Condvar,
    roster: Mutex<Vec<TerminateSignal>>,
}

impl Notifier {
    /// Creates an empty notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a waiter's cancellation signal to the roster, making it
    /// reachable by [`Notifier::cancel_all_registered`].
    pub fn register_signal(&self, signal: &TerminateSignal) {
        self.roster.lock().push(signal.clone());
    }

    /// Removes a previously registered signal from the roster.
    pub fn deregister_signal(&self, signal: &TerminateSignal) {
        let mut roster = self.roster.lock();
        if let Some(pos) = roster.iter().position(|s| s.same_flag(signal)) {
            roster.swap_remove(pos);
        }
    }

    /// Blocks until the predicate holds or the signal is raised.
    ///
    /// The caller must hold the mutex the publishing side mutates state
    /// under; the lock is released while parked and re-acquired before each
    /// predicate evaluation and before returning.
    pub fn wait_until<F>(
        &self,
        guard: &mut MutexGuard<'_, ()>,
        signal: &TerminateSignal,
        mut predicate: F,
    ) where
        F: FnMut() -> bool,
    {
        while !signal.is_raised() && !predicate() {
            self.wakeups.wait(guard);
        }
    }

    /// Wakes every parked waiter; each re-checks its own predicate.
    pub fn notify_all(&self) {
        self.wakeups.notify_all();
    }

    /// Raises one waiter's signal and wakes everyone so it gets to observe it.
    ///
    /// Callers raise under the publish mutex so the flag write is ordered
    /// with respect to predicate evaluation.
    pub fn cancel(&self, signal: &TerminateSignal) {
        signal.raise();
        self.wakeups.notify_all();
    }

    /// Raises every registered signal and wakes all waiters.
    ///
    /// The teardown barrier: after this returns, no registered worker can
    /// park again, and workers currently parked return from `wait_until`.
    pub fn cancel_all_registered(&self) {
        let signals: Vec<TerminateSignal> = self.roster.lock().clone();
        for signal in &signals {
            signal.raise();
        }
        self.wakeups.notify_all();
    }

    /// Number of currently registered waiters.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.roster.lock().len()
    }
}
