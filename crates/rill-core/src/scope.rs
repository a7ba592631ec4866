//! RAII ownership of a subscriber worker thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::data::StreamData;
use crate::error::StreamError;
use crate::notify::TerminateSignal;
use crate::persist::Persister;
use crate::subscriber::{run_subscriber_loop, StreamSubscriber};
use crate::variant::VariantCase;

/// Invoked from the worker thread's terminal critical section, under the
/// HTTP registry mutex.
pub type DoneCallback = Box<dyn FnOnce() + Send + 'static>;

/// Keeps the worker's signal on the notifier roster for exactly the worker's
/// lifetime, including unwinds.
struct RosterMembership<P: Persister> {
    data: Arc<StreamData<P>>,
    signal: TerminateSignal,
}

impl<P: Persister> Drop for RosterMembership<P> {
    fn drop(&mut self) {
        self.data.notifier.deregister_signal(&self.signal);
    }
}

/// Move-only owner of one subscriber worker thread.
///
/// Dropping the scope requests cooperative termination and joins the
/// thread. [`SubscriberScope::async_terminate`] requests termination from
/// any thread without joining; it is idempotent.
///
/// The scope holds only a weak reference to the stream state; the worker
/// thread holds the strong one, so a stream being torn down waits exactly
/// until its workers have exited.
pub struct SubscriberScope<P: Persister> {
    data: Weak<StreamData<P>>,
    signal: TerminateSignal,
    termination_requested: AtomicBool,
    handle: Option<JoinHandle<()>>,
}

impl<P: Persister> SubscriberScope<P> {
    pub(crate) fn spawn<C, S>(
        data: &Arc<StreamData<P>>,
        mut subscriber: S,
        begin_idx: u64,
        done_callback: Option<DoneCallback>,
    ) -> Result<Self, StreamError>
    where
        C: VariantCase<P::Entry> + 'static,
        S: StreamSubscriber<C> + 'static,
    {
        // Shared slot so the callback fires even when the thread never
        // starts: either the worker takes it at exit, or an error path
        // below does.
        let callback_slot = Arc::new(Mutex::new(done_callback));
        let signal = TerminateSignal::new();

        // Registration is coupled with the shutdown check under the publish
        // mutex: the teardown barrier runs under the same mutex, so a new
        // subscription either lands on the roster before the barrier (and
        // gets cancelled by it) or observes the shutdown flag here.
        {
            let _guard = data.publish_lock.lock();
            if data.is_shutting_down() {
                drop(_guard);
                if let Some(callback) = callback_slot.lock().take() {
                    callback();
                }
                return Err(StreamError::StreamInGracefulShutdown);
            }
            data.notifier.register_signal(&signal);
        }

        let membership = RosterMembership {
            data: Arc::clone(data),
            signal: signal.clone(),
        };
        let worker_signal = signal.clone();
        let worker_callback = Arc::clone(&callback_slot);

        let spawned = thread::Builder::new()
            .name("rill-subscriber".to_string())
            .spawn(move || {
                tracing::debug!(begin_idx, "subscriber thread started");
                run_subscriber_loop::<P, C, S>(
                    &membership.data,
                    &worker_signal,
                    &mut subscriber,
                    begin_idx,
                );
                // Terminal critical section: the registry mutex is held
                // while the callback runs, so deferred erasers can only
                // proceed once this thread is past its last shared access.
                let registry = Arc::clone(&membership.data.http_subscriptions);
                let terminal = registry.map.lock();
                if let Some(callback) = worker_callback.lock().take() {
                    callback();
                }
                drop(terminal);
                tracing::debug!("subscriber thread finished");
            });

        match spawned {
            Ok(handle) => Ok(Self {
                data: Arc::downgrade(data),
                signal,
                termination_requested: AtomicBool::new(false),
                handle: Some(handle),
            }),
            Err(io) => {
                // The closure was dropped by the failed spawn, taking the
                // roster membership with it.
                if let Some(callback) = callback_slot.lock().take() {
                    callback();
                }
                Err(StreamError::SubscriberSpawn(io))
            }
        }
    }

    /// Requests cooperative termination without joining the worker.
    ///
    /// Callable from any thread; idempotent. The flag is raised under the
    /// publish mutex so a parked worker observes it on wakeup.
    pub fn async_terminate(&self) {
        if self.termination_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(data) = self.data.upgrade() {
            let _guard = data.publish_lock.lock();
            data.notifier.cancel(&self.signal);
        } else {
            // Stream state already gone; the worker has exited or will see
            // the flag before parking.
            self.signal.raise();
        }
    }

    /// Whether termination has been requested through this scope.
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        self.termination_requested.load(Ordering::SeqCst)
    }
}

impl<P: Persister> Drop for SubscriberScope<P> {
    fn drop(&mut self) {
        self.async_terminate();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("subscriber thread panicked");
            }
        }
    }
}

impl<P: Persister> std::fmt::Debug for SubscriberScope<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberScope")
            .field("terminating", &self.is_terminating())
            .finish_non_exhaustive()
    }
}
