//! The stream facade: construction, publishing, subscriptions, shutdown.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::data::{StreamData, SubscriptionId};
use crate::entry::Entry;
use crate::error::StreamError;
use crate::log::{IdxTs, StreamNamespace};
use crate::memory::MemoryPersister;
use crate::persist::Persister;
use crate::publisher::{PublisherAcquirer, StreamPublisher};
use crate::schema::SchemaDescriptor;
use crate::scope::{DoneCallback, SubscriberScope};
use crate::subscriber::StreamSubscriber;
use crate::variant::VariantCase;

// ---------------------------------------------------------------------------
// Authority
// ---------------------------------------------------------------------------

/// Who currently holds the stream's write authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDataAuthority {
    /// The facade holds the publisher.
    Own,
    /// The publisher has been moved to an external acquirer.
    External,
}

struct PublisherSlot<P: Persister> {
    publisher: Option<StreamPublisher<P>>,
    authority: StreamDataAuthority,
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// A persistent, immutable, strictly-ordered, append-only typed event log
/// with live fan-out to subscriber threads.
///
/// The facade is the sole strong owner of the shared stream state. Dropping
/// it terminates every HTTP subscription, waits for the deferred erasers to
/// empty the registry, cancels any remaining subscriber workers, and blocks
/// until they have all released the state.
pub struct Stream<P: Persister> {
    data: Arc<StreamData<P>>,
    publisher_slot: Mutex<PublisherSlot<P>>,
}

impl<E: Entry> Stream<MemoryPersister<E>> {
    /// Creates an in-memory stream with the default namespace.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryPersister::new())
    }
}

impl<P: Persister> Stream<P> {
    /// Creates a stream over `persister` with the default namespace.
    #[must_use]
    pub fn new(persister: P) -> Self {
        Self::with_namespace(StreamNamespace::default(), persister)
    }

    /// Creates a stream over `persister`, exposing its schema under `namespace`.
    #[must_use]
    pub fn with_namespace(namespace: StreamNamespace, persister: P) -> Self {
        let schema = SchemaDescriptor::for_entry::<P::Entry>();
        let data = Arc::new(StreamData::new(persister, namespace, schema));
        let publisher = StreamPublisher::new(Arc::downgrade(&data));
        tracing::debug!(
            entry_type = %P::Entry::type_name(),
            size = data.persister().size(),
            "stream created"
        );
        Self {
            data,
            publisher_slot: Mutex::new(PublisherSlot {
                publisher: Some(publisher),
                authority: StreamDataAuthority::Own,
            }),
        }
    }

    // --- publishing --------------------------------------------------------

    /// Appends an entry with an auto-assigned timestamp.
    ///
    /// # Errors
    ///
    /// [`StreamError::PublishToStreamWithReleasedPublisher`] while the write
    /// authority is external; the publisher's own failure set otherwise.
    pub fn publish(&self, entry: P::Entry) -> Result<IdxTs, StreamError> {
        self.with_publisher(|publisher| publisher.publish(entry))
    }

    /// Appends an entry at an explicit epoch-microsecond timestamp.
    ///
    /// # Errors
    ///
    /// Same failure set as [`Stream::publish`], plus `InconsistentTimestamp`.
    pub fn publish_at(&self, entry: P::Entry, us: i64) -> Result<IdxTs, StreamError> {
        self.with_publisher(|publisher| publisher.publish_at(entry, us))
    }

    /// Advances the head to the current time without appending.
    ///
    /// # Errors
    ///
    /// Same failure set as [`Stream::publish`].
    pub fn update_head(&self) -> Result<i64, StreamError> {
        self.with_publisher(StreamPublisher::update_head)
    }

    /// Advances the head to an explicit timestamp without appending.
    ///
    /// # Errors
    ///
    /// Same failure set as [`Stream::publish_at`].
    pub fn update_head_at(&self, us: i64) -> Result<i64, StreamError> {
        self.with_publisher(|publisher| publisher.update_head_at(us))
    }

    fn with_publisher<T>(
        &self,
        op: impl FnOnce(&StreamPublisher<P>) -> Result<T, StreamError>,
    ) -> Result<T, StreamError> {
        let slot = self.publisher_slot.lock();
        match &slot.publisher {
            Some(publisher) => op(publisher),
            None => Err(StreamError::PublishToStreamWithReleasedPublisher),
        }
    }

    // --- publisher transfer ------------------------------------------------

    /// Hands the singleton publisher to an external acquirer.
    ///
    /// # Errors
    ///
    /// [`StreamError::PublisherAlreadyReleased`] when it was already moved.
    pub fn move_publisher_to(
        &self,
        acquirer: &mut dyn PublisherAcquirer<P>,
    ) -> Result<(), StreamError> {
        let mut slot = self.publisher_slot.lock();
        match slot.publisher.take() {
            Some(publisher) => {
                acquirer.accept_publisher(publisher);
                slot.authority = StreamDataAuthority::External;
                Ok(())
            }
            None => Err(StreamError::PublisherAlreadyReleased),
        }
    }

    /// Reinstalls a previously moved-out publisher.
    ///
    /// # Errors
    ///
    /// [`StreamError::PublisherAlreadyOwned`] when the facade already holds
    /// one.
    pub fn acquire_publisher(&self, publisher: StreamPublisher<P>) -> Result<(), StreamError> {
        let mut slot = self.publisher_slot.lock();
        if slot.publisher.is_some() {
            return Err(StreamError::PublisherAlreadyOwned);
        }
        slot.publisher = Some(publisher);
        slot.authority = StreamDataAuthority::Own;
        Ok(())
    }

    /// Reports who currently holds the write authority.
    #[must_use]
    pub fn data_authority(&self) -> StreamDataAuthority {
        self.publisher_slot.lock().authority
    }

    // --- subscriptions -----------------------------------------------------

    /// Subscribes from index 0 with no case filter.
    ///
    /// # Errors
    ///
    /// [`StreamError::StreamInGracefulShutdown`] during teardown.
    pub fn subscribe<S>(&self, subscriber: S) -> Result<SubscriberScope<P>, StreamError>
    where
        S: StreamSubscriber<P::Entry> + 'static,
    {
        self.subscribe_with::<P::Entry, S>(subscriber, 0, None)
    }

    /// Subscribes from an explicit start index with no case filter.
    ///
    /// # Errors
    ///
    /// Same failure set as [`Stream::subscribe`].
    pub fn subscribe_from<S>(
        &self,
        subscriber: S,
        begin_idx: u64,
    ) -> Result<SubscriberScope<P>, StreamError>
    where
        S: StreamSubscriber<P::Entry> + 'static,
    {
        self.subscribe_with::<P::Entry, S>(subscriber, begin_idx, None)
    }

    /// Subscribes to a single case of the entry type; non-matching entries
    /// are reported through the subscriber's no-match hook instead.
    ///
    /// # Errors
    ///
    /// Same failure set as [`Stream::subscribe`].
    pub fn subscribe_case<C, S>(
        &self,
        subscriber: S,
        begin_idx: u64,
    ) -> Result<SubscriberScope<P>, StreamError>
    where
        C: VariantCase<P::Entry> + 'static,
        S: StreamSubscriber<C> + 'static,
    {
        self.subscribe_with::<C, S>(subscriber, begin_idx, None)
    }

    /// The full-form subscription: case filter, start index, done callback.
    ///
    /// The callback runs in the worker thread's terminal critical section
    /// (under the HTTP registry mutex); when construction fails it is
    /// invoked before the error returns, so registrations keyed on it never
    /// leak.
    ///
    /// # Errors
    ///
    /// [`StreamError::StreamInGracefulShutdown`] during teardown;
    /// [`StreamError::SubscriberSpawn`] when the worker thread cannot start.
    pub fn subscribe_with<C, S>(
        &self,
        subscriber: S,
        begin_idx: u64,
        done_callback: Option<DoneCallback>,
    ) -> Result<SubscriberScope<P>, StreamError>
    where
        C: VariantCase<P::Entry> + 'static,
        S: StreamSubscriber<C> + 'static,
    {
        if self.data.is_shutting_down() {
            if let Some(callback) = done_callback {
                callback();
            }
            return Err(StreamError::StreamInGracefulShutdown);
        }
        SubscriberScope::spawn::<C, S>(&self.data, subscriber, begin_idx, done_callback)
    }

    // --- HTTP subscription registry ----------------------------------------

    /// Subscribes on behalf of an HTTP consumer and registers the scope
    /// under `id`.
    ///
    /// The registry mutex is held across the subscribe-and-insert so the
    /// worker's terminal critical section cannot run before the entry
    /// exists. On termination the worker's done callback spawns a detached
    /// eraser that removes the entry once that terminal section has
    /// released the mutex.
    ///
    /// # Errors
    ///
    /// Same failure set as [`Stream::subscribe_with`].
    pub fn subscribe_http<S>(
        &self,
        id: SubscriptionId,
        subscriber: S,
        begin_idx: u64,
    ) -> Result<(), StreamError>
    where
        S: StreamSubscriber<P::Entry> + 'static,
    {
        let registry = Arc::clone(&self.data.http_subscriptions);
        let mut map = registry.map.lock();

        let eraser_registry = Arc::clone(&self.data.http_subscriptions);
        let eraser_id = id.clone();
        let done: DoneCallback = Box::new(move || {
            // Called under the registry mutex from the worker itself, so the
            // erase has to happen on another thread after that releases.
            thread::spawn(move || {
                let removed = eraser_registry.map.lock().remove(&eraser_id);
                if removed.is_some() {
                    tracing::debug!(subscription = %eraser_id, "http subscription erased");
                }
            });
        });

        let scope = self.subscribe_with::<P::Entry, S>(subscriber, begin_idx, Some(done))?;
        map.insert(id, scope);
        Ok(())
    }

    /// Asynchronously terminates the HTTP subscription `id`.
    ///
    /// Returns whether the subscription was found; its registry entry is
    /// erased shortly after by the worker's deferred eraser.
    pub fn terminate_http_subscription(&self, id: &SubscriptionId) -> bool {
        let map = self.data.http_subscriptions.map.lock();
        match map.get(id) {
            Some(scope) => {
                scope.async_terminate();
                true
            }
            None => false,
        }
    }

    /// Number of currently registered HTTP subscriptions.
    #[must_use]
    pub fn http_subscription_count(&self) -> usize {
        self.data.http_subscriptions.len()
    }

    // --- introspection -----------------------------------------------------

    /// The persister behind this stream, for administrative tools.
    #[must_use]
    pub fn persister(&self) -> &P {
        self.data.persister()
    }

    /// Schema descriptor computed once at construction.
    #[must_use]
    pub fn schema(&self) -> &SchemaDescriptor {
        self.data.schema()
    }

    /// Namespace the schema is exposed under.
    #[must_use]
    pub fn namespace(&self) -> &StreamNamespace {
        self.data.namespace()
    }

    /// Whether teardown has begun.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.data.is_shutting_down()
    }
}

impl<P: Persister> Drop for Stream<P> {
    fn drop(&mut self) {
        // The flag flips under the publish mutex: subscription spawns check
        // it under the same mutex, so none can slip past the barrier below.
        {
            let _guard = self.data.publish_lock.lock();
            self.data.begin_shutdown();
        }

        // Ask every HTTP subscriber to terminate; their deferred erasers
        // empty the registry as the workers wind down.
        {
            let map = self.data.http_subscriptions.map.lock();
            for scope in map.values() {
                scope.async_terminate();
            }
        }
        while !self.data.http_subscriptions.is_empty() {
            thread::yield_now();
        }

        // Destruction barrier: cancel whatever non-HTTP workers remain, then
        // wait for every worker to release the shared state.
        {
            let _guard = self.data.publish_lock.lock();
            self.data.notifier.cancel_all_registered();
        }
        while Arc::strong_count(&self.data) > 1 {
            thread::yield_now();
        }
        tracing::debug!("stream torn down");
    }
}
