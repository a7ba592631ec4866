//! The singleton write capability of a stream.

use std::sync::Weak;

use crate::data::StreamData;
use crate::error::StreamError;
use crate::log::IdxTs;
use crate::persist::Persister;

/// Transferable handle carrying exclusive write authority over a stream.
///
/// Exactly one exists per stream at any time. The facade holds it by
/// default; [`Stream::move_publisher_to`](crate::Stream::move_publisher_to)
/// hands it to an external component (a replicator, a test harness), and
/// [`Stream::acquire_publisher`](crate::Stream::acquire_publisher) takes it
/// back.
///
/// Every call serializes on the stream's publish mutex and wakes all
/// subscribers before releasing it.
pub struct StreamPublisher<P: Persister> {
    data: Weak<StreamData<P>>,
}

impl<P: Persister> StreamPublisher<P> {
    pub(crate) fn new(data: Weak<StreamData<P>>) -> Self {
        Self { data }
    }

    /// Appends an entry with an auto-assigned timestamp.
    ///
    /// # Errors
    ///
    /// [`StreamError::StreamInGracefulShutdown`] during teardown; persister
    /// errors otherwise.
    pub fn publish(&self, entry: P::Entry) -> Result<IdxTs, StreamError> {
        self.publish_impl(entry, None)
    }

    /// Appends an entry at an explicit epoch-microsecond timestamp.
    ///
    /// # Errors
    ///
    /// [`StreamError::StreamInGracefulShutdown`] during teardown;
    /// `InconsistentTimestamp` when `us` does not advance the timeline.
    pub fn publish_at(&self, entry: P::Entry, us: i64) -> Result<IdxTs, StreamError> {
        self.publish_impl(entry, Some(us))
    }

    /// Advances the head to the current time without appending.
    ///
    /// # Errors
    ///
    /// [`StreamError::StreamInGracefulShutdown`] during teardown.
    pub fn update_head(&self) -> Result<i64, StreamError> {
        self.update_head_impl(None)
    }

    /// Advances the head to an explicit timestamp without appending.
    ///
    /// # Errors
    ///
    /// [`StreamError::StreamInGracefulShutdown`] during teardown;
    /// `InconsistentTimestamp` when `us` would move the head backward or
    /// collide with the last entry.
    pub fn update_head_at(&self, us: i64) -> Result<i64, StreamError> {
        self.update_head_impl(Some(us))
    }

    fn publish_impl(&self, entry: P::Entry, us: Option<i64>) -> Result<IdxTs, StreamError> {
        let data = self.live_data()?;
        let _lock = data.publish_lock.lock();
        let idx_ts = data.persister.publish(entry, us)?;
        data.notifier.notify_all();
        Ok(idx_ts)
    }

    fn update_head_impl(&self, us: Option<i64>) -> Result<i64, StreamError> {
        let data = self.live_data()?;
        let _lock = data.publish_lock.lock();
        let head = data.persister.update_head(us)?;
        data.notifier.notify_all();
        Ok(head)
    }

    fn live_data(&self) -> Result<std::sync::Arc<StreamData<P>>, StreamError> {
        let data = self
            .data
            .upgrade()
            .ok_or(StreamError::StreamInGracefulShutdown)?;
        if data.is_shutting_down() {
            return Err(StreamError::StreamInGracefulShutdown);
        }
        Ok(data)
    }
}

impl<P: Persister> std::fmt::Debug for StreamPublisher<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPublisher").finish_non_exhaustive()
    }
}

/// Receiver side of a publisher hand-off.
pub trait PublisherAcquirer<P: Persister> {
    /// Takes ownership of the stream's only publisher handle.
    fn accept_publisher(&mut self, publisher: StreamPublisher<P>);
}

// A plain `Option` slot is acquirer enough for tests and simple harnesses.
impl<P: Persister> PublisherAcquirer<P> for Option<StreamPublisher<P>> {
    fn accept_publisher(&mut self, publisher: StreamPublisher<P>) {
        *self = Some(publisher);
    }
}
