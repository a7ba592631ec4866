//! The append-only storage seam behind a stream.
//!
//! The engine never talks to storage directly; it goes through [`Persister`].
//! Mutating calls (`publish`, `update_head`) are only ever made while the
//! stream's publish mutex is held, so implementations may assume a single
//! writer. Read-side calls must return atomic snapshots without requiring
//! that mutex, because subscriber threads read concurrently with the writer.

use crate::entry::Entry;
use crate::log::{HeadAndLast, IdxTs};

/// Boxed, index-ordered iteration over a range of persisted entries.
///
/// Lazy: implementations fetch in chunks and tolerate concurrent appends
/// past `end`. A fresh iteration can be started at any time; a single
/// iteration is not restartable.
pub type EntryIter<'a, E> = Box<dyn Iterator<Item = (IdxTs, E)> + Send + 'a>;

/// Errors from persister operations.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Supplied timestamp would break the strict monotonicity of the stream
    /// timeline.
    #[error("inconsistent timestamp: {supplied}us not ahead of head {head}us")]
    InconsistentTimestamp {
        /// Timestamp the caller supplied.
        supplied: i64,
        /// Head timestamp it collided with.
        head: i64,
    },

    /// Underlying storage failed.
    #[error("storage I/O: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be encoded or decoded.
    #[error("record codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Abstract append-only log with an `(index, timestamp, head)` cursor.
///
/// Implementations: [`MemoryPersister`](crate::MemoryPersister) in this
/// crate, and the durable file-backed persister in `rill-storage`.
pub trait Persister: Send + Sync + 'static {
    /// Entry type stored by this persister.
    type Entry: Entry;

    /// Appends an entry, assigning the next dense index.
    ///
    /// Caller holds the publish mutex. With `us = None` the persister stamps
    /// `max(now, head + 1)`; an explicit `us` must be strictly greater than
    /// the current head.
    ///
    /// # Errors
    ///
    /// [`PersistError::InconsistentTimestamp`] when an explicit `us` does not
    /// advance the timeline; storage errors from durable implementations.
    fn publish(&self, entry: Self::Entry, us: Option<i64>) -> Result<IdxTs, PersistError>;

    /// Advances the head without appending an entry; returns the new head.
    ///
    /// Caller holds the publish mutex. With `us = None` the head is clamped
    /// to `max(head, now)`. An explicit `us` must be `>=` the current head
    /// and strictly greater than the last entry's timestamp.
    ///
    /// # Errors
    ///
    /// [`PersistError::InconsistentTimestamp`] when an explicit `us` would
    /// move the head backward or collide with the last entry.
    fn update_head(&self, us: Option<i64>) -> Result<i64, PersistError>;

    /// Number of entries in the log.
    fn size(&self) -> u64;

    /// Current head timestamp.
    fn current_head(&self) -> i64;

    /// Atomic snapshot of head and last-entry cursor.
    fn head_and_last(&self) -> HeadAndLast;

    /// Iterates entries with indices in `[begin, end)`, in index order.
    fn iterate(&self, begin: u64, end: u64) -> EntryIter<'_, Self::Entry>;

    /// Maps a timestamp range `[from, to)` to the index range of entries
    /// whose timestamps fall inside it. `to == 0` means open-ended.
    fn index_range_by_timestamp_range(&self, from_us: i64, to_us: i64) -> (u64, u64);
}
