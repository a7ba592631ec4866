//! In-memory persister: the default storage behind a stream.

use parking_lot::RwLock;

use crate::clock::now_us;
use crate::entry::Entry;
use crate::log::{HeadAndLast, IdxTs};
use crate::persist::{EntryIter, PersistError, Persister};

/// Entries cloned out per read-lock acquisition while iterating.
const ITER_CHUNK: usize = 256;

#[derive(Debug)]
struct LogState<E> {
    entries: Vec<(IdxTs, E)>,
    head: i64,
}

// ---------------------------------------------------------------------------
// MemoryPersister
// ---------------------------------------------------------------------------

/// Keeps the whole log in memory behind a read-write lock.
///
/// Writers mutate under the stream's publish mutex plus a short write lock;
/// readers take snapshots under the read lock, so `head_and_last` is atomic
/// without touching the publish mutex.
#[derive(Debug)]
pub struct MemoryPersister<E> {
    state: RwLock<LogState<E>>,
}

impl<E> Default for MemoryPersister<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> MemoryPersister<E> {
    /// Creates an empty log with head at 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LogState {
                entries: Vec::new(),
                head: 0,
            }),
        }
    }
}

impl<E: Entry> MemoryPersister<E> {
    /// Restores a log from already-validated records, e.g. during recovery
    /// by a durable persister layered on top.
    ///
    /// `head` is clamped up to the last entry's timestamp.
    #[must_use]
    pub fn from_records(entries: Vec<(IdxTs, E)>, head: i64) -> Self {
        let head = entries.last().map_or(head, |(idx_ts, _)| head.max(idx_ts.us));
        Self {
            state: RwLock::new(LogState { entries, head }),
        }
    }
}

impl<E: Entry> Persister for MemoryPersister<E> {
    type Entry = E;

    fn publish(&self, entry: E, us: Option<i64>) -> Result<IdxTs, PersistError> {
        let mut state = self.state.write();
        let us = match us {
            Some(supplied) => {
                if supplied <= state.head {
                    return Err(PersistError::InconsistentTimestamp {
                        supplied,
                        head: state.head,
                    });
                }
                supplied
            }
            None => now_us().max(state.head + 1),
        };
        let idx_ts = IdxTs::new(state.entries.len() as u64, us);
        state.entries.push((idx_ts, entry));
        state.head = us;
        Ok(idx_ts)
    }

    fn update_head(&self, us: Option<i64>) -> Result<i64, PersistError> {
        let mut state = self.state.write();
        match us {
            Some(supplied) => {
                let last_us = state.entries.last().map(|(idx_ts, _)| idx_ts.us);
                if supplied < state.head || last_us.is_some_and(|l| supplied <= l) {
                    return Err(PersistError::InconsistentTimestamp {
                        supplied,
                        head: state.head,
                    });
                }
                state.head = supplied;
            }
            None => state.head = state.head.max(now_us()),
        }
        Ok(state.head)
    }

    fn size(&self) -> u64 {
        self.state.read().entries.len() as u64
    }

    fn current_head(&self) -> i64 {
        self.state.read().head
    }

    fn head_and_last(&self) -> HeadAndLast {
        let state = self.state.read();
        HeadAndLast {
            head: state.head,
            last: state.entries.last().map(|(idx_ts, _)| *idx_ts),
        }
    }

    fn iterate(&self, begin: u64, end: u64) -> EntryIter<'_, E> {
        Box::new(MemoryIter {
            state: &self.state,
            next: begin,
            end,
            buffer: Vec::new(),
        })
    }

    fn index_range_by_timestamp_range(&self, from_us: i64, to_us: i64) -> (u64, u64) {
        let state = self.state.read();
        let begin = state.entries.partition_point(|(idx_ts, _)| idx_ts.us < from_us) as u64;
        let end = if to_us == 0 {
            state.entries.len() as u64
        } else {
            state.entries.partition_point(|(idx_ts, _)| idx_ts.us < to_us) as u64
        };
        (begin, end.max(begin))
    }
}

// ---------------------------------------------------------------------------
// MemoryIter
// ---------------------------------------------------------------------------

/// Chunked iterator over the in-memory log.
///
/// Holds the read lock only while refilling its buffer, never across yields,
/// so a slow consumer cannot starve the writer.
struct MemoryIter<'a, E> {
    state: &'a RwLock<LogState<E>>,
    next: u64,
    end: u64,
    buffer: Vec<(IdxTs, E)>,
}

impl<E: Entry> Iterator for MemoryIter<'_, E> {
    type Item = (IdxTs, E);

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() {
            if self.next >= self.end {
                return None;
            }
            let state = self.state.read();
            let available = state.entries.len() as u64;
            let upper = self.end.min(available).min(self.next + ITER_CHUNK as u64);
            if upper <= self.next {
                return None;
            }
            self.buffer = state.entries[self.next as usize..upper as usize].to_vec();
            self.buffer.reverse();
            self.next = upper;
        }
        self.buffer.pop()
    }
}
