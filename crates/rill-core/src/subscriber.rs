//! The subscriber contract and the per-thread delivery loop.
//!
//! Each subscription runs [`run_subscriber_loop`] on its own worker thread.
//! The loop drains the backlog from the chosen start index, forwards
//! head-only advances once at least one entry has been delivered, and parks
//! on the stream's notifier when caught up. Termination is cooperative: the
//! signal is dispatched to the subscriber exactly once, and a `Wait` answer
//! keeps the loop draining until the subscriber returns `Done` from a
//! delivery callback.

use crate::data::StreamData;
use crate::log::IdxTs;
use crate::notify::TerminateSignal;
use crate::persist::Persister;
use crate::variant::VariantCase;

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Subscriber's answer to a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryResponse {
    /// Keep the subscription running.
    Continue,
    /// Stop the subscription; the worker thread exits.
    Done,
}

/// Subscriber's answer to a termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationResponse {
    /// Keep delivering; the subscriber will decide when to stop.
    Wait,
    /// Stop immediately.
    Terminate,
}

// ---------------------------------------------------------------------------
// StreamSubscriber
// ---------------------------------------------------------------------------

/// Capability bundle consumed by the subscriber loop.
///
/// `T` is the subscribed-to case type: the full entry type for unfiltered
/// subscriptions, or a single case of a variant entry.
pub trait StreamSubscriber<T>: Send {
    /// Receives one entry with its own cursor and the stream's latest cursor.
    fn on_entry(&mut self, entry: T, idx_ts: IdxTs, last: IdxTs) -> EntryResponse;

    /// Receives a head-only advance.
    fn on_head(&mut self, head_us: i64) -> EntryResponse {
        let _ = head_us;
        EntryResponse::Continue
    }

    /// Receives the termination request, dispatched at most once.
    fn on_terminate(&mut self) -> TerminationResponse {
        TerminationResponse::Terminate
    }

    /// Reports an entry that did not match the subscribed case.
    fn on_filtered_out(&mut self) -> EntryResponse {
        EntryResponse::Continue
    }
}

// Closures subscribe to the common case: entries only, default everything
// else.
impl<T, F> StreamSubscriber<T> for F
where
    F: FnMut(T, IdxTs, IdxTs) -> EntryResponse + Send,
{
    fn on_entry(&mut self, entry: T, idx_ts: IdxTs, last: IdxTs) -> EntryResponse {
        self(entry, idx_ts, last)
    }
}

// ---------------------------------------------------------------------------
// Subscriber loop
// ---------------------------------------------------------------------------

/// Checks the termination signal, dispatching it to the subscriber on the
/// first observation. Returns `true` when the loop must exit.
fn terminate_check<T, S: StreamSubscriber<T>>(
    signal: &TerminateSignal,
    dispatched: &mut bool,
    subscriber: &mut S,
) -> bool {
    if !*dispatched && signal.is_raised() {
        *dispatched = true;
        if subscriber.on_terminate() == TerminationResponse::Terminate {
            return true;
        }
    }
    false
}

/// The per-subscription state machine; runs until the subscriber is done or
/// terminated.
pub(crate) fn run_subscriber_loop<P, C, S>(
    data: &StreamData<P>,
    signal: &TerminateSignal,
    subscriber: &mut S,
    begin_idx: u64,
) where
    P: Persister,
    C: VariantCase<P::Entry>,
    S: StreamSubscriber<C>,
{
    let mut observed_head = -1i64;
    let mut next_index = begin_idx;
    let mut terminate_dispatched = false;

    loop {
        if terminate_check(signal, &mut terminate_dispatched, subscriber) {
            return;
        }

        let snapshot = data.persister.head_and_last();
        let size = snapshot.size();

        if snapshot.head > observed_head {
            if size > next_index {
                for (idx_ts, entry) in data.persister.iterate(next_index, size) {
                    if terminate_check(signal, &mut terminate_dispatched, subscriber) {
                        return;
                    }
                    // The "latest" cursor is re-read per entry: the stream
                    // may have grown while this backlog drains.
                    let latest = data.persister.head_and_last().last.unwrap_or(idx_ts);
                    let response = match C::extract(entry) {
                        Ok(case) => subscriber.on_entry(case, idx_ts, latest),
                        Err(_) => subscriber.on_filtered_out(),
                    };
                    if response == EntryResponse::Done {
                        return;
                    }
                }
                next_index = size;
                if let Some(last) = snapshot.last {
                    observed_head = last.us;
                }
            }
            // Head-only advances are withheld until the first entry past the
            // start index has been delivered.
            if size > begin_idx
                && snapshot.head > observed_head
                && subscriber.on_head(snapshot.head) == EntryResponse::Done
            {
                return;
            }
            observed_head = snapshot.head;
        } else {
            let mut guard = data.publish_lock.lock();
            data.notifier.wait_until(&mut guard, signal, || {
                data.persister.size() > next_index
                    || (next_index > begin_idx && data.persister.current_head() > observed_head)
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        terminate_answer: TerminationResponse,
        terminated: u32,
    }

    impl StreamSubscriber<u32> for Recorder {
        fn on_entry(&mut self, _entry: u32, _idx_ts: IdxTs, _last: IdxTs) -> EntryResponse {
            EntryResponse::Continue
        }

        fn on_terminate(&mut self) -> TerminationResponse {
            self.terminated += 1;
            self.terminate_answer
        }
    }

    #[test]
    fn test_terminate_dispatched_at_most_once() {
        let signal = TerminateSignal::new();
        signal.raise();
        let mut dispatched = false;
        let mut subscriber = Recorder {
            terminate_answer: TerminationResponse::Wait,
            terminated: 0,
        };

        assert!(!terminate_check(&signal, &mut dispatched, &mut subscriber));
        assert!(!terminate_check(&signal, &mut dispatched, &mut subscriber));
        assert_eq!(subscriber.terminated, 1);
    }

    #[test]
    fn test_terminate_answer_terminate_exits() {
        let signal = TerminateSignal::new();
        signal.raise();
        let mut dispatched = false;
        let mut subscriber = Recorder {
            terminate_answer: TerminationResponse::Terminate,
            terminated: 0,
        };
        assert!(terminate_check(&signal, &mut dispatched, &mut subscriber));
    }

    #[test]
    fn test_unraised_signal_is_not_dispatched() {
        let signal = TerminateSignal::new();
        let mut dispatched = false;
        let mut subscriber = Recorder {
            terminate_answer: TerminationResponse::Terminate,
            terminated: 0,
        };
        assert!(!terminate_check(&signal, &mut dispatched, &mut subscriber));
        assert_eq!(subscriber.terminated, 0);
    }
}
