//! Strictly monotonic epoch-microsecond clock.
//!
//! All timestamps in a stream come from one process-wide monotonic sequence:
//! two calls to [`now_us`] never return the same value and never go backward,
//! even if the wall clock is stepped underneath us. When the wall clock stalls
//! within a microsecond (or jumps back), the returned value is bumped to one
//! past the previous reading.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_US: AtomicI64 = AtomicI64::new(0);

/// Returns the current time as epoch microseconds, strictly greater than any
/// value previously returned by this function in this process.
#[must_use]
pub fn now_us() -> i64 {
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
        .unwrap_or(0);
    let mut prev = LAST_US.load(Ordering::Relaxed);
    loop {
        let next = wall.max(prev + 1);
        match LAST_US.compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => prev = observed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_us_strictly_increasing() {
        let mut prev = now_us();
        for _ in 0..10_000 {
            let next = now_us();
            assert!(next > prev, "clock went backward: {next} <= {prev}");
            prev = next;
        }
    }

    #[test]
    fn test_now_us_tracks_wall_clock() {
        let us = now_us();
        // Sanity: some time after 2020-01-01 and before 2100-01-01.
        assert!(us > 1_577_836_800_000_000);
        assert!(us < 4_102_444_800_000_000);
    }

    #[test]
    fn test_now_us_concurrent_uniqueness() {
        use std::collections::HashSet;
        use std::sync::mpsc;
        use std::thread;

        let (tx, rx) = mpsc::channel();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let tx = tx.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1_000 {
                    tx.send(now_us()).unwrap();
                }
            }));
        }
        drop(tx);
        let seen: Vec<i64> = rx.iter().collect();
        let unique: HashSet<i64> = seen.iter().copied().collect();
        assert_eq!(seen.len(), unique.len(), "duplicate timestamps issued");
        for h in handles {
            h.join().unwrap();
        }
    }
}
