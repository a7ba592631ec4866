//! File-backed persister.
//!
//! Record format, one record per line:
//!
//! ```text
//! {"index":0,"us":1234}\t{"field":"entry payload"}
//! {"head":1500}
//! ```
//!
//! Entry records carry the cursor JSON, a tab, and the entry JSON. Head-only
//! advances are sentinel records with no entry payload. Appends are written
//! and flushed before `publish`/`update_head` returns; `sync` forces the OS
//! buffers down as well.
//!
//! The full log is mirrored in memory for lock-free read-side snapshots, so
//! a reopened file pays one replay pass and then serves reads at memory
//! speed.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use rill_core::{Entry, EntryIter, HeadAndLast, IdxTs, MemoryPersister, PersistError, Persister};

/// Head-only sentinel record.
#[derive(Debug, Serialize, Deserialize)]
struct HeadRecord {
    head: i64,
}

// ---------------------------------------------------------------------------
// FilePersister
// ---------------------------------------------------------------------------

/// Append-only persister over a newline-delimited JSON record file.
pub struct FilePersister<E: Entry> {
    log: MemoryPersister<E>,
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl<E: Entry> FilePersister<E> {
    /// Opens (or creates) the record file at `path`, replaying any existing
    /// records.
    ///
    /// # Errors
    ///
    /// I/O failures, malformed records, or records that violate index
    /// density / timestamp monotonicity.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref().to_path_buf();
        let (entries, head) = match File::open(&path) {
            Ok(existing) => Self::replay(existing)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Vec::new(), 0),
            Err(e) => return Err(e.into()),
        };
        if !entries.is_empty() || head > 0 {
            tracing::info!(
                path = %path.display(),
                entries = entries.len(),
                head,
                "recovered stream log"
            );
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            log: MemoryPersister::from_records(entries, head),
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    /// Path of the record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Forces buffered records down to the OS and the disk.
    ///
    /// # Errors
    ///
    /// Underlying I/O failures.
    pub fn sync(&self) -> Result<(), PersistError> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    fn replay(file: File) -> Result<(Vec<(IdxTs, E)>, i64), PersistError> {
        let mut entries: Vec<(IdxTs, E)> = Vec::new();
        let mut head = 0i64;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            if let Some((cursor_json, entry_json)) = line.split_once('\t') {
                let idx_ts: IdxTs = serde_json::from_str(cursor_json)?;
                let entry: E = serde_json::from_str(entry_json)?;
                let expected = entries.len() as u64;
                if idx_ts.index != expected || idx_ts.us <= head {
                    return Err(PersistError::InconsistentTimestamp {
                        supplied: idx_ts.us,
                        head,
                    });
                }
                head = idx_ts.us;
                entries.push((idx_ts, entry));
            } else {
                let sentinel: HeadRecord = serde_json::from_str(&line)?;
                head = head.max(sentinel.head);
            }
        }
        Ok((entries, head))
    }

    fn append_line(&self, line: &str) -> Result<(), PersistError> {
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl<E: Entry> Persister for FilePersister<E> {
    type Entry = E;

    fn publish(&self, entry: E, us: Option<i64>) -> Result<IdxTs, PersistError> {
        // Serialize first so codec failures precede any state change.
        let entry_json = serde_json::to_string(&entry)?;
        let idx_ts = self.log.publish(entry, us)?;
        let cursor_json = serde_json::to_string(&idx_ts)?;
        self.append_line(&format!("{cursor_json}\t{entry_json}"))?;
        Ok(idx_ts)
    }

    fn update_head(&self, us: Option<i64>) -> Result<i64, PersistError> {
        let head = self.log.update_head(us)?;
        let sentinel = serde_json::to_string(&HeadRecord { head })?;
        self.append_line(&sentinel)?;
        Ok(head)
    }

    fn size(&self) -> u64 {
        self.log.size()
    }

    fn current_head(&self) -> i64 {
        self.log.current_head()
    }

    fn head_and_last(&self) -> HeadAndLast {
        self.log.head_and_last()
    }

    fn iterate(&self, begin: u64, end: u64) -> EntryIter<'_, E> {
        self.log.iterate(begin, end)
    }

    fn index_range_by_timestamp_range(&self, from_us: i64, to_us: i64) -> (u64, u64) {
        self.log.index_range_by_timestamp_range(from_us, to_us)
    }
}

impl<E: Entry> std::fmt::Debug for FilePersister<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePersister")
            .field("path", &self.path)
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        payload: String,
    }

    impl Entry for Record {}

    fn record(payload: &str) -> Record {
        Record {
            payload: payload.to_string(),
        }
    }

    #[test]
    fn test_publish_then_reopen_reconstructs_the_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");

        let (a, b) = {
            let persister: FilePersister<Record> = FilePersister::open(&path).unwrap();
            let a = persister.publish(record("a"), None).unwrap();
            let b = persister.publish(record("b"), None).unwrap();
            persister.sync().unwrap();
            (a, b)
        };

        let reopened: FilePersister<Record> = FilePersister::open(&path).unwrap();
        assert_eq!(reopened.size(), 2);
        assert_eq!(reopened.current_head(), b.us);
        let replayed: Vec<(IdxTs, Record)> = reopened.iterate(0, 2).collect();
        assert_eq!(replayed[0], (a, record("a")));
        assert_eq!(replayed[1], (b, record("b")));
    }

    #[test]
    fn test_head_sentinels_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");

        let head = {
            let persister: FilePersister<Record> = FilePersister::open(&path).unwrap();
            persister.publish(record("a"), Some(100)).unwrap();
            persister.update_head(Some(250)).unwrap()
        };
        assert_eq!(head, 250);

        let reopened: FilePersister<Record> = FilePersister::open(&path).unwrap();
        let snapshot = reopened.head_and_last();
        assert_eq!(snapshot.head, 250);
        assert_eq!(snapshot.last, Some(IdxTs::new(0, 100)));

        // The recovered cursor keeps advancing from where it left off.
        let err = reopened.publish(record("late"), Some(250)).unwrap_err();
        assert!(matches!(err, PersistError::InconsistentTimestamp { .. }));
        let next = reopened.publish(record("next"), Some(300)).unwrap();
        assert_eq!(next, IdxTs::new(1, 300));
    }

    #[test]
    fn test_explicit_timestamps_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");

        {
            let persister: FilePersister<Record> = FilePersister::open(&path).unwrap();
            for (i, us) in [100i64, 200, 300].iter().enumerate() {
                persister
                    .publish(record(&format!("e{i}")), Some(*us))
                    .unwrap();
            }
        }

        let reopened: FilePersister<Record> = FilePersister::open(&path).unwrap();
        assert_eq!(reopened.index_range_by_timestamp_range(200, 0), (1, 3));
        assert_eq!(reopened.index_range_by_timestamp_range(101, 300), (1, 2));
    }

    #[test]
    fn test_records_are_newline_terminated_json_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");

        let persister: FilePersister<Record> = FilePersister::open(&path).unwrap();
        persister.publish(record("x"), Some(10)).unwrap();
        persister.update_head(Some(20)).unwrap();
        persister.sync().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let (cursor, entry) = lines[0].split_once('\t').unwrap();
        assert_eq!(cursor, r#"{"index":0,"us":10}"#);
        assert_eq!(entry, r#"{"payload":"x"}"#);
        assert_eq!(lines[1], r#"{"head":20}"#);
        assert!(raw.ends_with('\n'));
    }

    #[test]
    fn test_corrupt_record_fails_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "not json at all\n").unwrap();
        let result: Result<FilePersister<Record>, _> = FilePersister::open(&path);
        assert!(matches!(result, Err(PersistError::Codec(_))));
    }

    #[test]
    fn test_nonmonotonic_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(
            &path,
            concat!(
                "{\"index\":0,\"us\":100}\t{\"payload\":\"a\"}\n",
                "{\"index\":1,\"us\":100}\t{\"payload\":\"b\"}\n",
            ),
        )
        .unwrap();
        let result: Result<FilePersister<Record>, _> = FilePersister::open(&path);
        assert!(matches!(
            result,
            Err(PersistError::InconsistentTimestamp { .. })
        ));
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fresh.json");
        let persister: FilePersister<Record> = FilePersister::open(&path).unwrap();
        assert_eq!(persister.size(), 0);
        assert_eq!(persister.current_head(), 0);
        assert_eq!(
            persister.head_and_last(),
            HeadAndLast { head: 0, last: None }
        );
    }
}
