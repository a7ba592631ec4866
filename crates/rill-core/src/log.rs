//! Core value types of the log: publication cursors and stream naming.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// IdxTs
// ---------------------------------------------------------------------------

/// The `(index, timestamp)` pair assigned to an entry at publish time.
///
/// Indices are dense and 0-based. Timestamps are epoch microseconds and
/// strictly increase across all entries and head advances of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdxTs {
    /// 0-based position of the entry in the log.
    pub index: u64,
    /// Epoch-microsecond publication timestamp.
    pub us: i64,
}

impl IdxTs {
    /// Creates a cursor from its two components.
    #[must_use]
    pub fn new(index: u64, us: i64) -> Self {
        Self { index, us }
    }
}

impl std::fmt::Display for IdxTs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.index, self.us)
    }
}

// ---------------------------------------------------------------------------
// HeadAndLast
// ---------------------------------------------------------------------------

/// Atomic snapshot of a stream's authoritative cursor.
///
/// `head` is always `>= last.us` when `last` exists; it may run ahead of the
/// last entry when the head has been advanced without a publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadAndLast {
    /// Current head timestamp in epoch microseconds.
    pub head: i64,
    /// Cursor of the most recently published entry, if any.
    pub last: Option<IdxTs>,
}

impl HeadAndLast {
    /// Number of entries implied by this snapshot.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.last.map_or(0, |l| l.index + 1)
    }
}

// ---------------------------------------------------------------------------
// StreamNamespace
// ---------------------------------------------------------------------------

/// Default schema namespace used when the caller does not supply one.
pub const DEFAULT_NAMESPACE_NAME: &str = "RillSchema";

/// Default exposed entry name within the schema namespace.
pub const DEFAULT_ENTRY_NAME: &str = "TopLevelEntry";

/// The `(namespace, entry name)` pair under which a stream's schema is
/// exposed to external consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamNamespace {
    /// Namespace the entry type is exposed under.
    pub namespace: String,
    /// Name the entry type is exposed as.
    pub entry_name: String,
}

impl StreamNamespace {
    /// Creates a namespace from explicit components.
    #[must_use]
    pub fn new(namespace: impl Into<String>, entry_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entry_name: entry_name.into(),
        }
    }
}

impl Default for StreamNamespace {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE_NAME, DEFAULT_ENTRY_NAME)
    }
}
