//! The entry contract: what a type must provide to be published to a stream.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// FNV-1a over the type name; stable across runs and platforms.
fn fnv1a64(s: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for byte in s.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// A type that can be stored in a stream.
///
/// Entries are treated opaquely by the engine: they are cloned for delivery,
/// serialized for persistence and the HTTP feed, and described once per
/// stream through the schema hooks. The default hooks derive the type name
/// from the Rust path and a stable 64-bit id from that name; override them
/// when the exposed identity must not follow a refactor.
///
/// ```rust,ignore
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Trade { symbol: String, qty: u32 }
///
/// impl Entry for Trade {}
/// ```
pub trait Entry: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Short name of the entry type (the last path segment by default).
    #[must_use]
    fn type_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Stable 64-bit identifier of the entry type.
    #[must_use]
    fn type_id() -> u64 {
        fnv1a64(Self::type_name())
    }

    /// Structural description of the entry type as a JSON document.
    #[must_use]
    fn type_schema() -> serde_json::Value {
        serde_json::json!({ "name": Self::type_name(), "id": Self::type_id() })
    }

    /// Per-language schema renderings, keyed by language tag.
    ///
    /// Served verbatim by the HTTP `schema` endpoint for `format=<lang>`
    /// requests. Empty by default.
    #[must_use]
    fn language_schemas() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Name of the concrete case held by this value.
    ///
    /// Equals [`Entry::type_name`] for plain entries; variant entries
    /// override it to report the active case.
    #[must_use]
    fn case_name(&self) -> &'static str {
        Self::type_name()
    }
}
