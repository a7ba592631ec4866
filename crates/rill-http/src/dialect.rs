//! JSON dialects for feed frames.
//!
//! Dialects change the rendering of a delivered record, never its order:
//!
//! - **Standard** (default, also the durable file format): cursor JSON, a
//!   tab, the entry JSON.
//! - **Minimal** (`json=js`): the bare entry JSON, one object per line.
//! - **Newtonsoft F#** (`json=fs`): each entry wrapped as
//!   `{"Case": <case name>, "Fields": [<entry>]}`.

use bytes::Bytes;
use rill_core::{Entry, IdxTs};

/// Selected JSON rendering of feed frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonDialect {
    /// Cursor-prefixed records; the durable format.
    #[default]
    Standard,
    /// Minimalistic: entry JSON only.
    Minimal,
    /// Newtonsoft F# case wrapping.
    NewtonsoftFSharp,
}

/// The `json=` query value named no known dialect.
#[derive(Debug, thiserror::Error)]
#[error("unknown json dialect `{0}`")]
pub struct UnknownDialect(pub String);

impl JsonDialect {
    /// Maps the `json=` query value to a dialect; absent means Standard.
    ///
    /// # Errors
    ///
    /// [`UnknownDialect`] for any value other than `js` or `fs`.
    pub fn from_query(value: Option<&str>) -> Result<Self, UnknownDialect> {
        match value {
            None => Ok(Self::Standard),
            Some("js") => Ok(Self::Minimal),
            Some("fs") => Ok(Self::NewtonsoftFSharp),
            Some(other) => Err(UnknownDialect(other.to_string())),
        }
    }

    /// Renders one newline-terminated feed frame.
    ///
    /// # Errors
    ///
    /// Serialization failures from the entry's `Serialize` impl.
    pub fn frame_entry<E: Entry>(
        self,
        idx_ts: IdxTs,
        entry: &E,
    ) -> Result<Bytes, serde_json::Error> {
        let frame = match self {
            Self::Standard => format!(
                "{}\t{}\n",
                serde_json::to_string(&idx_ts)?,
                serde_json::to_string(entry)?
            ),
            Self::Minimal => format!("{}\n", serde_json::to_string(entry)?),
            Self::NewtonsoftFSharp => {
                let wrapped = serde_json::json!({
                    "Case": entry.case_name(),
                    "Fields": [serde_json::to_value(entry)?],
                });
                format!("{wrapped}\n")
            }
        };
        Ok(Bytes::from(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Ping {
        n: u32,
    }

    impl Entry for Ping {}

    #[test]
    fn test_from_query_values() {
        assert_eq!(JsonDialect::from_query(None).unwrap(), JsonDialect::Standard);
        assert_eq!(
            JsonDialect::from_query(Some("js")).unwrap(),
            JsonDialect::Minimal
        );
        assert_eq!(
            JsonDialect::from_query(Some("fs")).unwrap(),
            JsonDialect::NewtonsoftFSharp
        );
        let err = JsonDialect::from_query(Some("xml")).unwrap_err();
        assert_eq!(err.0, "xml");
    }

    #[test]
    fn test_standard_frame_matches_durable_format() {
        let frame = JsonDialect::Standard
            .frame_entry(IdxTs::new(2, 77), &Ping { n: 9 })
            .unwrap();
        assert_eq!(
            std::str::from_utf8(&frame).unwrap(),
            "{\"index\":2,\"us\":77}\t{\"n\":9}\n"
        );
    }

    #[test]
    fn test_minimal_frame_is_bare_entry() {
        let frame = JsonDialect::Minimal
            .frame_entry(IdxTs::new(0, 1), &Ping { n: 9 })
            .unwrap();
        assert_eq!(std::str::from_utf8(&frame).unwrap(), "{\"n\":9}\n");
    }

    #[test]
    fn test_fsharp_frame_wraps_case() {
        let frame = JsonDialect::NewtonsoftFSharp
            .frame_entry(IdxTs::new(0, 1), &Ping { n: 9 })
            .unwrap();
        let parsed: serde_json::Value =
            serde_json::from_slice(&frame).unwrap();
        assert_eq!(parsed["Case"], "Ping");
        assert_eq!(parsed["Fields"][0]["n"], 9);
    }
}
