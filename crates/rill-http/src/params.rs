//! The feed endpoint's query-parameter grammar.
//!
//! Flags are recognized by presence (`?sizeonly`, `?nowait`, `?schema`);
//! valued options parse strictly, and a malformed number is a bad request
//! rather than a silent default.

use std::collections::HashMap;

/// A query parameter that did not parse.
#[derive(Debug, thiserror::Error)]
#[error("invalid value for `{param}`: {value}")]
pub struct ParamError {
    /// Offending parameter name.
    pub param: &'static str,
    /// Offending raw value.
    pub value: String,
}

/// Parsed subscription intent of one feed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedRequest {
    /// `terminate=<id>`: terminate that subscription instead of serving.
    pub terminate: Option<String>,
    /// `sizeonly`: report the current size and close.
    pub size_only: bool,
    /// `schema`: serve the schema document instead of entries.
    pub schema: bool,
    /// `format=<fmt>`: schema format selector.
    pub schema_format: Option<String>,
    /// `i=<N>`: start index.
    pub i: u64,
    /// `tail=<N>`: start `N` entries before the end (`u64::MAX` = at the end).
    pub tail: Option<u64>,
    /// `recent=<µs>`: start at `now - µs`.
    pub recent_us: Option<i64>,
    /// `since=<µs>`: start at an absolute timestamp.
    pub since_us: Option<i64>,
    /// `n=<K>`: deliver at most `K` entries, then close.
    pub n: Option<u64>,
    /// `nowait`: close immediately instead of waiting at the end.
    pub no_wait: bool,
    /// `json=<dialect>`: raw dialect selector, validated separately.
    pub json: Option<String>,
}

fn parse_number<T: std::str::FromStr>(
    query: &HashMap<String, String>,
    param: &'static str,
) -> Result<Option<T>, ParamError> {
    match query.get(param) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| ParamError {
            param,
            value: raw.clone(),
        }),
    }
}

impl FeedRequest {
    /// Parses the decoded query pairs of one request.
    ///
    /// # Errors
    ///
    /// [`ParamError`] when a numeric option does not parse.
    pub fn parse(query: &HashMap<String, String>) -> Result<Self, ParamError> {
        Ok(Self {
            terminate: query.get("terminate").cloned(),
            size_only: query.contains_key("sizeonly"),
            schema: query.contains_key("schema"),
            schema_format: query.get("format").cloned(),
            i: parse_number(query, "i")?.unwrap_or(0),
            tail: parse_number(query, "tail")?,
            recent_us: parse_number(query, "recent")?,
            since_us: parse_number(query, "since")?,
            n: parse_number(query, "n")?,
            no_wait: query.contains_key("nowait"),
            json: query.get("json").cloned(),
        })
    }

    /// Resolves the start index against the current stream size.
    ///
    /// Selection precedence is `tail` > `recent` > `since` > `i`; a
    /// timestamp-derived start combines with `i` by taking the max.
    /// `first_index_at` maps a timestamp to the first index at or after it.
    pub fn resolve_begin_index(
        &self,
        stream_size: u64,
        now_us: i64,
        first_index_at: impl FnOnce(i64) -> u64,
    ) -> u64 {
        let mut begin = match self.tail {
            Some(u64::MAX) => return stream_size,
            Some(tail) => self.i.max(stream_size.saturating_sub(tail)),
            None => self.i,
        };
        let from_ts = if self.tail.is_some() {
            0
        } else if let Some(recent) = self.recent_us {
            now_us.saturating_sub(recent)
        } else {
            self.since_us.unwrap_or(0)
        };
        if from_ts > 0 {
            begin = begin.max(first_index_at(from_ts).min(stream_size));
        }
        begin
    }
}
