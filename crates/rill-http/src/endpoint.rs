//! The feed endpoint: one stream exposed as a long-lived chunked feed.
//!
//! A GET with no control options opens a subscription: a dedicated worker
//! thread drains the backlog from the resolved start index and then follows
//! the live stream, pushing dialect-rendered frames through a bounded
//! channel into the chunked response body. The worker closes on peer
//! disconnect, after `n` entries, at end-of-stream under `nowait`, by
//! `terminate=<id>`, or when the stream itself shuts down.

use std::collections::HashMap;
use std::convert::Infallible;
use std::marker::PhantomData;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use rill_core::{
    now_us, Entry, EntryResponse, IdxTs, Persister, Stream, StreamSubscriber, SubscriptionId,
};

use crate::dialect::JsonDialect;
use crate::params::FeedRequest;

/// Header carrying the stream size for `sizeonly` requests.
pub const CURRENT_STREAM_SIZE_HEADER: &str = "X-Current-Stream-Size";

/// Header carrying the id of a freshly opened subscription, usable with
/// `terminate=<id>`.
pub const SUBSCRIPTION_ID_HEADER: &str = "X-Current-Stream-Subscription-Id";

/// Queued frames between a subscriber worker and the response body. A full
/// queue blocks the worker, which is the transport backpressure the feed
/// wants.
const FEED_CHANNEL_CAPACITY: usize = 64;

/// 404 body for an unknown schema format.
#[derive(Debug, Serialize)]
pub struct SchemaFormatNotFound {
    /// Human-readable error.
    pub error: String,
    /// The format that was requested.
    pub unsupported_format_requested: Option<String>,
}

/// Builds a router serving the stream's feed at `/`.
pub fn router<P: Persister>(stream: Arc<Stream<P>>) -> Router {
    Router::new().route("/", any(serve::<P>)).with_state(stream)
}

// ---------------------------------------------------------------------------
// ChunkedFeed
// ---------------------------------------------------------------------------

/// Subscriber adapter writing dialect-rendered frames into the response
/// channel.
struct ChunkedFeed<E> {
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
    dialect: JsonDialect,
    remaining: Option<u64>,
    no_wait: bool,
    _entry: PhantomData<fn(E)>,
}

impl<E: Entry> StreamSubscriber<E> for ChunkedFeed<E> {
    fn on_entry(&mut self, entry: E, idx_ts: IdxTs, last: IdxTs) -> EntryResponse {
        let frame = match self.dialect.frame_entry(idx_ts, &entry) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::warn!(%error, "feed frame serialization failed");
                return EntryResponse::Done;
            }
        };
        // A send failure means the HTTP peer is gone.
        if self.tx.blocking_send(Ok(frame)).is_err() {
            return EntryResponse::Done;
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                return EntryResponse::Done;
            }
        }
        if self.no_wait && idx_ts.index == last.index {
            return EntryResponse::Done;
        }
        EntryResponse::Continue
    }

    fn on_head(&mut self, _head_us: i64) -> EntryResponse {
        if self.no_wait {
            EntryResponse::Done
        } else {
            EntryResponse::Continue
        }
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Serves one feed request; see the module docs for the grammar.
pub async fn serve<P: Persister>(
    State(stream): State<Arc<Stream<P>>>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let dialect = match JsonDialect::from_query(query.get("json").map(String::as_str)) {
        Ok(dialect) => dialect,
        Err(_) => {
            return (
                StatusCode::NOT_FOUND,
                "The `?json` parameter is invalid, legal values are `js`, `fs`, or omit the parameter.\n",
            )
                .into_response();
        }
    };

    let request = match FeedRequest::parse(&query) {
        Ok(request) => request,
        Err(error) => return (StatusCode::BAD_REQUEST, format!("{error}\n")).into_response(),
    };

    if stream.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    if let Some(id) = &request.terminate {
        let found = stream.terminate_http_subscription(&SubscriptionId::new(id.clone()));
        tracing::debug!(subscription = %id, found, "terminate requested over http");
        return if found {
            StatusCode::OK.into_response()
        } else {
            StatusCode::NOT_FOUND.into_response()
        };
    }

    if method != Method::GET && method != Method::HEAD {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.\n").into_response();
    }

    let stream_size = stream.persister().size();

    if request.size_only {
        let size_text = stream_size.to_string();
        let body = if method == Method::GET {
            format!("{size_text}\n")
        } else {
            String::new()
        };
        return (
            StatusCode::OK,
            [(CURRENT_STREAM_SIZE_HEADER, size_text)],
            body,
        )
            .into_response();
    }

    if request.schema {
        return schema_response(&stream, request.schema_format.as_deref());
    }

    let begin_idx = request.resolve_begin_index(stream_size, now_us(), |from_us| {
        stream
            .persister()
            .index_range_by_timestamp_range(from_us, 0)
            .0
    });

    if request.no_wait && begin_idx >= stream_size {
        return StatusCode::OK.into_response();
    }
    if request.n == Some(0) {
        // Zero entries requested: satisfied trivially.
        return StatusCode::OK.into_response();
    }

    let id = SubscriptionId::new(Uuid::new_v4().simple().to_string());
    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(FEED_CHANNEL_CAPACITY);
    let feed = ChunkedFeed::<P::Entry> {
        tx,
        dialect,
        remaining: request.n,
        no_wait: request.no_wait,
        _entry: PhantomData,
    };

    match stream.subscribe_http(id.clone(), feed, begin_idx) {
        Ok(()) => {
            tracing::debug!(subscription = %id, begin_idx, "http subscription opened");
            (
                StatusCode::OK,
                [
                    ("content-type", "application/json".to_string()),
                    (SUBSCRIPTION_ID_HEADER, id.to_string()),
                ],
                Body::from_stream(ReceiverStream::new(rx)),
            )
                .into_response()
        }
        Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

fn schema_response<P: Persister>(stream: &Stream<P>, format: Option<&str>) -> Response {
    let schema = stream.schema();
    match format {
        None => Json(schema.clone()).into_response(),
        Some("simple") => Json(schema.simple(stream.namespace())).into_response(),
        Some(language) => match schema.language.get(language) {
            Some(text) => text.clone().into_response(),
            None => (
                StatusCode::NOT_FOUND,
                Json(SchemaFormatNotFound {
                    error: "Unsupported schema format requested.".to_string(),
                    unsupported_format_requested: Some(language.to_string()),
                }),
            )
                .into_response(),
        },
    }
}
