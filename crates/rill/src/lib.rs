//! # Rill
//!
//! Persistent, immutable, strictly-ordered, append-only typed event logs
//! with live fan-out to many concurrent subscribers, durable file-backed
//! persistence, and a chunked HTTP feed.
//!
//! This umbrella crate re-exports the public surface of the engine
//! (`rill-core`), the durable persister (`rill-storage`), and the HTTP
//! surface (`rill-http`).
//!
//! ## Example
//!
//! ```rust,ignore
//! use rill::{Entry, EntryResponse, FilePersister, Stream};
//!
//! let stream = Stream::new(FilePersister::<MyEntry>::open("data.json")?);
//! let scope = stream.subscribe(|entry: MyEntry, idx_ts, _last| {
//!     println!("{idx_ts}: {entry:?}");
//!     EntryResponse::Continue
//! })?;
//! stream.publish(MyEntry::default())?;
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub use rill_core::*;
pub use rill_storage::FilePersister;

/// The HTTP feed surface.
pub use rill_http as http;
