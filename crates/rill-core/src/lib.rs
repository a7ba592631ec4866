//! # Rill Core
//!
//! The engine behind `rill` streams: persistent, immutable, strictly-ordered,
//! append-only typed event logs with live fan-out to many concurrent
//! subscribers.
//!
//! This crate provides:
//! - **Stream facade**: construction, publishing, subscription, graceful
//!   shutdown
//! - **Publisher handle**: the transferable singleton write capability
//! - **Subscriber fabric**: per-subscription worker threads coordinated by a
//!   condvar-style notifier with per-waiter cancellation
//! - **Persister seam**: the append-only storage contract plus the default
//!   in-memory implementation
//! - **Case dispatch**: typed subscriptions to single cases of variant
//!   entries
//!
//! ## Example
//!
//! ```rust,ignore
//! use rill_core::{EntryResponse, Stream};
//!
//! let stream = Stream::<_>::in_memory();
//! let scope = stream.subscribe(|entry: MyEntry, idx_ts, _last| {
//!     println!("{idx_ts}: {entry:?}");
//!     EntryResponse::Continue
//! })?;
//! stream.publish(MyEntry::default())?;
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod data;
pub mod entry;
pub mod error;
pub mod log;
pub mod memory;
pub mod notify;
pub mod persist;
pub mod publisher;
pub mod schema;
pub mod scope;
pub mod stream;
pub mod subscriber;
pub mod variant;

pub use clock::now_us;
pub use data::{HttpSubscriptions, StreamData, SubscriptionId};
pub use entry::Entry;
pub use error::StreamError;
pub use log::{HeadAndLast, IdxTs, StreamNamespace, DEFAULT_ENTRY_NAME, DEFAULT_NAMESPACE_NAME};
pub use memory::MemoryPersister;
pub use notify::{Notifier, TerminateSignal};
pub use persist::{EntryIter, PersistError, Persister};
pub use publisher::{PublisherAcquirer, StreamPublisher};
pub use schema::{SchemaDescriptor, SimpleSchema};
pub use scope::{DoneCallback, SubscriberScope};
pub use stream::{Stream, StreamDataAuthority};
pub use subscriber::{EntryResponse, StreamSubscriber, TerminationResponse};
pub use variant::{narrow, VariantCase, VariantError, VariantSlot};

#[doc(hidden)]
pub use serde_json as __serde_json;
