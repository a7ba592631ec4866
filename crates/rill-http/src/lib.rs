//! # Rill HTTP
//!
//! Exposes a `rill` stream as a long-lived chunked HTTP feed, with the
//! control surface around it: size probe, schema documents, start
//! selection, bounded reads, and remote termination of subscriptions.
//!
//! ## Example
//!
//! ```rust,ignore
//! let stream = Arc::new(Stream::new(FilePersister::open("data.json")?));
//! let app = rill_http::router(Arc::clone(&stream));
//! axum::serve(listener, app).await?;
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod dialect;
pub mod endpoint;
pub mod params;

pub use dialect::{JsonDialect, UnknownDialect};
pub use endpoint::{
    router, serve, SchemaFormatNotFound, CURRENT_STREAM_SIZE_HEADER, SUBSCRIPTION_ID_HEADER,
};
pub use params::{FeedRequest, ParamError};
