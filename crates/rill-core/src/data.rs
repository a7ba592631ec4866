//! Shared per-stream state.
//!
//! One [`StreamData`] exists per stream. The facade is the only strong
//! owner at rest; every subscriber worker thread holds a strong reference
//! for exactly its own lifetime, and all handles (publisher, scopes) hold
//! weak ones. Teardown raises every registered worker signal and then waits
//! for the strong count to come back down to one.
//!
//! Locking order: the HTTP registry mutex may be held while acquiring the
//! publish mutex (terminate paths do this); the reverse order is forbidden.
//! The notifier's internal roster lock nests under either.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::log::StreamNamespace;
use crate::notify::Notifier;
use crate::persist::Persister;
use crate::schema::SchemaDescriptor;
use crate::scope::SubscriberScope;

// ---------------------------------------------------------------------------
// SubscriptionId
// ---------------------------------------------------------------------------

/// Opaque identifier of an HTTP subscription, used by `terminate=<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Wraps an identifier string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// HttpSubscriptions
// ---------------------------------------------------------------------------

/// Registry of live HTTP subscriptions, shared independently of the rest of
/// the stream state so deferred erasers can outlive it.
pub struct HttpSubscriptions<P: Persister> {
    pub(crate) map: Mutex<HashMap<SubscriptionId, SubscriberScope<P>>>,
}

impl<P: Persister> HttpSubscriptions<P> {
    pub(crate) fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }
}

// ---------------------------------------------------------------------------
// StreamData
// ---------------------------------------------------------------------------

/// The shared state behind one stream.
pub struct StreamData<P: Persister> {
    pub(crate) persister: P,
    pub(crate) publish_lock: Mutex<()>,
    pub(crate) notifier: Notifier,
    pub(crate) http_subscriptions: Arc<HttpSubscriptions<P>>,
    pub(crate) schema: SchemaDescriptor,
    pub(crate) namespace: StreamNamespace,
    pub(crate) shutting_down: AtomicBool,
}

impl<P: Persister> StreamData<P> {
    pub(crate) fn new(persister: P, namespace: StreamNamespace, schema: SchemaDescriptor) -> Self {
        Self {
            persister,
            publish_lock: Mutex::new(()),
            notifier: Notifier::new(),
            http_subscriptions: Arc::new(HttpSubscriptions::new()),
            schema,
            namespace,
            shutting_down: AtomicBool::new(false),
        }
    }

    /// The persister behind this stream.
    #[must_use]
    pub fn persister(&self) -> &P {
        &self.persister
    }

    /// Schema descriptor computed at construction.
    #[must_use]
    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    /// Namespace the schema is exposed under.
    #[must_use]
    pub fn namespace(&self) -> &StreamNamespace {
        &self.namespace
    }

    /// Whether teardown has begun.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub(crate) fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }
}
