//! Event Bus
//!
//! In-process publish/subscribe plus single-handler request/reply over one
//! string topic namespace.
//!
//! ```text
//! publish(topic, payload)  ──▶ every subscriber of topic, in registration order
//! request(topic, payload)  ──▶ the one handler of topic ──▶ reply
//! ```
//!
//! [`EventBus`] is a cheap handle; clones share the same tables. Tables sit
//! behind `parking_lot` locks that are only held while taking a snapshot, never
//! across an await.

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

// ============================================================================
// Errors
// ============================================================================

/// Errors returned by [`EventBus::request`]
#[derive(Error, Debug)]
pub enum BusError {
    /// Nobody answers requests on this topic
    #[error("No handler registered for topic '{topic}'")]
    NoHandlerRegistered { topic: String },

    /// The handler ran and failed; `source` is its error, unmodified
    #[error("Handler for topic '{topic}' failed: {source}")]
    Handler {
        topic: String,
        #[source]
        source: anyhow::Error,
    },
}

impl BusError {
    /// Topic the failed request was sent on
    pub fn topic(&self) -> &str {
        match self {
            Self::NoHandlerRegistered { topic } | Self::Handler { topic, .. } => topic,
        }
    }

    /// Recover the handler's own error type, if it is `E`
    pub fn handler_error<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::Handler { source, .. } => source.downcast_ref::<E>(),
            Self::NoHandlerRegistered { .. } => None,
        }
    }
}

// ============================================================================
// Subscriber and handler traits
// ============================================================================

/// Passive listener on a topic.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Observe one published payload. Errors are logged by the bus and do not
    /// stop delivery to other subscribers.
    async fn on_event(&self, topic: &str, payload: &Value) -> anyhow::Result<()>;
}

/// Reply-capable handler; at most one per topic.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Answer one request.
    async fn handle(&self, topic: &str, payload: Value) -> anyhow::Result<Value>;
}

struct FnSubscriber<F>(F);

#[async_trait]
impl<F, Fut> Subscriber for FnSubscriber<F>
where
    F: Fn(String, Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn on_event(&self, topic: &str, payload: &Value) -> anyhow::Result<()> {
        (self.0)(topic.to_string(), payload.clone()).await
    }
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(String, Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn handle(&self, topic: &str, payload: Value) -> anyhow::Result<Value> {
        (self.0)(topic.to_string(), payload).await
    }
}

/// Wrap an async closure as a [`Subscriber`]
pub fn subscriber_fn<F, Fut>(f: F) -> Arc<dyn Subscriber>
where
    F: Fn(String, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnSubscriber(f))
}

/// Wrap an async closure as a [`RequestHandler`]
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn RequestHandler>
where
    F: Fn(String, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

// ============================================================================
// Bus
// ============================================================================

/// Handle returned by [`EventBus::subscribe`]; never reused within a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Raw id value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Outcome of one [`EventBus::publish`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that returned `Ok`
    pub delivered: usize,
    /// Subscribers that returned an error or panicked
    pub failed: usize,
}

impl PublishReport {
    /// Subscribers reached, successful or not
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    subscriber: Arc<dyn Subscriber>,
}

#[derive(Default)]
struct BusInner {
    subscribers: RwLock<HashMap<String, Vec<Subscription>>>,
    handlers: RwLock<HashMap<String, Arc<dyn RequestHandler>>>,
    next_id: AtomicU64,
}

/// Shared publish/subscribe and request/reply hub.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.inner.subscribers.read().len())
            .field("handlers", &self.inner.handlers.read().len())
            .finish()
    }
}

impl EventBus {
    /// Empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber to `topic`. Subscriptions are additive.
    pub fn subscribe(
        &self,
        topic: impl Into<String>,
        subscriber: Arc<dyn Subscriber>,
    ) -> SubscriptionId {
        let topic = topic.into();
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);

        debug!("Subscribing {} to '{}'", id, topic);
        self.inner
            .subscribers
            .write()
            .entry(topic)
            .or_default()
            .push(Subscription { id, subscriber });
        id
    }

    /// Remove one subscription. Returns `false` if it was not registered on `topic`.
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.write();
        let Some(list) = subscribers.get_mut(topic) else {
            return false;
        };

        let before = list.len();
        list.retain(|subscription| subscription.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            subscribers.remove(topic);
        }
        removed
    }

    /// Deliver `payload` to every subscriber of `topic`, in registration order.
    ///
    /// A failing or panicking subscriber is logged and skipped.
    pub async fn publish(&self, topic: &str, payload: Value) -> PublishReport {
        let snapshot: Vec<Subscription> = {
            let subscribers = self.inner.subscribers.read();
            subscribers.get(topic).cloned().unwrap_or_default()
        };

        let mut report = PublishReport::default();
        if snapshot.is_empty() {
            debug!("No subscribers for '{}'", topic);
            return report;
        }

        for subscription in snapshot {
            let delivery = AssertUnwindSafe(subscription.subscriber.on_event(topic, &payload))
                .catch_unwind()
                .await;

            match delivery {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!("Subscriber {} on '{}' failed: {:#}", subscription.id, topic, e);
                    report.failed += 1;
                }
                Err(panic) => {
                    error!(
                        "Subscriber {} on '{}' panicked: {}",
                        subscription.id,
                        topic,
                        panic_message(panic.as_ref())
                    );
                    report.failed += 1;
                }
            }
        }

        debug!(
            "Published '{}' to {} subscribers ({} failed)",
            topic,
            report.attempted(),
            report.failed
        );
        report
    }

    /// Install the handler for `topic`, returning the one it replaced.
    pub fn handle(
        &self,
        topic: impl Into<String>,
        handler: Arc<dyn RequestHandler>,
    ) -> Option<Arc<dyn RequestHandler>> {
        let topic = topic.into();
        let previous = self.inner.handlers.write().insert(topic.clone(), handler);
        if previous.is_some() {
            debug!("Replaced handler for '{}'", topic);
        } else {
            debug!("Registered handler for '{}'", topic);
        }
        previous
    }

    /// Remove the handler for `topic`. Returns `false` if there was none.
    pub fn unhandle(&self, topic: &str) -> bool {
        self.inner.handlers.write().remove(topic).is_some()
    }

    /// Send `payload` to the handler of `topic` and await its reply.
    pub async fn request(&self, topic: &str, payload: Value) -> Result<Value, BusError> {
        let handler = {
            let handlers = self.inner.handlers.read();
            handlers.get(topic).cloned()
        }
        .ok_or_else(|| BusError::NoHandlerRegistered {
            topic: topic.to_string(),
        })?;

        let reply = AssertUnwindSafe(handler.handle(topic, payload))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                error!("Handler for '{}' panicked", topic);
                Err(anyhow::anyhow!(
                    "handler panicked: {}",
                    panic_message(panic.as_ref())
                ))
            });

        reply.map_err(|source| BusError::Handler {
            topic: topic.to_string(),
            source,
        })
    }

    /// Number of subscribers on `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .subscribers
            .read()
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Whether `topic` has a handler
    pub fn has_handler(&self, topic: &str) -> bool {
        self.inner.handlers.read().contains_key(topic)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
