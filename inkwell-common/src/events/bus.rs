//! Handler-dispatching event bus
//!
//! The bus is an explicitly owned value: `main` builds one, hands clones to the
//! services that publish and to the code that registers subscribers, and calls
//! [`EventBus::shutdown`] on the way out. Clones share one registry.
//!
//! Delivery is in-process and at-most-once. There is no persistence and no
//! replay: a publish with no live subscriber, or a crash before a handler
//! finishes, loses that notification. The reconciliation sweeps exist to
//! compensate for exactly that.

use super::{EventHandler, InkwellEvent};
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

type HandlerList = Vec<Arc<dyn EventHandler>>;

struct BusInner {
    handlers: RwLock<HashMap<String, HandlerList>>,
    /// Observer feed (SSE); lossy when nobody listens
    tx: broadcast::Sender<InkwellEvent>,
    tasks: TaskTracker,
    accepting: AtomicBool,
    capacity: usize,
}

/// Central event dispatcher
///
/// # Examples
///
/// ```
/// use inkwell_common::events::{handler_fn, EventBus, InkwellEvent, STORY_COMPLETED};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = EventBus::new(100);
/// bus.subscribe(STORY_COMPLETED, handler_fn("log", |event: InkwellEvent| async move {
///     println!("story {} completed", event.story_id());
///     Ok(())
/// }));
///
/// // Returns immediately; the handler runs on its own task
/// assert_eq!(bus.publish(InkwellEvent::story_completed(1)), 1);
/// bus.drain().await;
/// # }
/// ```
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Creates a new EventBus
    ///
    /// `capacity` bounds the observer feed returned by [`EventBus::watch`];
    /// handler dispatch is unbounded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(BusInner {
                handlers: RwLock::new(HashMap::new()),
                tx,
                tasks: TaskTracker::new(),
                accepting: AtomicBool::new(true),
                capacity,
            }),
        }
    }

    /// Register `handler` for `topic`
    ///
    /// Multiple handlers per topic are allowed; every one of them receives
    /// every publication made after registration. There is no unsubscribe.
    pub fn subscribe(&self, topic: &str, handler: Arc<dyn EventHandler>) {
        let mut handlers = match self.inner.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        debug!(topic, handler = handler.name(), "Event handler registered");
        handlers.entry(topic.to_string()).or_default().push(handler);
    }

    /// Publish an event to every handler registered for its topic
    ///
    /// Each handler is spawned as an independent, supervised task and this
    /// call returns without waiting for any of them. Returns the number of
    /// handlers scheduled; 0 means the notification was dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn publish(&self, event: InkwellEvent) -> usize {
        let topic = event.topic();

        if !self.inner.accepting.load(Ordering::Acquire) {
            warn!(topic, story_id = event.story_id(), "Event bus shut down; event dropped");
            return 0;
        }

        let handlers: HandlerList = {
            let registry = match self.inner.handlers.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            registry.get(topic).cloned().unwrap_or_default()
        };

        if handlers.is_empty() {
            debug!(
                topic,
                story_id = event.story_id(),
                "No handlers for topic; event not dispatched"
            );
        }

        for handler in &handlers {
            let handler = Arc::clone(handler);
            let event = event.clone();
            self.inner.tasks.spawn(supervise(handler, event));
        }

        let _ = self.inner.tx.send(event);

        handlers.len()
    }

    /// Observe every published event (for SSE and diagnostics)
    ///
    /// Only events published after this call are received.
    pub fn watch(&self) -> broadcast::Receiver<InkwellEvent> {
        self.inner.tx.subscribe()
    }

    /// Number of handlers registered for `topic`
    pub fn handler_count(&self, topic: &str) -> usize {
        let registry = match self.inner.handlers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        registry.get(topic).map(Vec::len).unwrap_or(0)
    }

    /// Handler tasks currently running
    pub fn in_flight(&self) -> usize {
        self.inner.tasks.len()
    }

    /// Get the configured observer channel capacity
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Wait until every handler task spawned so far (and any they spawn) has finished
    ///
    /// Not meant to be called concurrently from several places.
    pub async fn drain(&self) {
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.tasks.reopen();
    }

    /// Stop dispatching new events, then wait for in-flight handlers
    pub async fn shutdown(&self) {
        self.inner.accepting.store(false, Ordering::Release);
        let pending = self.inner.tasks.len();
        if pending > 0 {
            debug!(pending, "Waiting for in-flight event handlers");
        }
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
    }
}

/// Run one handler, logging instead of propagating its failure
async fn supervise(handler: Arc<dyn EventHandler>, event: InkwellEvent) {
    let name = handler.name();
    let topic = event.topic();
    let story_id = event.story_id();

    match AssertUnwindSafe(handler.handle(&event)).catch_unwind().await {
        Ok(Ok(())) => {
            debug!(handler = name, topic, story_id, "Event handler finished");
        }
        Ok(Err(e)) => {
            error!(handler = name, topic, story_id, error = %e, "Event handler failed");
        }
        Err(_) => {
            error!(handler = name, topic, story_id, "Event handler panicked");
        }
    }
}

/// Closure-backed handler, built with [`handler_fn`]
pub struct FnHandler<F, Fut> {
    name: &'static str,
    f: F,
    _output: PhantomData<fn() -> Fut>,
}

/// Wrap an async closure as an [`EventHandler`]
pub fn handler_fn<F, Fut>(name: &'static str, f: F) -> Arc<dyn EventHandler>
where
    F: Fn(InkwellEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnHandler {
        name,
        f,
        _output: PhantomData,
    })
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F, Fut>
where
    F: Fn(InkwellEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, event: &InkwellEvent) -> anyhow::Result<()> {
        (self.f)(event.clone()).await
    }
}
