//! Session-scoped event listeners
//!
//! A listener receives every event whose `Uniqueid` equals its session key,
//! in arrival order, until one of: a terminal event for that session, idle
//! expiry, an explicit close, or client shutdown. Each listener has its own
//! unbounded queue, so the receive loop never waits on a slow consumer.

use crate::{
    error::{AmiError, AmiResult},
    event::AmiEvent,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

struct ListenerEntry {
    tx: mpsc::UnboundedSender<AmiEvent>,
    last_activity: Instant,
    generation: u64,
}

#[derive(Default)]
struct RegistryInner {
    listeners: HashMap<String, ListenerEntry>,
    next_generation: u64,
    closed: bool,
}

/// Map from session key to listener, shared by the client handles and the
/// control loop. The lock is only held for map updates.
#[derive(Clone, Default)]
pub(crate) struct ListenerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Create a listener for `key`. An existing listener for the same key is
    /// replaced and its sequence ends.
    pub(crate) fn register(&self, key: &str) -> AmiResult<EventListener> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self
            .inner
            .lock();
        if inner.closed {
            return Err(AmiError::NotRunning);
        }
        inner.next_generation += 1;
        let generation = inner.next_generation;
        let replaced = inner
            .listeners
            .insert(
                key.to_string(),
                ListenerEntry {
                    tx,
                    last_activity: Instant::now(),
                    generation,
                },
            )
            .is_some();
        drop(inner);

        if replaced {
            debug!("Replaced listener for session {}", key);
        } else {
            debug!("Registered listener for session {}", key);
        }

        Ok(EventListener {
            key: key.to_string(),
            generation,
            rx,
            registry: self.clone(),
        })
    }

    /// Deliver an event to the listener for its session key, if any.
    ///
    /// With `terminal` set the listener is removed after delivery, which ends
    /// its sequence once the consumer drains it. Returns whether a listener
    /// received the event.
    pub(crate) fn dispatch(&self, event: &AmiEvent, terminal: bool) -> bool {
        let Some(key) = event.session_key() else {
            return false;
        };
        let mut inner = self
            .inner
            .lock();
        let Some(entry) = inner
            .listeners
            .get_mut(key)
        else {
            return false;
        };

        let delivered = entry
            .tx
            .send(event.clone())
            .is_ok();
        entry.last_activity = Instant::now();

        if !delivered {
            inner
                .listeners
                .remove(key);
            debug!("Listener for session {} went away, removed", key);
        } else if terminal {
            inner
                .listeners
                .remove(key);
            debug!("Session {} ended on {}", key, event.name());
        } else {
            trace!("Delivered {} to session {}", event.name(), key);
        }
        delivered
    }

    /// Close listeners with no event for at least `idle`. Returns how many.
    pub(crate) fn sweep_expired(&self, idle: Duration) -> usize {
        let now = Instant::now();
        let mut inner = self
            .inner
            .lock();
        let before = inner
            .listeners
            .len();
        inner
            .listeners
            .retain(|key, entry| {
                let keep = now.saturating_duration_since(entry.last_activity) < idle
                    && !entry
                        .tx
                        .is_closed();
                if !keep {
                    debug!("Expiring idle listener for session {}", key);
                }
                keep
            });
        before
            - inner
                .listeners
                .len()
    }

    /// Close every listener and refuse new ones.
    pub(crate) fn close_all(&self) -> usize {
        let mut inner = self
            .inner
            .lock();
        inner.closed = true;
        let count = inner
            .listeners
            .len();
        inner
            .listeners
            .clear();
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.inner
            .lock()
            .listeners
            .len()
    }

    fn remove(&self, key: &str, generation: u64) {
        let mut inner = self
            .inner
            .lock();
        if inner
            .listeners
            .get(key)
            .is_some_and(|entry| entry.generation == generation)
        {
            inner
                .listeners
                .remove(key);
            trace!("Listener for session {} removed", key);
        }
    }
}

/// Receiving end of a session listener.
///
/// The sequence is finite: [`recv`](Self::recv) returns `None` once the
/// listener has been closed and its queue drained. Dropping the listener
/// unregisters it.
pub struct EventListener {
    key: String,
    generation: u64,
    rx: mpsc::UnboundedReceiver<AmiEvent>,
    registry: ListenerRegistry,
}

impl std::fmt::Debug for EventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListener")
            .field("session_key", &self.key)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl EventListener {
    /// Next event for this session, or `None` when the listener has ended.
    pub async fn recv(&mut self) -> Option<AmiEvent> {
        self.rx
            .recv()
            .await
    }

    /// Session key this listener was registered for.
    pub fn session_key(&self) -> &str {
        &self.key
    }

    /// Whether the listener has been closed. Already queued events can
    /// still be received.
    pub fn is_closed(&self) -> bool {
        self.rx
            .is_closed()
    }

    /// Unregister now. Events already queued remain readable.
    pub fn close(&mut self) {
        self.registry
            .remove(&self.key, self.generation);
        self.rx
            .close();
    }

    pub(crate) fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<AmiEvent>> {
        self.rx
            .poll_recv(cx)
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        self.registry
            .remove(&self.key, self.generation);
    }
}

impl futures_util::Stream for EventListener {
    type Item = AmiEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.poll_recv(cx)
    }
}
