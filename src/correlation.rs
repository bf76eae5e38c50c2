//! Request correlation: `ActionID` generation and the pending-request table

use crate::{
    error::{AmiError, AmiResult},
    response::AmiResponse,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;
use tracing::{debug, trace};

static KEY_PREFIX: OnceLock<u64> = OnceLock::new();
static KEY_COUNTER: AtomicU64 = AtomicU64::new(0);

fn key_prefix() -> u64 {
    *KEY_PREFIX.get_or_init(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default()
    })
}

/// Next process-unique key, `<start-nanos>.<counter>`.
///
/// The prefix is fixed on first use, so keys never repeat within the process
/// (across reconnects and client instances) and are unlikely to collide with
/// keys from an earlier run talking to the same server.
pub fn next_key() -> String {
    let n = KEY_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("{}.{}", key_prefix(), n)
}

pub(crate) type ReplySender = oneshot::Sender<AmiResult<AmiResponse>>;

/// A submitted action waiting for its response.
struct PendingRequest {
    /// Serialized action; taken when written to the socket.
    wire: Option<String>,
    /// Redacted one-line rendering for logs.
    summary: String,
    reply: ReplySender,
    /// The caller stopped waiting; drop the entry once written.
    orphaned: bool,
}

impl PendingRequest {
    fn is_sent(&self) -> bool {
        self.wire
            .is_none()
    }
}

/// In-flight actions keyed by `ActionID`, plus the FIFO of those not yet written.
///
/// Owned by the control loop; nothing else touches it.
#[derive(Default)]
pub(crate) struct PendingTable {
    entries: HashMap<String, PendingRequest>,
    outbox: VecDeque<String>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Track a new action. It stays unsent until [`pop_unsent`](Self::pop_unsent).
    pub(crate) fn insert(&mut self, id: String, wire: String, summary: String, reply: ReplySender) {
        trace!("Queued action {} ({})", id, summary);
        self.outbox
            .push_back(id.clone());
        self.entries
            .insert(
                id,
                PendingRequest {
                    wire: Some(wire),
                    summary,
                    reply,
                    orphaned: false,
                },
            );
    }

    /// Oldest unsent action, now marked as sent. Returns `(id, wire)`.
    ///
    /// An orphaned action is still returned for writing, but stops being
    /// tracked: its response will be dropped as unknown.
    pub(crate) fn pop_unsent(&mut self) -> Option<(String, String)> {
        while let Some(id) = self
            .outbox
            .pop_front()
        {
            let Some(entry) = self
                .entries
                .get_mut(&id)
            else {
                continue;
            };
            let Some(wire) = entry
                .wire
                .take()
            else {
                continue;
            };
            debug!("Sending action {}: {}", id, entry.summary);
            if entry.orphaned {
                self.entries
                    .remove(&id);
            }
            return Some((id, wire));
        }
        None
    }

    /// Route a response to its waiter. Returns `false` when nothing matched.
    pub(crate) fn resolve(&mut self, response: AmiResponse) -> bool {
        let Some(id) = response.action_id() else {
            debug!("Dropping response without ActionID: {:?}", response.status());
            return false;
        };
        match self
            .entries
            .remove(id)
        {
            Some(entry) => {
                trace!("Routing response for {}", id);
                if entry
                    .reply
                    .send(Ok(response))
                    .is_err()
                {
                    trace!("Waiter for {} already gone", entry.summary);
                }
                true
            }
            None => {
                debug!("Dropping response for unknown ActionID {}", id);
                false
            }
        }
    }

    /// The caller gave up waiting.
    ///
    /// A written action stops being tracked at once. An unsent one keeps its
    /// place in the outbox and is still written on the next flush.
    pub(crate) fn forget(&mut self, id: &str) -> bool {
        match self
            .entries
            .get_mut(id)
        {
            Some(entry) if entry.is_sent() => {
                self.entries
                    .remove(id);
                true
            }
            Some(entry) => {
                entry.orphaned = true;
                true
            }
            None => false,
        }
    }

    /// Fail every already-written action with `ConnectionClosed`. Unsent ones
    /// stay queued for the next connection.
    pub(crate) fn fail_sent(&mut self) -> usize {
        let sent: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_sent())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &sent {
            if let Some(entry) = self
                .entries
                .remove(id)
            {
                let _ = entry
                    .reply
                    .send(Err(AmiError::ConnectionClosed));
            }
        }
        sent.len()
    }

    /// Fail everything with `ConnectionClosed`.
    pub(crate) fn fail_all(&mut self) -> usize {
        let count = self
            .entries
            .len();
        self.outbox
            .clear();
        for (_, entry) in self
            .entries
            .drain()
        {
            let _ = entry
                .reply
                .send(Err(AmiError::ConnectionClosed));
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .len()
    }

    pub(crate) fn unsent_len(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| !entry.is_sent())
            .count()
    }
}
