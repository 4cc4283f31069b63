//! Delivery handle for every replica of one component version.
//!
//! ```text
//! sender 1 ─┐                            ┌─→ dispatcher (replica A) ─→ sink A
//! sender 2 ─┼─→ mpsc (bounded, ordered) ─┤
//! sender 3 ─┘        shared receiver     └─→ dispatcher (replica B) ─→ sink B
//!      ▲                                              │
//!      └──────────── oneshot outcome ─────────────────┘
//! ```
//!
//! Each queued event is taken by exactly one dispatcher. A sender waits
//! until its event is delivered and gets the outcome back.

use super::replica::ReplicaSubscription;
use crate::error::{SubscriptionError, SubscriptionResult};
use shared_types::MatchedEvent;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Events buffered ahead of the group's dispatchers.
pub const DEFAULT_GROUP_CAPACITY: usize = 64;

type Delivery = (MatchedEvent, oneshot::Sender<SubscriptionResult<()>>);

pub struct GroupSubscription {
    key: String,
    sender: mpsc::Sender<Delivery>,
    receiver: Mutex<mpsc::Receiver<Delivery>>,
    token: CancellationToken,
}

impl GroupSubscription {
    pub fn new(key: impl Into<String>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            key: key.into(),
            sender,
            receiver: Mutex::new(receiver),
            token: CancellationToken::new(),
        }
    }

    /// `name-shortHash` shared by the members.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Token canceled when the group closes.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Queue one event for whichever member is free and wait for the
    /// delivery outcome.
    pub async fn send_event(&self, evt: MatchedEvent) -> SubscriptionResult<()> {
        let closed = || SubscriptionError::GroupClosed(self.key.clone());
        if !self.is_active() {
            return Err(closed());
        }

        let (reply, outcome) = oneshot::channel();
        tokio::select! {
            _ = self.token.cancelled() => return Err(closed()),
            sent = self.sender.send((evt, reply)) => sent.map_err(|_| closed())?,
        }
        // Dropped unanswered when the group closes with the event queued.
        outcome.await.map_err(|_| closed())?
    }

    /// Close the group. Queued events fail with `GroupClosed`.
    pub fn close(&self) {
        self.token.cancel();
        if let Ok(mut rx) = self.receiver.try_lock() {
            drain(&mut rx);
        }
        debug!(group = %self.key, "Group subscription closed");
    }

    /// Run the dispatch loop for one member until it or the group is
    /// canceled.
    pub fn spawn_dispatcher(self: &Arc<Self>, member: Arc<ReplicaSubscription>) -> JoinHandle<()> {
        let group = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = member.cancelled() => break,
                    _ = group.token.cancelled() => break,
                    next = async { group.receiver.lock().await.recv().await } => next,
                };
                let Some((evt, reply)) = next else {
                    break;
                };
                trace!(group = %group.key, member = %member.component().key(), event_id = %evt.event.id, "Group dispatch");
                let outcome = member.send_event(evt).await;
                // Sender may have given up; nothing to report to.
                let _ = reply.send(outcome);
            }

            if !group.is_active() {
                drain(&mut *group.receiver.lock().await);
            }
        })
    }
}

fn drain(rx: &mut mpsc::Receiver<Delivery>) {
    rx.close();
    while rx.try_recv().is_ok() {}
}

impl fmt::Debug for GroupSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupSubscription")
            .field("key", &self.key)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
