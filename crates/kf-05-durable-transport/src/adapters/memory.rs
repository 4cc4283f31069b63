//! In-process transport over a tokio broadcast channel.
//!
//! Brokers sharing one instance behave like brokers sharing a bus: each
//! message is stamped with its enqueue time, consumers filter by subject,
//! and a consumer name runs at most once. Messages published while no
//! consumer is listening are lost.

use crate::domain::{decode, subject_matches, WireMessage};
use crate::error::{TransportError, TransportResult};
use crate::ports::{DurableTransport, ReceivedEvent, TransportListener};
use crate::COMPONENTS_TTL;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use shared_types::{Component, Event};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

const BUS_CAPACITY: usize = 4096;
const ARCHIVE_CAPACITY: usize = 1024;

#[derive(Debug)]
struct Stored {
    msg: WireMessage,
    enqueued_at: SystemTime,
}

pub struct InMemoryTransport {
    bus: broadcast::Sender<Arc<Stored>>,
    consumers: Arc<DashMap<String, CancellationToken>>,
    components: RwLock<HashMap<String, (Component, Instant)>>,
    component_ttl: Duration,
    archive: Mutex<VecDeque<String>>,
    published: AtomicU64,
    closed: CancellationToken,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::with_component_ttl(COMPONENTS_TTL)
    }

    pub fn with_component_ttl(component_ttl: Duration) -> Self {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            bus,
            consumers: Arc::new(DashMap::new()),
            components: RwLock::new(HashMap::new()),
            component_ttl,
            archive: Mutex::new(VecDeque::with_capacity(ARCHIVE_CAPACITY)),
            published: AtomicU64::new(0),
            closed: CancellationToken::new(),
        }
    }

    /// Messages accepted since creation.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Presence record for `key`, if written within the TTL.
    pub fn component(&self, key: &str) -> Option<Component> {
        self.components
            .read()
            .get(key)
            .filter(|(_, at)| at.elapsed() < self.component_ttl)
            .map(|(c, _)| c.clone())
    }

    /// Ids of archived events, oldest first.
    pub fn archived(&self) -> Vec<String> {
        self.archive.lock().iter().cloned().collect()
    }

    fn ensure_open(&self) -> TransportResult<()> {
        if self.closed.is_cancelled() {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

async fn deliver(stored: &Stored, listener: &dyn TransportListener) {
    let mut event = match decode(&stored.msg.payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(subject = %stored.msg.subject, error = %e, "Dropping undecodable message");
            return;
        }
    };
    event.reduce_ttl_since(stored.enqueued_at);
    listener
        .on_event(ReceivedEvent {
            event,
            subject: stored.msg.subject.clone(),
            redelivery: stored.msg.is_redelivery(),
        })
        .await;
}

#[async_trait]
impl DurableTransport for InMemoryTransport {
    async fn send(&self, msg: WireMessage) -> TransportResult<()> {
        self.ensure_open()?;
        trace!(subject = %msg.subject, bytes = msg.payload.len(), "Publishing");
        let stored = Arc::new(Stored {
            msg,
            enqueued_at: SystemTime::now(),
        });
        // Nobody listening is not a publish failure.
        let _ = self.bus.send(stored);
        self.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn consume_events(
        &self,
        scope: CancellationToken,
        consumer: &str,
        subject: &str,
        listener: Arc<dyn TransportListener>,
    ) -> TransportResult<()> {
        self.ensure_open()?;
        let token = scope.child_token();
        match self.consumers.entry(consumer.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(entry) if !entry.get().is_cancelled() => {
                debug!(consumer, "Consumer already running");
                return Ok(());
            }
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                entry.insert(token.clone());
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(token.clone());
            }
        }

        let mut rx = self.bus.subscribe();
        let closed = self.closed.clone();
        let consumers = Arc::clone(&self.consumers);
        let consumer = consumer.to_string();
        let subject = subject.to_string();
        debug!(consumer = %consumer, subject = %subject, "Consumer started");

        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = token.cancelled() => break,
                    _ = closed.cancelled() => break,
                    next = rx.recv() => next,
                };
                match next {
                    Ok(stored) if subject_matches(&subject, &stored.msg.subject) => {
                        deliver(&stored, listener.as_ref()).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(consumer = %consumer, skipped, "Consumer lagged, messages lost");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            token.cancel();
            consumers.remove_if(&consumer, |_, t| t.is_cancelled());
            debug!(consumer = %consumer, "Consumer stopped");
        });
        Ok(())
    }

    async fn put_component(&self, component: &Component) -> TransportResult<()> {
        self.ensure_open()?;
        self.components
            .write()
            .insert(component.key(), (component.clone(), Instant::now()));
        Ok(())
    }

    async fn record_event(&self, evt: &Event) -> TransportResult<()> {
        self.ensure_open()?;
        let mut archive = self.archive.lock();
        if archive.len() == ARCHIVE_CAPACITY {
            archive.pop_front();
        }
        archive.push_back(evt.id.clone());
        Ok(())
    }

    async fn close(&self) {
        self.closed.cancel();
        self.consumers.clear();
        debug!("In-memory transport closed");
    }

    fn is_healthy(&self) -> bool {
        !self.closed.is_cancelled()
    }
}
