//! # Intake Queue
//!
//! Bounded multi-producer, multi-consumer queue. Producers clone a
//! `tokio::sync::mpsc` sender; consumers share the receiver behind an async
//! mutex so every item goes to exactly one worker. Closing drops the sender,
//! so blocked consumers wake up once the buffer is drained.

use crate::intake::{EventIntake, IntakeError};
use crate::DEFAULT_INTAKE_CAPACITY;
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

pub struct IntakeQueue<T> {
    sender: SyncMutex<Option<mpsc::Sender<T>>>,
    receiver: Arc<Mutex<mpsc::Receiver<T>>>,
    capacity: usize,
    enqueued: AtomicU64,
    dequeued: AtomicU64,
}

impl<T: Send + 'static> IntakeQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INTAKE_CAPACITY)
    }

    /// Create a queue holding at most `capacity` items (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender: SyncMutex::new(Some(sender)),
            receiver: Arc::new(Mutex::new(receiver)),
            capacity,
            enqueued: AtomicU64::new(0),
            dequeued: AtomicU64::new(0),
        }
    }

    /// Take the next item. Returns `None` once the queue is closed and
    /// drained.
    pub async fn pop(&self) -> Option<T> {
        let item = self.receiver.lock().await.recv().await;
        if item.is_some() {
            self.dequeued.fetch_add(1, Ordering::Relaxed);
        }
        item
    }

    /// Stop accepting items. Already buffered items can still be popped.
    pub fn close(&self) {
        self.sender.lock().take();
        debug!(
            enqueued = self.enqueued(),
            dequeued = self.dequeued(),
            "Intake queue closed"
        );
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total items accepted since creation.
    #[must_use]
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Total items handed to workers since creation.
    #[must_use]
    pub fn dequeued(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }
}

impl<T> IntakeQueue<T> {
    fn sender(&self) -> Result<mpsc::Sender<T>, IntakeError> {
        self.sender.lock().clone().ok_or(IntakeError::Closed)
    }
}

impl<T: Send + 'static> Default for IntakeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Send + 'static> EventIntake<T> for IntakeQueue<T> {
    async fn push(&self, item: T) -> Result<(), IntakeError> {
        let sender = self.sender()?;
        sender
            .send(item)
            .await
            .map_err(|_| IntakeError::Closed)?;
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn try_push(&self, item: T) -> Result<(), IntakeError> {
        match self.sender()?.try_send(item) {
            Ok(()) => {
                self.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(capacity = self.capacity, "Intake queue full");
                Err(IntakeError::Full {
                    capacity: self.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(IntakeError::Closed),
        }
    }

    fn depth(&self) -> usize {
        self.enqueued().saturating_sub(self.dequeued()) as usize
    }
}
