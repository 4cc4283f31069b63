//! # Intake Port
//!
//! What a receiver needs to hand events to the routing pipeline.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from pushing into the intake.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntakeError {
    /// The queue was closed; the broker is shutting down.
    #[error("intake queue closed")]
    Closed,

    /// Non-blocking push found no free slot.
    #[error("intake queue full (capacity {capacity})")]
    Full { capacity: usize },
}

/// Push side of the intake queue.
#[async_trait]
pub trait EventIntake<T: Send + 'static>: Send + Sync {
    /// Enqueue, waiting for a free slot.
    async fn push(&self, item: T) -> Result<(), IntakeError>;

    /// Enqueue without waiting.
    fn try_push(&self, item: T) -> Result<(), IntakeError>;

    /// Items currently buffered.
    fn depth(&self) -> usize;
}
