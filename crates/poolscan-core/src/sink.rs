//! Event sink trait: where decoded events go.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ScanError;
use crate::types::PoolCreatedEvent;

/// Receives decoded events, once each, in chain order.
///
/// An error is fatal to the scan: the batch holding the event is not
/// committed.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: &PoolCreatedEvent) -> Result<(), ScanError>;
}

#[async_trait]
impl<S: EventSink + ?Sized> EventSink for std::sync::Arc<S> {
    async fn emit(&self, event: &PoolCreatedEvent) -> Result<(), ScanError> {
        (**self).emit(event).await
    }
}

// ─── In-memory sink (for testing) ─────────────────────────────────────────────

/// Sink that keeps every event in memory.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<PoolCreatedEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<PoolCreatedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn emit(&self, event: &PoolCreatedEvent) -> Result<(), ScanError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
