//! Event bus for audit runs
//!
//! Provides pub/sub messaging using Tokio broadcast channels with an
//! optional in-memory journal for post-run inspection.

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use super::types::AuditEvent;
use crate::state::Stage;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Error type for event bus operations
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Journal lock poisoned")]
    JournalPoisoned,

    #[error("Journal not enabled on this bus")]
    JournalDisabled,
}

/// Result type for event bus operations
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

/// Event bus with broadcast channels and an optional journal
pub struct EventBus {
    /// Broadcast sender for publishing events
    sender: broadcast::Sender<AuditEvent>,

    /// Every published event in publish order, when enabled
    journal: Option<Mutex<Vec<AuditEvent>>>,
}

impl EventBus {
    /// Create a new event bus without a journal
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            journal: None,
        }
    }

    /// Create an event bus that also records every event it publishes
    pub fn with_journal() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            journal: Some(Mutex::new(Vec::new())),
        }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: AuditEvent) -> EventBusResult<()> {
        let event_type = event.event_type();

        if let Some(journal) = &self.journal {
            journal
                .lock()
                .map_err(|_| EventBusError::JournalPoisoned)?
                .push(event.clone());
        }

        // Broadcast to subscribers (ignore if no receivers)
        match self.sender.send(event) {
            Ok(count) => {
                debug!(event_type, receivers = count, "Event published");
            }
            Err(_) => {
                debug!(event_type, "Event published (no receivers)");
            }
        }
        Ok(())
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if the bus has any subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }

    /// Copy of every journaled event in publish order
    pub fn journal(&self) -> EventBusResult<Vec<AuditEvent>> {
        let journal = self.journal.as_ref().ok_or(EventBusError::JournalDisabled)?;
        let events = journal.lock().map_err(|_| EventBusError::JournalPoisoned)?;
        Ok(events.clone())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Which events a subscription should see.
///
/// Run-level events (`run_started`, `phase_changed`, `report_synthesized`)
/// carry no node or stage and pass the node and stage constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    run_id: Option<Uuid>,
    stage: Option<Stage>,
    node: Option<String>,
    kinds: Option<Vec<&'static str>>,
}

impl EventFilter {
    /// Matches every event.
    pub fn all() -> Self {
        Self::default()
    }

    /// Phase changes and node outcomes: what an operator watches during a run.
    pub fn progress() -> Self {
        Self::all().kinds(&["phase_changed", "node_completed", "node_failed"])
    }

    pub fn for_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn in_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn for_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Restrict to these `AuditEvent::event_type` names.
    pub fn kinds(mut self, kinds: &[&'static str]) -> Self {
        self.kinds = Some(kinds.to_vec());
        self
    }

    pub fn matches(&self, event: &AuditEvent) -> bool {
        if self.run_id.is_some_and(|id| id != event.run_id()) {
            return false;
        }
        if let (Some(want), Some(got)) = (self.stage, event.stage()) {
            if want != got {
                return false;
            }
        }
        if let (Some(want), Some(got)) = (&self.node, event.node()) {
            if want != got {
                return false;
            }
        }
        match &self.kinds {
            Some(kinds) => kinds.contains(&event.event_type()),
            None => true,
        }
    }
}

/// Receiver yielding only events that pass its filter.
///
/// Lagging is absorbed: skipped events are logged and reception continues.
pub struct FilteredReceiver {
    receiver: broadcast::Receiver<AuditEvent>,
    filter: EventFilter,
    skipped: u64,
}

impl FilteredReceiver {
    pub fn new(receiver: broadcast::Receiver<AuditEvent>, filter: EventFilter) -> Self {
        Self {
            receiver,
            filter,
            skipped: 0,
        }
    }

    /// Next matching event, or `None` once every publisher is gone.
    pub async fn next(&mut self) -> Option<AuditEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.skipped += n;
                    warn!(skipped = n, "Event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Events lost to lagging so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl EventBus {
    #[cfg(test)]
    pub(crate) fn poison_journal(&self) {
        if let Some(journal) = &self.journal {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let _guard = journal.lock();
                panic!("poisoning journal");
            }));
        }
    }

    /// Subscribe through a filter.
    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }
}
