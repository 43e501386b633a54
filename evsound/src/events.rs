//! Context events
//!
//! Observers (logging, the CLI's `--events` output) subscribe to a
//! broadcast of request and lifecycle transitions. Outcomes are still only
//! delivered through each request's `Playback`; this stream is a side view.

use crate::backend::RequestId;
use crate::outcome::Outcome;
use crate::state::ContextState;
use evsound_common::ErrorCode;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default broadcast capacity
pub const EVENT_CAPACITY: usize = 100;

/// Request and lifecycle events emitted by a context
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ContextEvent {
    /// Play request registered and forwarded to the driver
    RequestSubmitted {
        context_id: Uuid,
        request_id: RequestId,
        event_id: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Play request reached its outcome
    RequestResolved {
        context_id: Uuid,
        request_id: RequestId,
        outcome: Outcome,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Driver refused a submitted request; no outcome follows
    RequestRejected {
        context_id: Uuid,
        request_id: RequestId,
        code: ErrorCode,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Lifecycle transition
    StateChanged {
        context_id: Uuid,
        old_state: ContextState,
        new_state: ContextState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ContextEvent {
    pub fn context_id(&self) -> Uuid {
        match self {
            ContextEvent::RequestSubmitted { context_id, .. }
            | ContextEvent::RequestResolved { context_id, .. }
            | ContextEvent::RequestRejected { context_id, .. }
            | ContextEvent::StateChanged { context_id, .. } => *context_id,
        }
    }
}

/// Broadcast channel for [`ContextEvent`]s of one context
#[derive(Debug, Clone)]
pub struct EventBus {
    context_id: Uuid,
    tx: broadcast::Sender<ContextEvent>,
}

impl EventBus {
    pub fn new(context_id: Uuid, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { context_id, tx }
    }

    pub fn context_id(&self) -> Uuid {
        self.context_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ContextEvent> {
        self.tx.subscribe()
    }

    /// Emit, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: ContextEvent) {
        let _ = self.tx.send(event);
    }

    pub fn request_submitted(&self, request_id: RequestId, event_id: Option<&str>) {
        self.emit_lossy(ContextEvent::RequestSubmitted {
            context_id: self.context_id,
            request_id,
            event_id: event_id.map(str::to_string),
            timestamp: chrono::Utc::now(),
        });
    }

    pub fn request_resolved(&self, request_id: RequestId, outcome: Outcome) {
        self.emit_lossy(ContextEvent::RequestResolved {
            context_id: self.context_id,
            request_id,
            outcome,
            timestamp: chrono::Utc::now(),
        });
    }

    pub fn request_rejected(&self, request_id: RequestId, code: ErrorCode) {
        self.emit_lossy(ContextEvent::RequestRejected {
            context_id: self.context_id,
            request_id,
            code,
            timestamp: chrono::Utc::now(),
        });
    }

    pub fn state_changed(&self, old_state: ContextState, new_state: ContextState) {
        self.emit_lossy(ContextEvent::StateChanged {
            context_id: self.context_id,
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }
}
