//! Queue events
//!
//! The queue records what happened to each widget instead of calling
//! observers. Hosts drain the log after each call (for telemetry or UI
//! refresh) with [`WidgetQueue::drain_events`](super::WidgetQueue::drain_events).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::QueueWidgetPayload;

/// Why a widget left the visible set or the queue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissReason {
    /// The user closed it
    UserAction,
    /// Its visible lifetime ran out
    AutoDismiss,
    /// Focus mode started and it is not allowed during a workout
    FocusMode,
    /// The queue was cleared (navigation, logout)
    Navigation,
    /// Rendering failed
    Error,
}

impl fmt::Display for DismissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UserAction => "user_action",
            Self::AutoDismiss => "auto_dismiss",
            Self::FocusMode => "focus_mode",
            Self::Navigation => "navigation",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Why a submission was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The queue is full of medium/high entries
    QueueFull,
    /// An entry with this id is already live
    DuplicateId,
    /// This id already reached a terminal state
    Retired,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::QueueFull => "queue_full",
            Self::DuplicateId => "duplicate_id",
            Self::Retired => "retired",
        };
        f.write_str(name)
    }
}

/// What happened
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum QueueEventKind {
    /// Entered the queue
    Queued {
        /// 1-based position in the queue
        position: usize,
        /// Queue expiry (Unix ms)
        expires_at: u64,
    },
    /// Replaced an equivalent queued entry in place
    Deduplicated {
        /// Id of the superseded entry
        replaced: String,
    },
    /// Admitted to the visible set
    Shown {
        /// Time spent waiting
        queue_wait_ms: u64,
    },
    /// Removed before completion
    Dismissed {
        /// Why
        reason: DismissReason,
        /// Time visible, if it was visible
        visible_ms: Option<u64>,
    },
    /// Its task finished
    Completed {
        /// Time visible
        visible_ms: u64,
        /// Output reported by the widget
        output: Option<Value>,
    },
    /// Queue TTL ran out before it was shown
    Expired {
        /// Time spent waiting
        queued_for_ms: u64,
    },
    /// Refused or pushed out of a full queue
    Dropped {
        /// Why
        reason: DropReason,
    },
    /// The user touched it
    Interacted {
        /// Time from admission to first touch
        visible_ms: u64,
    },
    /// Pushed out of the visible set by a `replace` submission
    Evicted {
        /// Id of the widget that took the slot
        by: String,
    },
}

/// One entry of the queue's event log
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEvent {
    /// Widget id
    pub widget_id: String,
    /// Widget type
    pub widget_type: String,
    /// Owning agent
    pub agent_id: String,
    /// When (Unix ms)
    pub at: u64,
    /// What happened
    #[serde(flatten)]
    pub kind: QueueEventKind,
}

impl QueueEvent {
    pub(crate) fn new(payload: &QueueWidgetPayload, at: u64, kind: QueueEventKind) -> Self {
        Self {
            widget_id: payload.widget_id.clone(),
            widget_type: payload.widget_type.clone(),
            agent_id: payload.agent_id.clone(),
            at,
            kind,
        }
    }

    /// Short name of the event kind
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.kind {
            QueueEventKind::Queued { .. } => "queued",
            QueueEventKind::Deduplicated { .. } => "deduplicated",
            QueueEventKind::Shown { .. } => "shown",
            QueueEventKind::Dismissed { .. } => "dismissed",
            QueueEventKind::Completed { .. } => "completed",
            QueueEventKind::Expired { .. } => "expired",
            QueueEventKind::Dropped { .. } => "dropped",
            QueueEventKind::Interacted { .. } => "interacted",
            QueueEventKind::Evicted { .. } => "evicted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let payload = QueueWidgetPayload::new("rest-timer", "BLAZE").with_id("w1");
        let event = QueueEvent::new(
            &payload,
            10,
            QueueEventKind::Dismissed {
                reason: DismissReason::UserAction,
                visible_ms: Some(4),
            },
        );

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "dismissed");
        assert_eq!(value["reason"], "user_action");
        assert_eq!(value["widgetId"], "w1");
        assert_eq!(event.name(), "dismissed");
    }
}
