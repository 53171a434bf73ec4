//! Queue payload and bookkeeping types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::WidgetSpec;

/// How urgently a widget wants attention
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background information
    Low,
    /// Normal
    #[default]
    Medium,
    /// Needs the user now; at most a handful may be visible
    High,
}

impl Priority {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Where a widget is placed; eviction only happens within a position group
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// In the conversation flow
    #[default]
    Inline,
    /// Above content
    Floating,
}

/// What to do when the budget is exhausted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBehavior {
    /// Wait for a slot
    #[default]
    Defer,
    /// Evict a lower-or-equal priority visible widget of the same position
    ///
    /// Only dismissable widgets are evicted, and only when a capacity ceiling
    /// is what holds the submission back. With no such victim, or while the
    /// cooldown runs, it waits like `Defer`.
    Replace,
}

fn default_true() -> bool {
    true
}

/// A widget submission from an agent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueWidgetPayload {
    /// Unique id (generated when omitted)
    #[serde(default = "generate_widget_id")]
    pub widget_id: String,
    /// Catalog widget type
    pub widget_type: String,
    /// Owning agent
    pub agent_id: String,
    /// Priority
    #[serde(default)]
    pub priority: Priority,
    /// Position group
    #[serde(default)]
    pub position: Position,
    /// Budget behaviour
    #[serde(default)]
    pub queue_behavior: QueueBehavior,
    /// Whether dismissal is allowed
    #[serde(default = "default_true")]
    pub dismissable: bool,
    /// Submission time (Unix ms)
    #[serde(default)]
    pub created_at: u64,
    /// Widget content
    #[serde(default)]
    pub data: Value,
    /// Maximum time in the queue; falls back to the catalog, then config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    /// Visible lifetime; falls back to the catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_dismiss_seconds: Option<u64>,
}

fn generate_widget_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl QueueWidgetPayload {
    /// Submission with a fresh id and medium/inline/defer defaults
    pub fn new(widget_type: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            widget_id: generate_widget_id(),
            widget_type: widget_type.into(),
            agent_id: agent_id.into(),
            priority: Priority::default(),
            position: Position::default(),
            queue_behavior: QueueBehavior::default(),
            dismissable: true,
            created_at: crate::clock::now_ms(),
            data: Value::Null,
            ttl_seconds: None,
            auto_dismiss_seconds: None,
        }
    }

    /// Submission pre-filled from a catalog entry
    #[must_use]
    pub fn from_catalog(spec: &WidgetSpec) -> Self {
        let mut payload = Self::new(spec.widget_type.clone(), spec.owner_agent.clone());
        payload.priority = spec.default_priority;
        payload.position = spec.default_position;
        payload.queue_behavior = spec.default_queue_behavior;
        payload
    }

    /// Use a specific widget id
    #[must_use]
    pub fn with_id(mut self, widget_id: impl Into<String>) -> Self {
        self.widget_id = widget_id.into();
        self
    }

    /// Set the priority
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the position group
    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Set the budget behaviour
    #[must_use]
    pub fn with_behavior(mut self, behavior: QueueBehavior) -> Self {
        self.queue_behavior = behavior;
        self
    }

    /// Set whether the widget may be dismissed
    #[must_use]
    pub fn dismissable(mut self, dismissable: bool) -> Self {
        self.dismissable = dismissable;
        self
    }

    /// Attach content
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Override the queue time-to-live
    #[must_use]
    pub fn with_ttl_seconds(mut self, secs: u64) -> Self {
        self.ttl_seconds = Some(secs);
        self
    }

    /// Override the visible lifetime
    #[must_use]
    pub fn with_auto_dismiss_seconds(mut self, secs: u64) -> Self {
        self.auto_dismiss_seconds = Some(secs);
        self
    }
}

/// A submission waiting for admission
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedWidget {
    /// The submission
    pub payload: QueueWidgetPayload,
    /// When it entered the queue (Unix ms)
    pub queued_at: u64,
    /// When it leaves the queue unshown (Unix ms)
    pub expires_at: u64,
    /// Whether the user has touched it
    pub interacted: bool,
}

impl QueuedWidget {
    /// Widget id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.payload.widget_id
    }

    /// Whether the queue TTL has run out at `now`
    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }

    /// Whether this entry collapses with `payload` (same type, same agent)
    #[must_use]
    pub fn same_slot(&self, payload: &QueueWidgetPayload) -> bool {
        self.payload.widget_type == payload.widget_type && self.payload.agent_id == payload.agent_id
    }
}

/// A widget currently admitted for display
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleWidget {
    /// Queue bookkeeping
    #[serde(flatten)]
    pub widget: QueuedWidget,
    /// When it was admitted (Unix ms)
    pub shown_at: u64,
    /// When it dismisses itself (Unix ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_dismiss_at: Option<u64>,
}

impl VisibleWidget {
    /// Widget id
    #[must_use]
    pub fn id(&self) -> &str {
        self.widget.id()
    }

    /// The submission
    #[must_use]
    pub fn payload(&self) -> &QueueWidgetPayload {
        &self.widget.payload
    }

    /// Priority shortcut
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.widget.payload.priority
    }
}

/// Focus-mode state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionState {
    /// Whether a workout is running
    pub is_workout_active: bool,
    /// Workout session, if the host supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workout_session_id: Option<String>,
    /// When focus mode started (Unix ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workout_started_at: Option<u64>,
}

/// Visible widget count per priority
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    /// High
    pub high: usize,
    /// Medium
    pub medium: usize,
    /// Low
    pub low: usize,
}

impl PriorityCounts {
    /// Count for one priority
    #[must_use]
    pub fn get(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }

    pub(crate) fn bump(&mut self, priority: Priority) {
        match priority {
            Priority::High => self.high += 1,
            Priority::Medium => self.medium += 1,
            Priority::Low => self.low += 1,
        }
    }

    pub(crate) fn release(&mut self, priority: Priority) {
        match priority {
            Priority::High => self.high = self.high.saturating_sub(1),
            Priority::Medium => self.medium = self.medium.saturating_sub(1),
            Priority::Low => self.low = self.low.saturating_sub(1),
        }
    }
}

/// Queue snapshot for monitoring
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// Entries waiting
    pub queue_length: usize,
    /// Entries visible
    pub visible_count: usize,
    /// Visible entries by priority
    pub visible_by_priority: PriorityCounts,
    /// Oldest waiting entry's enqueue time
    pub oldest_queued_at: Option<u64>,
    /// Whether focus mode is on
    pub is_workout_active: bool,
}
