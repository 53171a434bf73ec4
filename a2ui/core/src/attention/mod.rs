//! Attention Budget
//!
//! Agents submit far more widgets than a person can take in. The
//! [`WidgetQueue`] sits between submissions and the screen and decides which
//! of them are actually shown.
//!
//! # Flow
//!
//! ```text
//!   agent submission
//!          |
//!          v
//!   +--------------+   retired id / duplicate id / queue full
//!   |   enqueue    |----------------------------------------> Dropped
//!   +------+-------+
//!          |  same type + agent already waiting
//!          +-------------------------------------> Deduplicated (slot kept)
//!          v
//!   +--------------+   ttl                    +--------------+
//!   |    queued    |------------------------> |   expired    |
//!   +------+-------+                          +--------------+
//!          |  admission: ceilings, cooldown, focus mode
//!          v
//!   +--------------+   dismiss / complete / auto-dismiss / evict
//!   |   visible    |------------------------> retired
//!   +--------------+
//! ```
//!
//! # Budget
//!
//! - at most `max_visible_total` visible widgets
//! - at most `max_visible_high_priority` of those `high`
//! - `cooldown_ms` between successive admissions
//! - during a workout only allowlisted types are admitted
//!
//! Every state change is recorded as a [`QueueEvent`].

mod config;
mod events;
mod queue;
mod types;

pub use config::{
    AttentionBudgetConfig, DEFAULT_COOLDOWN_MS, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_MAX_RETIRED_IDS,
    DEFAULT_MAX_VISIBLE_HIGH_PRIORITY, DEFAULT_MAX_VISIBLE_TOTAL, DEFAULT_TTL_MS,
};
pub use events::{DismissReason, DropReason, QueueEvent, QueueEventKind};
pub use queue::{EnqueueOutcome, WidgetQueue};
pub use types::{
    AttentionState, Position, Priority, PriorityCounts, QueueBehavior, QueueStatus,
    QueueWidgetPayload, QueuedWidget, VisibleWidget,
};
