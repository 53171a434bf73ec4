//! Widget Queue
//!
//! Admission control over agent widget submissions.
//!
//! # Admission
//!
//! Runs at the end of every mutating call (and on [`WidgetQueue::tick`]).
//! Candidates are taken oldest first:
//!
//! ```text
//! for each queued widget (arrival order):
//!     focus mode and not allowlisted   -> skip (held)
//!     visible == max_visible_total     -> stop
//!     high and high cap reached        -> skip
//!     something visible and cooldown   -> stop
//!     otherwise                        -> show, last_admission_at = now
//! ```
//!
//! Cooldown only throttles *successive* presentations: when nothing is
//! visible the next widget is admitted at once.
//!
//! # Time
//!
//! There are no timers. TTL expiry of queued widgets and auto-dismiss of
//! visible ones are evaluated against the injected clock at the start of each
//! call, so a host that wants them to fire on schedule calls `tick()`
//! periodically.
//!
//! # Terminal states
//!
//! A widget id that was dismissed, completed, expired, evicted or dropped is
//! retired and can never be admitted again. The queue remembers the most
//! recent `max_retired_ids` of them; older ids are forgotten first.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::events::{DismissReason, DropReason, QueueEvent, QueueEventKind};
use super::{
    AttentionBudgetConfig, AttentionState, Priority, PriorityCounts, QueueBehavior, QueueStatus,
    QueueWidgetPayload, QueuedWidget, VisibleWidget,
};
use crate::catalog::WidgetCatalog;
use crate::clock::{system_clock, SharedClock};

/// Events kept before the oldest are discarded
const MAX_PENDING_EVENTS: usize = 1024;

/// What `enqueue` did with a submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Admitted straight to the visible set
    Shown,
    /// Waiting for a slot, the cooldown, or the end of focus mode
    Queued,
    /// Took over the queue slot of an equivalent waiting widget
    Deduplicated {
        /// Id of the superseded entry
        replaced: String,
    },
    /// Refused
    Dropped(DropReason),
}

impl EnqueueOutcome {
    /// Whether the widget is live (shown or waiting) afterwards
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Dropped(_))
    }
}

/// Attention-budget queue
pub struct WidgetQueue {
    config: AttentionBudgetConfig,
    clock: SharedClock,
    catalog: Option<Arc<dyn WidgetCatalog>>,
    /// Waiting widgets, in arrival order
    queue: Vec<QueuedWidget>,
    /// Admitted widgets, in admission order
    visible: Vec<VisibleWidget>,
    attention: AttentionState,
    last_admission_at: Option<u64>,
    /// Ids that reached a terminal state
    retired: HashSet<String>,
    /// `retired`, oldest first
    retired_order: VecDeque<String>,
    events: VecDeque<QueueEvent>,
}

impl Default for WidgetQueue {
    fn default() -> Self {
        Self::new(AttentionBudgetConfig::default())
    }
}

impl WidgetQueue {
    /// Queue on the system clock
    #[must_use]
    pub fn new(config: AttentionBudgetConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Queue reading time from `clock`
    #[must_use]
    pub fn with_clock(config: AttentionBudgetConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            catalog: None,
            queue: Vec::new(),
            visible: Vec::new(),
            attention: AttentionState::default(),
            last_admission_at: None,
            retired: HashSet::new(),
            retired_order: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    /// Use `catalog` for TTL and auto-dismiss defaults
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn WidgetCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Submit a widget
    pub fn enqueue(&mut self, payload: QueueWidgetPayload) -> EnqueueOutcome {
        let now = self.begin();
        let id = payload.widget_id.clone();
        let behavior = payload.queue_behavior;

        let deduplicated = match self.insert(payload, now) {
            Ok(replaced) => replaced,
            Err(reason) => {
                self.admit(now);
                return EnqueueOutcome::Dropped(reason);
            }
        };

        self.admit(now);
        if behavior == QueueBehavior::Replace && self.is_queued(&id) {
            self.replace_visible(&id, now);
        }

        if self.is_visible(&id) {
            EnqueueOutcome::Shown
        } else if let Some(replaced) = deduplicated {
            EnqueueOutcome::Deduplicated { replaced }
        } else {
            EnqueueOutcome::Queued
        }
    }

    /// Remove a waiting or visible widget
    ///
    /// Returns `false` if the widget is unknown or not dismissable.
    pub fn dismiss(&mut self, widget_id: &str, reason: DismissReason) -> bool {
        let now = self.begin();
        let dismissed = self.dismiss_at(widget_id, reason, now);
        self.admit(now);
        dismissed
    }

    /// Record that the user touched a visible widget
    pub fn mark_interacted(&mut self, widget_id: &str) -> bool {
        let now = self.begin();
        let touched = match self.visible.iter_mut().find(|w| w.id() == widget_id) {
            Some(widget) => {
                widget.widget.interacted = true;
                let event = QueueEvent::new(
                    &widget.widget.payload,
                    now,
                    QueueEventKind::Interacted {
                        visible_ms: now.saturating_sub(widget.shown_at),
                    },
                );
                self.push_event(event);
                true
            }
            None => false,
        };
        self.admit(now);
        touched
    }

    /// Finish a visible widget's task, freeing its slot
    pub fn mark_completed(&mut self, widget_id: &str, output: Option<Value>) -> bool {
        let now = self.begin();
        let completed = match self.visible.iter().position(|w| w.id() == widget_id) {
            Some(index) => {
                let widget = self.visible.remove(index);
                tracing::info!(
                    widget_id = %widget_id,
                    widget_type = %widget.payload().widget_type,
                    "Widget completed"
                );
                self.retire(
                    &widget.widget.payload,
                    now,
                    QueueEventKind::Completed {
                        visible_ms: now.saturating_sub(widget.shown_at),
                        output,
                    },
                );
                true
            }
            None => false,
        };
        self.admit(now);
        completed
    }

    /// Enter focus mode
    ///
    /// Visible widgets that are dismissable and not allowlisted are dismissed;
    /// non-allowlisted submissions are held until [`end_workout`](Self::end_workout).
    pub fn start_workout(&mut self, session_id: Option<String>) {
        let now = self.begin();
        tracing::info!(session_id = ?session_id, "Focus mode started");
        self.attention = AttentionState {
            is_workout_active: true,
            workout_session_id: session_id,
            workout_started_at: Some(now),
        };

        let (held, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.visible)
            .into_iter()
            .partition(|w| {
                w.payload().dismissable && !self.config.allowed_during_workout(&w.payload().widget_type)
            });
        self.visible = kept;
        for widget in held {
            self.retire(
                &widget.widget.payload,
                now,
                QueueEventKind::Dismissed {
                    reason: DismissReason::FocusMode,
                    visible_ms: Some(now.saturating_sub(widget.shown_at)),
                },
            );
        }

        self.admit(now);
    }

    /// Leave focus mode and admit anything that was held
    pub fn end_workout(&mut self) {
        let now = self.begin();
        if self.attention.is_workout_active {
            tracing::info!(
                session_id = ?self.attention.workout_session_id,
                "Focus mode ended"
            );
        }
        self.attention = AttentionState::default();
        self.admit(now);
    }

    /// Drop everything (navigation, logout); dismissable or not
    ///
    /// Returns how many widgets were removed.
    pub fn clear(&mut self) -> usize {
        let now = self.clock.now_ms();
        let visible = std::mem::take(&mut self.visible);
        let queue = std::mem::take(&mut self.queue);
        let removed = visible.len() + queue.len();

        for widget in visible {
            self.retire(
                &widget.widget.payload,
                now,
                QueueEventKind::Dismissed {
                    reason: DismissReason::Navigation,
                    visible_ms: Some(now.saturating_sub(widget.shown_at)),
                },
            );
        }
        for widget in queue {
            self.retire(
                &widget.payload,
                now,
                QueueEventKind::Dismissed {
                    reason: DismissReason::Navigation,
                    visible_ms: None,
                },
            );
        }

        tracing::info!(removed = removed, "Widget queue cleared");
        removed
    }

    /// Evaluate expiry and admission at the current time
    ///
    /// Returns how many widgets were newly shown.
    pub fn tick(&mut self) -> usize {
        let now = self.begin();
        self.admit(now)
    }

    /// Retune the budget; admission re-runs immediately
    pub fn set_config(&mut self, config: AttentionBudgetConfig) {
        tracing::info!(
            max_visible_total = config.max_visible_total,
            max_visible_high_priority = config.max_visible_high_priority,
            max_visible_medium_priority = ?config.max_visible_medium_priority,
            cooldown_ms = config.cooldown_ms,
            "Attention budget updated"
        );
        self.config = config;
        self.prune_retired();
        let now = self.begin();
        self.admit(now);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Widgets currently admitted, in admission order
    #[must_use]
    pub fn visible(&self) -> &[VisibleWidget] {
        &self.visible
    }

    /// Widgets waiting, in arrival order
    #[must_use]
    pub fn queued(&self) -> &[QueuedWidget] {
        &self.queue
    }

    /// Whether `widget_id` is visible
    #[must_use]
    pub fn is_visible(&self, widget_id: &str) -> bool {
        self.visible.iter().any(|w| w.id() == widget_id)
    }

    /// Whether `widget_id` is waiting
    #[must_use]
    pub fn is_queued(&self, widget_id: &str) -> bool {
        self.queue.iter().any(|w| w.id() == widget_id)
    }

    /// Focus-mode state
    #[must_use]
    pub fn attention(&self) -> &AttentionState {
        &self.attention
    }

    /// Whether a workout is active
    #[must_use]
    pub fn is_workout_active(&self) -> bool {
        self.attention.is_workout_active
    }

    /// Current budget
    #[must_use]
    pub fn config(&self) -> &AttentionBudgetConfig {
        &self.config
    }

    /// Time of the most recent admission
    #[must_use]
    pub fn last_admission_at(&self) -> Option<u64> {
        self.last_admission_at
    }

    /// Whether another widget could be admitted right now
    #[must_use]
    pub fn can_show_more(&self) -> bool {
        self.visible.len() < self.config.max_visible_total && !self.cooling_down(self.clock.now_ms())
    }

    /// Counters for monitoring
    #[must_use]
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            queue_length: self.queue.len(),
            visible_count: self.visible.len(),
            visible_by_priority: self.visible_by_priority(),
            oldest_queued_at: self.queue.iter().map(|w| w.queued_at).min(),
            is_workout_active: self.attention.is_workout_active,
        }
    }

    /// Take every event recorded since the last drain
    pub fn drain_events(&mut self) -> Vec<QueueEvent> {
        self.events.drain(..).collect()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Read the clock and apply time-based removals
    fn begin(&mut self) -> u64 {
        let now = self.clock.now_ms();
        self.expire(now);
        now
    }

    /// Add a submission to the queue
    ///
    /// `Ok(Some(id))` when it took over the slot of a waiting duplicate.
    fn insert(&mut self, payload: QueueWidgetPayload, now: u64) -> Result<Option<String>, DropReason> {
        if self.retired.contains(&payload.widget_id) {
            tracing::debug!(widget_id = %payload.widget_id, "Ignoring retired widget id");
            self.push_event(QueueEvent::new(
                &payload,
                now,
                QueueEventKind::Dropped {
                    reason: DropReason::Retired,
                },
            ));
            return Err(DropReason::Retired);
        }
        if self.is_visible(&payload.widget_id) || self.is_queued(&payload.widget_id) {
            // The live entry keeps the id, so it is not retired
            self.push_event(QueueEvent::new(
                &payload,
                now,
                QueueEventKind::Dropped {
                    reason: DropReason::DuplicateId,
                },
            ));
            return Err(DropReason::DuplicateId);
        }

        let expires_at = now.saturating_add(self.ttl_ms(&payload));

        if let Some(index) = self.queue.iter().position(|w| w.same_slot(&payload)) {
            let slot = &mut self.queue[index];
            let previous = std::mem::replace(&mut slot.payload, payload);
            slot.expires_at = expires_at;
            slot.interacted = false;

            let replaced = previous.widget_id.clone();
            let event = QueueEvent::new(
                &slot.payload,
                now,
                QueueEventKind::Deduplicated {
                    replaced: replaced.clone(),
                },
            );
            tracing::debug!(
                widget_id = %slot.payload.widget_id,
                replaced = %replaced,
                "Widget deduplicated"
            );
            self.remember_retired(replaced.clone());
            self.push_event(event);
            return Ok(Some(replaced));
        }

        if self.queue.len() >= self.config.max_queue_size {
            match self.queue.iter().position(|w| w.payload.priority == Priority::Low) {
                Some(index) => {
                    let dropped = self.queue.remove(index);
                    tracing::warn!(
                        widget_id = %dropped.id(),
                        "Queue full, dropping oldest low-priority widget"
                    );
                    self.retire(
                        &dropped.payload,
                        now,
                        QueueEventKind::Dropped {
                            reason: DropReason::QueueFull,
                        },
                    );
                }
                None => {
                    tracing::warn!(
                        widget_id = %payload.widget_id,
                        queue_length = self.queue.len(),
                        "Queue full, dropping incoming widget"
                    );
                    self.retire(
                        &payload,
                        now,
                        QueueEventKind::Dropped {
                            reason: DropReason::QueueFull,
                        },
                    );
                    return Err(DropReason::QueueFull);
                }
            }
        }

        let event = QueueEvent::new(
            &payload,
            now,
            QueueEventKind::Queued {
                position: self.queue.len() + 1,
                expires_at,
            },
        );
        tracing::debug!(
            widget_id = %payload.widget_id,
            widget_type = %payload.widget_type,
            priority = %payload.priority,
            "Widget queued"
        );
        self.queue.push(QueuedWidget {
            payload,
            queued_at: now,
            expires_at,
            interacted: false,
        });
        self.push_event(event);
        Ok(None)
    }

    fn dismiss_at(&mut self, widget_id: &str, reason: DismissReason, now: u64) -> bool {
        let (payload, visible_ms) = if let Some(index) = self.visible.iter().position(|w| w.id() == widget_id) {
            if !self.visible[index].payload().dismissable {
                tracing::debug!(widget_id = %widget_id, "Widget is not dismissable");
                return false;
            }
            let widget = self.visible.remove(index);
            (widget.widget.payload, Some(now.saturating_sub(widget.shown_at)))
        } else if let Some(index) = self.queue.iter().position(|w| w.id() == widget_id) {
            if !self.queue[index].payload.dismissable {
                tracing::debug!(widget_id = %widget_id, "Widget is not dismissable");
                return false;
            }
            (self.queue.remove(index).payload, None)
        } else {
            return false;
        };

        tracing::info!(
            widget_id = %widget_id,
            widget_type = %payload.widget_type,
            reason = %reason,
            "Widget dismissed"
        );
        self.retire(&payload, now, QueueEventKind::Dismissed { reason, visible_ms });
        true
    }

    /// Queue TTL expiry and visible auto-dismiss
    fn expire(&mut self, now: u64) {
        let (expired, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.queue)
            .into_iter()
            .partition(|w| w.is_expired(now));
        self.queue = waiting;
        for widget in expired {
            tracing::debug!(widget_id = %widget.id(), "Queued widget expired");
            self.retire(
                &widget.payload,
                now,
                QueueEventKind::Expired {
                    queued_for_ms: now.saturating_sub(widget.queued_at),
                },
            );
        }

        let (due, shown): (Vec<_>, Vec<_>) = std::mem::take(&mut self.visible)
            .into_iter()
            .partition(|w| w.auto_dismiss_at.is_some_and(|at| at <= now));
        self.visible = shown;
        for widget in due {
            tracing::debug!(widget_id = %widget.id(), "Visible widget auto-dismissed");
            self.retire(
                &widget.widget.payload,
                now,
                QueueEventKind::Dismissed {
                    reason: DismissReason::AutoDismiss,
                    visible_ms: Some(now.saturating_sub(widget.shown_at)),
                },
            );
        }
    }

    /// Promote waiting widgets; returns how many were shown
    fn admit(&mut self, now: u64) -> usize {
        let mut admitted = 0;
        let mut index = 0;

        while index < self.queue.len() {
            let candidate = &self.queue[index].payload;

            if self.attention.is_workout_active
                && !self.config.allowed_during_workout(&candidate.widget_type)
            {
                index += 1;
                continue;
            }
            if self.visible.len() >= self.config.max_visible_total {
                break;
            }
            if self.at_priority_cap(candidate.priority, &self.visible_by_priority()) {
                index += 1;
                continue;
            }
            if self.cooling_down(now) {
                break;
            }

            let widget = self.queue.remove(index);
            self.show(widget, now);
            admitted += 1;
        }

        admitted
    }

    /// Evict a visible widget so the waiting `widget_id` can take its slot
    ///
    /// Only applies when a capacity ceiling is what holds the widget back.
    /// The victim shares its position group, is dismissable, and does not
    /// outrank it; the lowest priority (then the longest shown) goes first.
    fn replace_visible(&mut self, widget_id: &str, now: u64) -> bool {
        let Some(index) = self.queue.iter().position(|w| w.id() == widget_id) else {
            return false;
        };
        let incoming = &self.queue[index].payload;
        let (priority, position) = (incoming.priority, incoming.position);

        if self.attention.is_workout_active && !self.config.allowed_during_workout(&incoming.widget_type) {
            return false;
        }

        let total_cap = self.config.max_visible_total;
        let counts = self.visible_by_priority();
        let capacity_blocked = self.visible.len() >= total_cap || self.at_priority_cap(priority, &counts);
        if !capacity_blocked {
            return false;
        }

        let mut candidates: Vec<usize> = self
            .visible
            .iter()
            .enumerate()
            .filter(|(_, w)| {
                w.payload().position == position && w.payload().dismissable && w.priority() <= priority
            })
            .map(|(i, _)| i)
            .collect();
        candidates.sort_by_key(|&i| (self.visible[i].priority(), self.visible[i].shown_at, i));

        let victim = candidates.into_iter().find(|&i| {
            let mut after = counts;
            after.release(self.visible[i].priority());
            self.visible.len() - 1 < total_cap && !self.at_priority_cap(priority, &after)
        });
        let Some(victim) = victim else {
            return false;
        };

        let evicted = self.visible.remove(victim);
        let widget = self.queue.remove(index);
        tracing::info!(
            evicted = %evicted.id(),
            by = %widget_id,
            "Widget evicted by replace submission"
        );
        self.retire(
            &evicted.widget.payload,
            now,
            QueueEventKind::Evicted {
                by: widget_id.to_string(),
            },
        );
        self.show(widget, now);
        true
    }

    fn show(&mut self, widget: QueuedWidget, now: u64) {
        let auto_dismiss_at = self
            .auto_dismiss_ms(&widget.payload)
            .map(|ms| now.saturating_add(ms));

        tracing::info!(
            widget_id = %widget.id(),
            widget_type = %widget.payload.widget_type,
            priority = %widget.payload.priority,
            "Widget shown"
        );
        self.push_event(QueueEvent::new(
            &widget.payload,
            now,
            QueueEventKind::Shown {
                queue_wait_ms: now.saturating_sub(widget.queued_at),
            },
        ));

        self.visible.push(VisibleWidget {
            widget,
            shown_at: now,
            auto_dismiss_at,
        });
        self.last_admission_at = Some(now);
    }

    fn cooling_down(&self, now: u64) -> bool {
        !self.visible.is_empty()
            && self
                .last_admission_at
                .is_some_and(|last| now.saturating_sub(last) < self.config.cooldown_ms)
    }

    /// Whether another visible widget of `priority` would break its ceiling
    fn at_priority_cap(&self, priority: Priority, counts: &PriorityCounts) -> bool {
        let cap = match priority {
            Priority::High => Some(self.config.max_visible_high_priority),
            Priority::Medium => self.config.max_visible_medium_priority,
            Priority::Low => None,
        };
        cap.is_some_and(|cap| counts.get(priority) >= cap)
    }

    fn visible_by_priority(&self) -> PriorityCounts {
        let mut counts = PriorityCounts::default();
        for widget in &self.visible {
            counts.bump(widget.priority());
        }
        counts
    }

    fn ttl_ms(&self, payload: &QueueWidgetPayload) -> u64 {
        payload
            .ttl_seconds
            .or_else(|| {
                self.catalog
                    .as_ref()
                    .and_then(|c| c.spec(&payload.widget_type))
                    .and_then(|spec| spec.default_ttl_secs)
            })
            .map_or(self.config.default_ttl_ms, |secs| secs.saturating_mul(1_000))
    }

    fn auto_dismiss_ms(&self, payload: &QueueWidgetPayload) -> Option<u64> {
        payload
            .auto_dismiss_seconds
            .or_else(|| {
                self.catalog
                    .as_ref()
                    .and_then(|c| c.spec(&payload.widget_type))
                    .and_then(|spec| spec.auto_dismiss_secs)
            })
            .map(|secs| secs.saturating_mul(1_000))
    }

    /// Record a terminal transition
    fn retire(&mut self, payload: &QueueWidgetPayload, now: u64, kind: QueueEventKind) {
        self.remember_retired(payload.widget_id.clone());
        self.push_event(QueueEvent::new(payload, now, kind));
    }

    fn remember_retired(&mut self, widget_id: String) {
        if self.retired.insert(widget_id.clone()) {
            self.retired_order.push_back(widget_id);
        }
        self.prune_retired();
    }

    /// Forget the oldest retired ids beyond `max_retired_ids`
    fn prune_retired(&mut self) {
        while self.retired_order.len() > self.config.max_retired_ids {
            if let Some(oldest) = self.retired_order.pop_front() {
                self.retired.remove(&oldest);
            }
        }
    }

    fn push_event(&mut self, event: QueueEvent) {
        if self.events.len() >= MAX_PENDING_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

impl fmt::Debug for WidgetQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetQueue")
            .field("queued", &self.queue.len())
            .field("visible", &self.visible.len())
            .field("attention", &self.attention)
            .field("last_admission_at", &self.last_admission_at)
            .field("retired", &self.retired.len())
            .finish()
    }
}
