//! Widget Catalog
//!
//! Agents never invent UI: they name a widget type from a fixed catalog, and
//! the catalog supplies everything the core needs to know about it (owner,
//! default priority and position, time-to-live, focus-mode eligibility, and
//! a plain-text fallback for when the widget cannot be rendered).
//!
//! The core only *queries* a catalog through [`WidgetCatalog`]. Rendering and
//! per-widget validation belong to the host. [`BuiltinCatalog`] ships the
//! stock fitness widget set.

use std::collections::{BTreeMap, BTreeSet};

use crate::attention::{Position, Priority, QueueBehavior};

/// Catalog metadata for one widget type
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WidgetSpec {
    /// Catalog key
    pub widget_type: String,
    /// Agent that owns this widget
    pub owner_agent: String,
    /// Priority when the submission does not set one
    pub default_priority: Priority,
    /// Position when the submission does not set one
    pub default_position: Position,
    /// Budget behaviour when the submission does not set one
    pub default_queue_behavior: QueueBehavior,
    /// How long the widget may wait in the queue
    pub default_ttl_secs: Option<u64>,
    /// How long the widget stays visible before dismissing itself
    pub auto_dismiss_secs: Option<u64>,
    /// Eligible for admission while a workout is active
    pub allow_during_workout: bool,
    /// Text shown if the widget cannot be rendered
    pub fallback_message: String,
}

impl WidgetSpec {
    /// Spec with medium/inline/defer defaults
    pub fn new(widget_type: impl Into<String>, owner_agent: impl Into<String>) -> Self {
        Self {
            widget_type: widget_type.into(),
            owner_agent: owner_agent.into(),
            default_priority: Priority::Medium,
            default_position: Position::Inline,
            default_queue_behavior: QueueBehavior::Defer,
            default_ttl_secs: None,
            auto_dismiss_secs: None,
            allow_during_workout: false,
            fallback_message: String::new(),
        }
    }

    /// Set the default priority
    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.default_priority = priority;
        self
    }

    /// Set the default position
    #[must_use]
    pub fn position(mut self, position: Position) -> Self {
        self.default_position = position;
        self
    }

    /// Default to evicting a visible widget when the budget is full
    #[must_use]
    pub fn replaces(mut self) -> Self {
        self.default_queue_behavior = QueueBehavior::Replace;
        self
    }

    /// Set the default queue time-to-live
    #[must_use]
    pub fn ttl_secs(mut self, secs: u64) -> Self {
        self.default_ttl_secs = Some(secs);
        self
    }

    /// Set the auto-dismiss delay
    #[must_use]
    pub fn auto_dismiss_secs(mut self, secs: u64) -> Self {
        self.auto_dismiss_secs = Some(secs);
        self
    }

    /// Allow this widget during focus mode
    #[must_use]
    pub fn during_workout(mut self) -> Self {
        self.allow_during_workout = true;
        self
    }

    /// Set the render fallback text
    #[must_use]
    pub fn fallback(mut self, message: impl Into<String>) -> Self {
        self.fallback_message = message.into();
        self
    }
}

/// Read-only catalog lookup
pub trait WidgetCatalog: Send + Sync {
    /// Metadata for a widget type, `None` if the type is unknown
    fn spec(&self, widget_type: &str) -> Option<&WidgetSpec>;

    /// Every known widget type
    fn widget_types(&self) -> Vec<&str>;

    /// Whether the type can be rendered
    fn is_known(&self, widget_type: &str) -> bool {
        self.spec(widget_type).is_some()
    }

    /// Whether the type may surface during focus mode (unknown types may not)
    fn allowed_during_workout(&self, widget_type: &str) -> bool {
        self.spec(widget_type)
            .is_some_and(|spec| spec.allow_during_workout)
    }
}

/// In-memory catalog
#[derive(Clone, Debug, Default)]
pub struct BuiltinCatalog {
    specs: BTreeMap<String, WidgetSpec>,
}

impl BuiltinCatalog {
    /// The stock fitness widget set
    #[must_use]
    pub fn new() -> Self {
        let mut catalog = Self::empty();
        for spec in stock_widgets() {
            catalog.insert(spec);
        }
        catalog
    }

    /// A catalog with no widgets
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add or replace a widget
    pub fn insert(&mut self, spec: WidgetSpec) {
        self.specs.insert(spec.widget_type.clone(), spec);
    }

    /// Number of widget types
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Widgets owned by `agent`
    #[must_use]
    pub fn by_agent(&self, agent: &str) -> Vec<&WidgetSpec> {
        self.specs
            .values()
            .filter(|spec| spec.owner_agent == agent)
            .collect()
    }

    /// Widgets whose default priority is `priority`
    #[must_use]
    pub fn by_priority(&self, priority: Priority) -> Vec<&WidgetSpec> {
        self.specs
            .values()
            .filter(|spec| spec.default_priority == priority)
            .collect()
    }

    /// Widget types eligible during focus mode
    #[must_use]
    pub fn focus_allowlist(&self) -> BTreeSet<String> {
        self.specs
            .values()
            .filter(|spec| spec.allow_during_workout)
            .map(|spec| spec.widget_type.clone())
            .collect()
    }
}

impl WidgetCatalog for BuiltinCatalog {
    fn spec(&self, widget_type: &str) -> Option<&WidgetSpec> {
        self.specs.get(widget_type)
    }

    fn widget_types(&self) -> Vec<&str> {
        self.specs.keys().map(String::as_str).collect()
    }
}

fn stock_widgets() -> Vec<WidgetSpec> {
    use Position::Floating;
    use Priority::{High, Low, Medium};

    vec![
        // Habits and mindset
        WidgetSpec::new("morning-checkin", "SPARK")
            .priority(High)
            .replaces()
            .ttl_secs(4 * 60 * 60)
            .fallback("How are you feeling today? Tell me about sleep, energy and stress."),
        WidgetSpec::new("focus-ritual", "SPARK")
            .ttl_secs(300)
            .during_workout()
            .fallback("Take a moment to focus before you start."),
        WidgetSpec::new("breathwork-guide", "SPARK")
            .during_workout()
            .fallback("Guided breathing."),
        WidgetSpec::new("habit-tracker", "SPARK")
            .priority(Low)
            .fallback("Did you complete your habits today?"),
        // Orchestrator
        WidgetSpec::new("daily-briefing", "GENESIS")
            .priority(High)
            .replaces()
            .ttl_secs(2 * 60 * 60)
            .fallback("Here is your plan for today. Ready to start?"),
        WidgetSpec::new("quick-actions", "GENESIS")
            .priority(Low)
            .fallback("Quick actions available."),
        // Strength
        WidgetSpec::new("workout-card", "BLAZE")
            .priority(High)
            .replaces()
            .ttl_secs(60 * 60)
            .fallback("Today's session is ready. Shall we begin?"),
        WidgetSpec::new("rest-timer", "BLAZE")
            .priority(High)
            .position(Floating)
            .replaces()
            .during_workout()
            .fallback("Resting..."),
        WidgetSpec::new("timer-widget", "BLAZE")
            .replaces()
            .during_workout()
            .fallback("Timer running."),
        WidgetSpec::new("plate-calculator", "BLAZE")
            .priority(Low)
            .during_workout()
            .fallback("Plate calculator."),
        // Cardio
        WidgetSpec::new("heart-rate-zone", "TEMPO")
            .position(Floating)
            .replaces()
            .during_workout()
            .fallback("Current heart rate zone."),
        // Mobility
        WidgetSpec::new("mobility-routine", "ATLAS").fallback("Recommended mobility routine."),
        // Recovery
        WidgetSpec::new("recovery-score", "WAVE")
            .replaces()
            .fallback("Today's recovery score."),
        WidgetSpec::new("hrv-trend", "WAVE")
            .priority(Low)
            .fallback("HRV trend."),
        WidgetSpec::new("deload-suggestion", "WAVE")
            .priority(High)
            .fallback("Your body needs a deload."),
        // Nutrition
        WidgetSpec::new("meal-plan", "SAGE").fallback("Your meal plan."),
        WidgetSpec::new("hydration-reminder", "MACRO")
            .priority(Low)
            .position(Floating)
            .ttl_secs(20 * 60)
            .auto_dismiss_secs(10)
            .during_workout()
            .fallback("Time to hydrate."),
        WidgetSpec::new("post-workout-window", "MACRO")
            .priority(High)
            .replaces()
            .ttl_secs(60 * 60)
            .fallback("Your post-workout window is open. Time for protein."),
        WidgetSpec::new("supplement-timing", "NOVA")
            .priority(Low)
            .position(Floating)
            .ttl_secs(60 * 60)
            .fallback("Supplement reminder."),
        // Analytics and education
        WidgetSpec::new("progress-insight", "STELLA").fallback("Here is your progress insight."),
        WidgetSpec::new("insight-card", "STELLA")
            .priority(Low)
            .fallback("An insight based on your data."),
        WidgetSpec::new("micro-learning", "LOGOS")
            .priority(Low)
            .ttl_secs(24 * 60 * 60)
            .fallback("Today's quick fact."),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let catalog = BuiltinCatalog::new();
        let spec = catalog.spec("workout-card").unwrap();

        assert_eq!(spec.owner_agent, "BLAZE");
        assert_eq!(spec.default_priority, Priority::High);
        assert_eq!(spec.default_queue_behavior, QueueBehavior::Replace);
        assert_eq!(spec.default_ttl_secs, Some(3600));
        assert!(!spec.fallback_message.is_empty());

        assert!(catalog.is_known("rest-timer"));
        assert!(!catalog.is_known("hologram"));
    }

    #[test]
    fn test_focus_allowlist() {
        let catalog = BuiltinCatalog::new();
        let allowlist = catalog.focus_allowlist();

        assert!(allowlist.contains("rest-timer"));
        assert!(allowlist.contains("hydration-reminder"));
        assert!(!allowlist.contains("workout-card"));
        assert!(!catalog.allowed_during_workout("hologram"));
    }

    #[test]
    fn test_filters() {
        let catalog = BuiltinCatalog::new();
        assert!(catalog
            .by_agent("BLAZE")
            .iter()
            .all(|spec| spec.owner_agent == "BLAZE"));
        assert_eq!(catalog.by_agent("BLAZE").len(), 4);
        assert!(catalog
            .by_priority(Priority::Low)
            .iter()
            .any(|spec| spec.widget_type == "hrv-trend"));
        assert_eq!(catalog.widget_types().len(), catalog.len());
    }

    #[test]
    fn test_insert_overrides() {
        let mut catalog = BuiltinCatalog::empty();
        assert!(catalog.is_empty());

        catalog.insert(WidgetSpec::new("custom", "GENESIS"));
        catalog.insert(WidgetSpec::new("custom", "GENESIS").during_workout());

        assert_eq!(catalog.len(), 1);
        assert!(catalog.allowed_during_workout("custom"));
    }
}
