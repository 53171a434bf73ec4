//! Attention budget tuning

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::BuiltinCatalog;

/// Default maximum number of visible widgets
pub const DEFAULT_MAX_VISIBLE_TOTAL: usize = 3;

/// Default maximum number of visible `high` widgets
pub const DEFAULT_MAX_VISIBLE_HIGH_PRIORITY: usize = 1;

/// Default minimum gap between two admissions
pub const DEFAULT_COOLDOWN_MS: u64 = 5_000;

/// Default maximum number of waiting widgets
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 20;

/// Default queue time-to-live (5 minutes)
pub const DEFAULT_TTL_MS: u64 = 5 * 60 * 1_000;

/// Default number of finished widget ids remembered to refuse re-admission
pub const DEFAULT_MAX_RETIRED_IDS: usize = 1_000;

/// Limits enforced by [`WidgetQueue`](super::WidgetQueue)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttentionBudgetConfig {
    /// Ceiling on visible widgets
    pub max_visible_total: usize,
    /// Ceiling on visible `high` widgets
    pub max_visible_high_priority: usize,
    /// Optional ceiling on visible `medium` widgets (off by default)
    #[serde(default)]
    pub max_visible_medium_priority: Option<usize>,
    /// Minimum gap between consecutive admissions while something is visible
    pub cooldown_ms: u64,
    /// Ceiling on waiting widgets
    pub max_queue_size: usize,
    /// Finished ids remembered; the oldest is forgotten first
    #[serde(default = "default_max_retired_ids")]
    pub max_retired_ids: usize,
    /// Queue TTL when neither the submission nor the catalog sets one
    pub default_ttl_ms: u64,
    /// Widget types eligible while a workout is active
    pub focus_allowlist: BTreeSet<String>,
}

impl Default for AttentionBudgetConfig {
    fn default() -> Self {
        Self {
            max_visible_total: DEFAULT_MAX_VISIBLE_TOTAL,
            max_visible_high_priority: DEFAULT_MAX_VISIBLE_HIGH_PRIORITY,
            max_visible_medium_priority: None,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            max_retired_ids: DEFAULT_MAX_RETIRED_IDS,
            default_ttl_ms: DEFAULT_TTL_MS,
            focus_allowlist: BuiltinCatalog::new().focus_allowlist(),
        }
    }
}

fn default_max_retired_ids() -> usize {
    DEFAULT_MAX_RETIRED_IDS
}

impl AttentionBudgetConfig {
    /// Whether `widget_type` may surface during focus mode
    #[must_use]
    pub fn allowed_during_workout(&self, widget_type: &str) -> bool {
        self.focus_allowlist.contains(widget_type)
    }

    /// Builder: set the cooldown
    #[must_use]
    pub fn with_cooldown_ms(mut self, cooldown_ms: u64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }

    /// Builder: set both visible ceilings
    #[must_use]
    pub fn with_limits(mut self, total: usize, high: usize) -> Self {
        self.max_visible_total = total;
        self.max_visible_high_priority = high;
        self
    }

    /// Builder: cap visible `medium` widgets
    #[must_use]
    pub fn with_medium_limit(mut self, medium: usize) -> Self {
        self.max_visible_medium_priority = Some(medium);
        self
    }

    /// Builder: set how many finished ids are remembered
    #[must_use]
    pub fn with_max_retired_ids(mut self, max: usize) -> Self {
        self.max_retired_ids = max;
        self
    }

    /// Builder: replace the focus allowlist
    #[must_use]
    pub fn with_focus_allowlist<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.focus_allowlist = types.into_iter().map(Into::into).collect();
        self
    }
}
