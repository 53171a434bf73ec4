//! Surfaces
//!
//! A surface is one agent-controlled region of UI: it lives in a zone, mounts
//! a widget type, and carries that widget's content as a JSON data model.
//! The [`SurfaceStore`] owns every surface and is the single canonical source
//! the rendering layer reads from.
//!
//! # Zones
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ context   persistent header surfaces     │
//! ├──────────────────────────────────────────┤
//! │ stream    inline, tied to a chat turn    │
//! │           ┌───────────────────────┐      │
//! │           │ overlay  floating     │      │
//! │           └───────────────────────┘      │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! `active ⇄ frozen`, and either may become `dismissed`. Dismissed surfaces
//! are invisible to every selector and never persisted.

mod shared;
mod store;

pub use shared::SharedSurfaceStore;
pub use store::{SurfaceSnapshot, SurfaceStore, DEFAULT_SURFACE_KEY};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::protocol::resolve_pointer;
use crate::storage::StorageError;

/// Widget content: a JSON object keyed by field name
pub type DataModel = serde_json::Map<String, Value>;

/// Structural slot a surface occupies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceZone {
    /// Persistent header-area surface
    Context,
    /// Inline surface attached to a conversation turn
    Stream,
    /// Floating surface layered above content
    Overlay,
}

impl SurfaceZone {
    /// All zones, in display order
    pub const ALL: [Self; 3] = [Self::Context, Self::Stream, Self::Overlay];

    /// Wire name of the zone
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Stream => "stream",
            Self::Overlay => "overlay",
        }
    }
}

impl fmt::Display for SurfaceZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SurfaceZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "context" => Ok(Self::Context),
            "stream" => Ok(Self::Stream),
            "overlay" => Ok(Self::Overlay),
            other => Err(format!("unknown surface zone: {other}")),
        }
    }
}

/// Lifecycle state of a surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceState {
    /// Interactive
    Active,
    /// Interaction disabled, content preserved (the widget's action was taken)
    Frozen,
    /// Logically deleted
    Dismissed,
}

impl SurfaceState {
    /// Whether selectors should return a surface in this state
    #[must_use]
    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::Dismissed)
    }
}

/// A single agent-controlled region of UI
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Surface {
    /// Unique identifier for the lifetime of the store
    pub id: String,
    /// Zone the surface lives in (immutable after creation)
    pub zone: SurfaceZone,
    /// Widget to mount; operations may recompose it
    pub widget_type: String,
    /// Widget content
    #[serde(default)]
    pub data_model: DataModel,
    /// Lifecycle state
    pub state: SurfaceState,
    /// Conversation turn that created this surface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_message_id: Option<String>,
    /// Creation time (Unix ms)
    pub created_at: u64,
    /// Last mutation time (Unix ms)
    pub updated_at: u64,
}

impl Surface {
    /// Whether the surface accepts interaction
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == SurfaceState::Active
    }

    /// Whether the surface is frozen
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.state == SurfaceState::Frozen
    }

    /// Resolve a `/slash/path` against the data model
    #[must_use]
    pub fn pointer(&self, path: &str) -> Option<&Value> {
        resolve_pointer(&self.data_model, path)
    }

    /// Shallow merge: keys in `patch` overwrite, everything else is kept
    pub(crate) fn merge_data_model(&mut self, patch: DataModel) {
        for (key, value) in patch {
            self.data_model.insert(key, value);
        }
    }
}

/// Errors from snapshot persistence
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage port failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Snapshot could not be encoded or decoded
    #[error("Surface snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zone_roundtrip() {
        for zone in SurfaceZone::ALL {
            assert_eq!(zone.as_str().parse::<SurfaceZone>().unwrap(), zone);
        }
        assert!("sidebar".parse::<SurfaceZone>().is_err());
    }

    #[test]
    fn test_surface_wire_shape() {
        let surface = Surface {
            id: "s1".to_string(),
            zone: SurfaceZone::Stream,
            widget_type: "workout-card".to_string(),
            data_model: json!({"title": "Push Day"}).as_object().cloned().unwrap(),
            state: SurfaceState::Frozen,
            linked_message_id: None,
            created_at: 1,
            updated_at: 2,
        };

        let value = serde_json::to_value(&surface).unwrap();
        assert_eq!(value["zone"], "stream");
        assert_eq!(value["state"], "frozen");
        assert_eq!(value["widgetType"], "workout-card");
        assert_eq!(value["dataModel"]["title"], "Push Day");
        assert!(value.get("linkedMessageId").is_none());
    }

    #[test]
    fn test_surface_pointer() {
        let surface = Surface {
            id: "s1".to_string(),
            zone: SurfaceZone::Context,
            widget_type: "recovery-score".to_string(),
            data_model: json!({"score": {"value": 82}}).as_object().cloned().unwrap(),
            state: SurfaceState::Active,
            linked_message_id: None,
            created_at: 0,
            updated_at: 0,
        };

        assert_eq!(surface.pointer("/score/value"), Some(&json!(82)));
        assert_eq!(surface.pointer("score/value"), None);
    }
}
