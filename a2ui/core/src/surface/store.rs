//! Surface Store
//!
//! Canonical state of every agent-controlled surface. All mutations are
//! synchronous and run to completion; each public method either fully
//! applies or is a no-op.
//!
//! # Dangling references
//!
//! Any mutation that names a surface the store does not hold is silently
//! ignored. Operations may arrive out of order or be replayed, and the store
//! favours resilience over strictness. Callers that care can inspect the
//! `bool` the mutators return.
//!
//! # Persistence
//!
//! When a [`StateStorage`](crate::storage::StateStorage) is attached, every
//! mutation writes a snapshot through it. Snapshots are a flat JSON object of
//! surface id to surface record and never contain dismissed surfaces.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::clock::{system_clock, SharedClock};
use crate::storage::SharedStorage;

use super::{DataModel, StoreError, Surface, SurfaceState, SurfaceZone};

/// Storage item name used for snapshots unless configured otherwise
pub const DEFAULT_SURFACE_KEY: &str = "surface-store";

/// Persisted form: surface id to surface record
pub type SurfaceSnapshot = BTreeMap<String, Surface>;

/// Store of all surfaces, keyed by id
pub struct SurfaceStore {
    /// All surfaces, keyed by ID
    surfaces: HashMap<String, Surface>,
    /// Insertion order for stable selector output
    order: Vec<String>,
    clock: SharedClock,
    storage: Option<SharedStorage>,
    storage_key: String,
}

impl Default for SurfaceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceStore {
    /// Create an empty store on the system clock, without persistence
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Create an empty store reading time from `clock`
    #[must_use]
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            surfaces: HashMap::new(),
            order: Vec::new(),
            clock,
            storage: None,
            storage_key: DEFAULT_SURFACE_KEY.to_string(),
        }
    }

    /// Attach a storage port; snapshots are written under `key`
    #[must_use]
    pub fn with_storage(mut self, storage: SharedStorage, key: impl Into<String>) -> Self {
        self.storage = Some(storage);
        self.storage_key = key.into();
        self
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Insert a new active surface
    ///
    /// Re-creating an existing id overwrites the record (content, zone and
    /// timestamps are all reset) so replayed operations stay idempotent.
    pub fn create_surface(
        &mut self,
        id: impl Into<String>,
        zone: SurfaceZone,
        widget_type: impl Into<String>,
        data_model: Option<DataModel>,
        linked_message_id: Option<String>,
    ) {
        let id = id.into();
        let now = self.clock.now_ms();
        let surface = Surface {
            id: id.clone(),
            zone,
            widget_type: widget_type.into(),
            data_model: data_model.unwrap_or_default(),
            state: SurfaceState::Active,
            linked_message_id,
            created_at: now,
            updated_at: now,
        };

        tracing::debug!(
            surface_id = %id,
            zone = %zone,
            widget_type = %surface.widget_type,
            "Surface created"
        );

        if self.surfaces.insert(id.clone(), surface).is_none() {
            self.order.push(id);
        }
        self.persist();
    }

    /// Recompose a surface to a different widget type
    ///
    /// Returns `false` (and changes nothing) if the surface does not exist.
    pub fn update_components(&mut self, surface_id: &str, widget_type: impl Into<String>) -> bool {
        let widget_type = widget_type.into();
        let applied = self.mutate(surface_id, |surface| {
            surface.widget_type = widget_type;
        });
        if applied {
            tracing::debug!(surface_id = %surface_id, "Surface components updated");
            self.persist();
        }
        applied
    }

    /// Shallow-merge `patch` into a surface's data model
    ///
    /// Returns `false` (and changes nothing) if the surface does not exist.
    pub fn update_data_model(&mut self, surface_id: &str, patch: DataModel) -> bool {
        let keys = patch.len();
        let applied = self.mutate(surface_id, |surface| surface.merge_data_model(patch));
        if applied {
            tracing::debug!(surface_id = %surface_id, keys = keys, "Surface data model merged");
            self.persist();
        }
        applied
    }

    /// Hard-delete a surface, returning the removed record
    pub fn delete_surface(&mut self, surface_id: &str) -> Option<Surface> {
        let removed = self.surfaces.remove(surface_id);
        if removed.is_some() {
            self.order.retain(|id| id != surface_id);
            tracing::debug!(surface_id = %surface_id, "Surface deleted");
            self.persist();
        }
        removed
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Disable interaction on an active surface
    pub fn freeze_surface(&mut self, surface_id: &str) -> bool {
        self.transition(surface_id, SurfaceState::Active, SurfaceState::Frozen)
    }

    /// Re-enable interaction on a frozen surface
    pub fn resume_surface(&mut self, surface_id: &str) -> bool {
        self.transition(surface_id, SurfaceState::Frozen, SurfaceState::Active)
    }

    /// Soft-dismiss a surface
    ///
    /// The record stays in the store (so a repeated delete is harmless) but
    /// disappears from selectors and snapshots.
    pub fn mark_dismissed(&mut self, surface_id: &str) -> bool {
        let applied = self.mutate(surface_id, |surface| {
            surface.state = SurfaceState::Dismissed;
        });
        if applied {
            tracing::debug!(surface_id = %surface_id, "Surface dismissed");
            self.persist();
        }
        applied
    }

    /// Remove every surface in `zone`, whatever its state
    ///
    /// Returns the number of surfaces removed.
    pub fn clear_zone(&mut self, zone: SurfaceZone) -> usize {
        let before = self.surfaces.len();
        self.surfaces.retain(|_, surface| surface.zone != zone);
        let surfaces = &self.surfaces;
        self.order.retain(|id| surfaces.contains_key(id));

        let removed = before - self.surfaces.len();
        tracing::info!(zone = %zone, removed = removed, "Zone cleared");
        if removed > 0 {
            self.persist();
        }
        removed
    }

    /// Remove everything
    pub fn clear_all(&mut self) {
        let removed = self.surfaces.len();
        self.surfaces.clear();
        self.order.clear();
        tracing::info!(removed = removed, "Surface store cleared");
        self.persist();
    }

    // =========================================================================
    // Selectors
    // =========================================================================

    /// Look up a surface by id, whatever its state
    #[must_use]
    pub fn get_surface(&self, id: &str) -> Option<&Surface> {
        self.surfaces.get(id)
    }

    /// Whether a surface with this id is held (in any state)
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.surfaces.contains_key(id)
    }

    /// Non-dismissed surfaces in the `context` zone
    #[must_use]
    pub fn context_surfaces(&self) -> Vec<&Surface> {
        self.zone_surfaces(SurfaceZone::Context)
    }

    /// Non-dismissed surfaces in the `stream` zone
    #[must_use]
    pub fn stream_surfaces(&self) -> Vec<&Surface> {
        self.zone_surfaces(SurfaceZone::Stream)
    }

    /// Non-dismissed surfaces in the `overlay` zone
    #[must_use]
    pub fn overlay_surfaces(&self) -> Vec<&Surface> {
        self.zone_surfaces(SurfaceZone::Overlay)
    }

    /// Non-dismissed surfaces in `zone`, in insertion order
    #[must_use]
    pub fn zone_surfaces(&self, zone: SurfaceZone) -> Vec<&Surface> {
        self.iter()
            .filter(|s| s.zone == zone && s.state.is_visible())
            .collect()
    }

    /// Surfaces in the `active` state, optionally restricted to one zone
    #[must_use]
    pub fn active_surfaces(&self, zone: Option<SurfaceZone>) -> Vec<&Surface> {
        self.iter()
            .filter(|s| s.is_active())
            .filter(|s| zone.map_or(true, |z| s.zone == z))
            .collect()
    }

    /// Every record in insertion order, dismissed ones included
    #[must_use]
    pub fn all_surfaces(&self) -> Vec<&Surface> {
        self.iter().collect()
    }

    /// Iterate every record in insertion order, dismissed ones included
    pub fn iter(&self) -> impl Iterator<Item = &Surface> {
        self.order.iter().filter_map(|id| self.surfaces.get(id))
    }

    /// Number of records held (dismissed ones included)
    #[must_use]
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Whether the store holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Persistable view of the store (dismissed surfaces excluded)
    #[must_use]
    pub fn snapshot(&self) -> SurfaceSnapshot {
        self.surfaces
            .iter()
            .filter(|(_, s)| s.state.is_visible())
            .map(|(id, s)| (id.clone(), s.clone()))
            .collect()
    }

    /// Replace the store's contents with `snapshot`, verbatim
    pub fn restore_snapshot(&mut self, snapshot: SurfaceSnapshot) {
        let mut records: Vec<Surface> = snapshot.into_values().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        self.surfaces.clear();
        self.order.clear();
        for surface in records {
            self.order.push(surface.id.clone());
            self.surfaces.insert(surface.id.clone(), surface);
        }
    }

    /// Write a snapshot through the attached storage port
    ///
    /// Without storage this does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the storage write fails.
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        let json = serde_json::to_string(&self.snapshot())?;
        storage.set_item(&self.storage_key, &json)?;
        Ok(())
    }

    /// Load the snapshot from the attached storage port
    ///
    /// Returns how many surfaces were restored. A missing item (or no
    /// storage at all) restores nothing and leaves the store untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails or the snapshot is corrupt.
    pub fn restore(&mut self) -> Result<usize, StoreError> {
        let Some(storage) = &self.storage else {
            return Ok(0);
        };
        let Some(json) = storage.get_item(&self.storage_key)? else {
            return Ok(0);
        };

        let snapshot: SurfaceSnapshot = serde_json::from_str(&json)?;
        let count = snapshot.len();
        self.restore_snapshot(snapshot);
        tracing::info!(key = %self.storage_key, restored = count, "Surface store restored");
        Ok(count)
    }

    /// Delete the persisted snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the storage port fails.
    pub fn forget_persisted(&self) -> Result<(), StoreError> {
        if let Some(storage) = &self.storage {
            storage.remove_item(&self.storage_key)?;
        }
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Apply `f` to an existing surface and bump `updated_at`
    fn mutate<F>(&mut self, surface_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Surface),
    {
        let now = self.clock.now_ms();
        match self.surfaces.get_mut(surface_id) {
            Some(surface) => {
                f(surface);
                surface.updated_at = now.max(surface.updated_at);
                true
            }
            None => {
                tracing::debug!(surface_id = %surface_id, "Ignoring mutation of unknown surface");
                false
            }
        }
    }

    fn transition(&mut self, surface_id: &str, from: SurfaceState, to: SurfaceState) -> bool {
        let eligible = self
            .surfaces
            .get(surface_id)
            .is_some_and(|s| s.state == from);
        if !eligible {
            return false;
        }

        self.mutate(surface_id, |surface| surface.state = to);
        tracing::debug!(surface_id = %surface_id, state = ?to, "Surface state changed");
        self.persist();
        true
    }

    /// Write-through after a mutation; failures are logged, not raised
    fn persist(&self) {
        if let Err(e) = self.save() {
            tracing::warn!(error = %e, key = %self.storage_key, "Failed to persist surface snapshot");
        }
    }
}

impl fmt::Debug for SurfaceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceStore")
            .field("surface_count", &self.surfaces.len())
            .field("surfaces", &self.order)
            .field("persistent", &self.storage.is_some())
            .finish()
    }
}
