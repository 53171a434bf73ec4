//! Shared store handle
//!
//! The core is single-writer, but a host may run more than one conversational
//! flow against the same store. [`SharedSurfaceStore`] wraps the store in
//! `Arc<RwLock<>>` so every public call takes the lock exactly once: each call
//! fully applies or fully no-ops, while ordering between flows stays the
//! caller's responsibility.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Surface, SurfaceStore, SurfaceZone};
use crate::protocol::{BackendResponse, InterpretResult, Interpreter};

/// Cloneable, thread-safe handle to one [`SurfaceStore`]
#[derive(Clone, Default)]
pub struct SharedSurfaceStore {
    inner: Arc<RwLock<SurfaceStore>>,
}

impl SharedSurfaceStore {
    /// Wrap an existing store
    #[must_use]
    pub fn new(store: SurfaceStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Run `f` with shared access
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SurfaceStore) -> R,
    {
        f(&*self.inner.read())
    }

    /// Run `f` with exclusive access
    pub fn write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut SurfaceStore) -> R,
    {
        f(&mut *self.inner.write())
    }

    /// Interpret a whole response under one write lock
    pub fn interpret(&self, interpreter: &Interpreter, response: &BackendResponse) -> InterpretResult {
        interpreter.interpret(response, &mut *self.inner.write())
    }

    /// Clone of a single surface
    #[must_use]
    pub fn get_surface(&self, id: &str) -> Option<Surface> {
        self.inner.read().get_surface(id).cloned()
    }

    /// Clones of the non-dismissed surfaces in `zone`
    #[must_use]
    pub fn zone_surfaces(&self, zone: SurfaceZone) -> Vec<Surface> {
        self.inner
            .read()
            .zone_surfaces(zone)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Number of handles sharing this store
    #[must_use]
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl From<SurfaceStore> for SharedSurfaceStore {
    fn from(store: SurfaceStore) -> Self {
        Self::new(store)
    }
}

impl fmt::Debug for SharedSurfaceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSurfaceStore")
            .field("surface_count", &self.inner.read().len())
            .field("handles", &self.handle_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handles_share_state() {
        let shared = SharedSurfaceStore::default();
        let other = shared.clone();
        assert_eq!(shared.handle_count(), 2);

        shared.write(|store| {
            store.create_surface("s1", SurfaceZone::Stream, "workout-card", None, None);
        });

        assert!(other.get_surface("s1").is_some());
        assert_eq!(other.zone_surfaces(SurfaceZone::Stream).len(), 1);
        assert_eq!(other.read(SurfaceStore::len), 1);
    }

    #[test]
    fn test_concurrent_writers_keep_every_surface() {
        let shared = SharedSurfaceStore::default();

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let shared = shared.clone();
                scope.spawn(move || {
                    for i in 0..25 {
                        shared.write(|store| {
                            store.create_surface(
                                format!("w{worker}-{i}"),
                                SurfaceZone::Stream,
                                "insight-card",
                                None,
                                None,
                            );
                        });
                    }
                });
            }
        });

        assert_eq!(shared.read(SurfaceStore::len), 100);
    }

    #[test]
    fn test_interpret_under_lock() {
        let shared = SharedSurfaceStore::default();
        let interpreter = Interpreter::new();
        let response = BackendResponse::from_value(json!({
            "text": "Here you go",
            "operations": [
                {"createSurface": {"surfaceId": "s1", "zone": "stream", "catalogId": "workout-card"}}
            ]
        }))
        .unwrap();

        let result = shared.interpret(&interpreter, &response);
        assert_eq!(result.operations_processed, 1);
        assert_eq!(result.message.surface_id.as_deref(), Some("s1"));
        assert!(shared.get_surface("s1").is_some());
    }
}
