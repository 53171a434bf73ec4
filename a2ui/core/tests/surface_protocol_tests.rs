//! Integration tests for the surface store and protocol interpreter
//!
//! These drive complete backend responses through the interpreter and check
//! the resulting store state:
//! - overwrite semantics and id uniqueness
//! - dismissed surfaces never leak into selectors or snapshots
//! - shallow data-model merge
//! - zone wildcard deletes
//! - equivalence of the operation and legacy formats
//! - best-effort batches

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use a2ui_core::protocol::ResponseFormat;
use a2ui_core::{
    BackendResponse, DataModel, FileStorage, Interpreter, ManualClock, MemoryStorage,
    ProtocolError, SharedClock, SharedStorage, Surface, SurfaceState, SurfaceStore, SurfaceZone,
};

fn clocked() -> (SharedClock, ManualClock) {
    let clock = ManualClock::new(1_700_000_000_000);
    (Arc::new(clock.clone()), clock)
}

fn model(value: Value) -> DataModel {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

fn response(value: Value) -> BackendResponse {
    BackendResponse::from_value(value).unwrap()
}

/// Fields that must match across formats (timestamps, ids and links vary)
fn shape(surface: &Surface) -> (SurfaceZone, String, DataModel, SurfaceState) {
    (
        surface.zone,
        surface.widget_type.clone(),
        surface.data_model.clone(),
        surface.state,
    )
}

// =============================================================================
// Surface Store
// =============================================================================

#[test]
fn test_recreate_never_duplicates() {
    let (clock, manual) = clocked();
    let mut store = SurfaceStore::with_clock(clock);

    for round in 0..5 {
        manual.advance(10);
        store.create_surface(
            "s1",
            SurfaceZone::Stream,
            format!("widget-{round}"),
            Some(model(json!({ "round": round }))),
            None,
        );
        store.create_surface("s2", SurfaceZone::Overlay, "rest-timer", None, None);
    }

    assert_eq!(store.len(), 2);
    let s1 = store.get_surface("s1").unwrap();
    assert_eq!(s1.widget_type, "widget-4");
    assert_eq!(s1.data_model["round"], 4);
    let ids: Vec<&str> = store.all_surfaces().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2"]);
}

#[test]
fn test_dismissed_excluded_everywhere() {
    let (clock, _) = clocked();
    let storage: SharedStorage = Arc::new(MemoryStorage::new());
    let mut store = SurfaceStore::with_clock(clock.clone()).with_storage(storage.clone(), "surfaces");

    store.create_surface("ctx", SurfaceZone::Context, "daily-briefing", None, None);
    store.create_surface("str", SurfaceZone::Stream, "meal-plan", None, None);
    store.create_surface("ovl", SurfaceZone::Overlay, "rest-timer", None, None);
    for id in ["ctx", "str", "ovl"] {
        store.create_surface(format!("{id}-gone"), zone_of(id), "insight-card", None, None);
        assert!(store.mark_dismissed(&format!("{id}-gone")));
    }

    let visible: Vec<&str> = store
        .context_surfaces()
        .into_iter()
        .chain(store.stream_surfaces())
        .chain(store.overlay_surfaces())
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(visible, vec!["ctx", "str", "ovl"]);
    assert!(store.active_surfaces(None).iter().all(|s| !s.id.ends_with("-gone")));

    let mut restored = SurfaceStore::with_clock(clock).with_storage(storage, "surfaces");
    assert_eq!(restored.restore().unwrap(), 3);
    assert!(restored.iter().all(|s| s.state != SurfaceState::Dismissed));
}

fn zone_of(id: &str) -> SurfaceZone {
    match id {
        "ctx" => SurfaceZone::Context,
        "ovl" => SurfaceZone::Overlay,
        _ => SurfaceZone::Stream,
    }
}

#[test]
fn test_data_model_merges() {
    let (clock, _) = clocked();
    let mut store = SurfaceStore::with_clock(clock);
    let interpreter = Interpreter::new();

    let result = interpreter.interpret(
        &response(json!({
            "text": "",
            "operations": [
                {"createSurface": {"surfaceId": "w", "zone": "stream", "catalogId": "workout-card"}},
                {"updateDataModel": {"surfaceId": "w", "dataModel": {"a": 1}}},
                {"updateDataModel": {"surfaceId": "w", "dataModel": {"b": 2}}}
            ]
        })),
        &mut store,
    );

    assert!(!result.has_errors());
    assert_eq!(
        store.get_surface("w").unwrap().data_model,
        model(json!({"a": 1, "b": 2}))
    );
}

#[test]
fn test_frozen_surface_keeps_content() {
    let (clock, _) = clocked();
    let mut store = SurfaceStore::with_clock(clock);
    store.create_surface(
        "w",
        SurfaceZone::Stream,
        "workout-card",
        Some(model(json!({"title": "Legs"}))),
        None,
    );

    assert!(store.freeze_surface("w"));
    assert!(store.active_surfaces(Some(SurfaceZone::Stream)).is_empty());
    assert_eq!(store.stream_surfaces().len(), 1);
    assert_eq!(store.get_surface("w").unwrap().pointer("/title"), Some(&json!("Legs")));

    assert!(store.resume_surface("w"));
    assert_eq!(store.active_surfaces(Some(SurfaceZone::Stream)).len(), 1);
}

#[test]
fn test_file_storage_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (clock, _) = clocked();
    let storage: SharedStorage = Arc::new(FileStorage::new(dir.path()));

    let mut store = SurfaceStore::with_clock(clock.clone()).with_storage(storage.clone(), "surfaces");
    store.create_surface("a", SurfaceZone::Context, "quick-actions", None, None);
    store.create_surface("b", SurfaceZone::Stream, "meal-plan", None, None);
    store.freeze_surface("b");

    let mut restored = SurfaceStore::with_clock(clock).with_storage(storage, "surfaces");
    assert_eq!(restored.restore().unwrap(), 2);
    assert_eq!(restored.get_surface("b").unwrap().state, SurfaceState::Frozen);
    assert_eq!(restored.get_surface("a"), store.get_surface("a"));
}

// =============================================================================
// Wildcard deletes
// =============================================================================

#[test]
fn test_overlay_wildcard_any_count() {
    for overlays in [0usize, 1, 4] {
        let (clock, _) = clocked();
        let mut store = SurfaceStore::with_clock(clock);
        store.create_surface("ctx", SurfaceZone::Context, "daily-briefing", None, None);
        store.create_surface("str", SurfaceZone::Stream, "meal-plan", None, None);
        for i in 0..overlays {
            store.create_surface(format!("ovl-{i}"), SurfaceZone::Overlay, "rest-timer", None, None);
        }

        let result = Interpreter::new().interpret(
            &response(json!({
                "text": "",
                "operations": [{"deleteSurface": {"surfaceId": "*overlay*"}}]
            })),
            &mut store,
        );

        assert_eq!(result.operations_processed, 1);
        assert!(store.overlay_surfaces().is_empty());
        assert_eq!(store.len(), 2, "other zones untouched with {overlays} overlays");
    }
}

#[test]
fn test_context_wildcard() {
    let (clock, _) = clocked();
    let mut store = SurfaceStore::with_clock(clock);
    store.create_surface("c1", SurfaceZone::Context, "daily-briefing", None, None);
    store.create_surface("c2", SurfaceZone::Context, "quick-actions", None, None);
    store.create_surface("o1", SurfaceZone::Overlay, "rest-timer", None, None);

    Interpreter::new().interpret(
        &response(json!({
            "text": "",
            "operations": [{"deleteSurface": {"surfaceId": "*context*"}}]
        })),
        &mut store,
    );

    assert!(store.context_surfaces().is_empty());
    assert!(store.contains("o1"));
}

// =============================================================================
// Format equivalence
// =============================================================================

#[test]
fn test_operations_and_payload_equivalent() {
    let (clock, _) = clocked();
    let interpreter = Interpreter::new().with_clock(clock.clone());

    let mut via_operations = SurfaceStore::with_clock(clock.clone());
    let ops = interpreter.interpret(
        &response(json!({
            "text": "Here you go",
            "operations": [
                {"createSurface": {"surfaceId": "s1", "zone": "stream", "catalogId": "workout-card"}},
                {"updateDataModel": {"surfaceId": "s1", "dataModel": {"title": "Push Day"}}}
            ]
        })),
        &mut via_operations,
    );

    let mut via_payload = SurfaceStore::with_clock(clock.clone());
    let legacy = interpreter.interpret(
        &response(json!({
            "text": "Here you go",
            "payload": {"type": "workout-card", "props": {"title": "Push Day"}}
        })),
        &mut via_payload,
    );

    let mut via_widgets = SurfaceStore::with_clock(clock);
    let widgets = interpreter.interpret(
        &response(json!({
            "text": "Here you go",
            "widgets": [
                {"version": "v0.9", "createSurface": {"surfaceId": "s1"}},
                {"version": "v0.9", "updateComponents": {"surfaceId": "s1", "components": [{"type": "workout-card", "id": "root"}]}},
                {"version": "v0.9", "updateDataModel": {"surfaceId": "s1", "dataModel": {"title": "Push Day"}}}
            ]
        })),
        &mut via_widgets,
    );

    assert_eq!(ops.format, ResponseFormat::Operations);
    assert_eq!(legacy.format, ResponseFormat::LegacyPayload);
    assert_eq!(widgets.format, ResponseFormat::LegacyWidgets);
    assert_eq!(ops.operations_processed, 2);
    assert_eq!(legacy.operations_processed, 2);
    assert_eq!(widgets.operations_processed, 2);

    let expected = shape(via_operations.get_surface("s1").unwrap());
    let legacy_id = legacy.message.surface_id.clone().unwrap();
    assert!(legacy_id.starts_with("surface-"));
    assert_eq!(shape(via_payload.get_surface(&legacy_id).unwrap()), expected);
    assert_eq!(shape(via_widgets.get_surface("s1").unwrap()), expected);
    assert_eq!(via_operations.len(), via_payload.len());
}

#[test]
fn test_operations_take_precedence() {
    let (clock, _) = clocked();
    let mut store = SurfaceStore::with_clock(clock);

    let result = Interpreter::new().interpret(
        &response(json!({
            "text": "",
            "operations": [{"createSurface": {"surfaceId": "op", "zone": "context", "catalogId": "quick-actions"}}],
            "payload": {"type": "meal-plan", "props": {}}
        })),
        &mut store,
    );

    assert_eq!(result.format, ResponseFormat::Operations);
    assert_eq!(store.len(), 1);
    // Only stream surfaces are attached to the message
    assert_eq!(result.message.surface_id, None);
}

// =============================================================================
// Partial failure
// =============================================================================

#[test]
fn test_partial_failure_applies_rest() {
    let (clock, _) = clocked();
    let mut store = SurfaceStore::with_clock(clock);

    let result = Interpreter::new().interpret(
        &response(json!({
            "text": "Mixed batch",
            "agent": "SAGE",
            "operations": [
                {"createSurface": {"surfaceId": "meal", "zone": "stream", "catalogId": "meal-plan"}},
                {"updateDataModel": {"surfaceId": "missing", "dataModel": {"x": 1}}},
                {"updateDataModel": {"surfaceId": "meal", "dataModel": {"kcal": 2400}}}
            ]
        })),
        &mut store,
    );

    assert_eq!(result.errors.len(), 1);
    assert!(matches!(
        &result.errors[0],
        ProtocolError::UnknownSurface { index: 1, surface_id, .. } if surface_id == "missing"
    ));
    assert_eq!(result.operations_processed, 2);
    assert_eq!(store.get_surface("meal").unwrap().data_model["kcal"], 2400);
    assert_eq!(result.message.text, "Mixed batch");
    assert_eq!(result.message.surface_id.as_deref(), Some("meal"));
}

#[test]
fn test_all_failed_still_yields_message() {
    let (clock, _) = clocked();
    let mut store = SurfaceStore::with_clock(clock);

    let result = Interpreter::new().with_default_agent("GENESIS").interpret(
        &response(json!({
            "text": "Still talking",
            "operations": [
                42,
                {},
                {"updateComponents": {"surfaceId": "x", "components": []}},
                {"createSurface": {"zone": "stream"}}
            ]
        })),
        &mut store,
    );

    assert_eq!(result.errors.len(), 4);
    assert_eq!(result.operations_processed, 0);
    assert_eq!(result.message.text, "Still talking");
    assert_eq!(result.message.agent.as_deref(), Some("GENESIS"));
    assert!(store.is_empty());
    assert_eq!(result.error_messages().len(), 4);
}

#[test]
fn test_malformed_payload_keeps_reply_text() {
    let (clock, _) = clocked();
    let mut store = SurfaceStore::with_clock(clock);
    let interpreter = Interpreter::new();

    // Null props render an empty widget
    let result = interpreter.interpret(
        &BackendResponse::from_json(
            r#"{"text":"Your plan","payload":{"type":"workout-card","props":null}}"#,
        )
        .unwrap(),
        &mut store,
    );
    assert!(!result.has_errors());
    let id = result.message.surface_id.unwrap();
    assert_eq!(store.get_surface(&id).unwrap().widget_type, "workout-card");

    // Unusable payloads are reported; the reply survives
    for raw in [
        r#"{"text":"Your plan","payload":{"props":{"title":"Push Day"}}}"#,
        r#"{"text":"Your plan","payload":"workout-card"}"#,
    ] {
        let result = interpreter.interpret(&BackendResponse::from_json(raw).unwrap(), &mut store);
        assert_eq!(result.message.text, "Your plan");
        assert!(result.message.surface_id.is_none());
        assert_eq!(result.errors.len(), 1);
    }
    assert_eq!(store.len(), 1);
}

#[test]
fn test_created_surfaces_link_to_message() {
    let (clock, _) = clocked();
    let mut store = SurfaceStore::with_clock(clock);

    let result = Interpreter::new().interpret(
        &response(json!({
            "text": "",
            "operations": [
                {"createSurface": {"surfaceId": "first", "zone": "stream", "catalogId": "meal-plan"}},
                {"createSurface": {"surfaceId": "second", "zone": "stream", "catalogId": "insight-card"}}
            ]
        })),
        &mut store,
    );

    assert_eq!(result.message.surface_id.as_deref(), Some("first"));
    let link = store.get_surface("second").unwrap().linked_message_id.clone();
    assert_eq!(link.as_deref(), Some(result.message.id.as_str()));
}
