//! Protocol Interpreter
//!
//! Normalises every response format into [`SurfaceStore`] mutations and
//! produces the [`ChatMessage`] for the turn.
//!
//! # Flow
//!
//! ```text
//!  BackendResponse
//!        │
//!        ├── operations[] non-empty ──► apply_operations ──┐
//!        ├── widgets[] non-empty ─────► apply_legacy_widgets ┤
//!        ├── payload ─────────────────► apply_legacy_payload ┤
//!        └── text only ─────────────────────────────────────┤
//!                                                           ▼
//!                                   ChatMessage { surface_id = first stream surface }
//! ```
//!
//! # Partial failure
//!
//! A batch is best-effort. Each sub-message of each operation is decoded and
//! applied on its own; a failure is recorded in [`InterpretResult::errors`]
//! and processing moves on. The chat message is always produced, even when
//! every operation failed.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::types::{
    CreateSurface, DeleteTarget, LegacyPayload, OperationKind, ResponseFormat, SubOperation,
    UpdateComponents, UpdateDataModel,
};
use super::{BackendResponse, ProtocolError};
use crate::catalog::WidgetCatalog;
use crate::chat::{ChatMessage, MessageId, DEFAULT_AGENT};
use crate::clock::{system_clock, SharedClock};
use crate::surface::{DataModel, SurfaceStore, SurfaceZone};

/// Sub-operations a legacy conversion counts (create + data model)
const LEGACY_OPERATION_COUNT: usize = 2;

/// Outcome of interpreting one response
#[derive(Clone, Debug)]
pub struct InterpretResult {
    /// The turn to render; always present
    pub message: ChatMessage,
    /// Successfully applied sub-operations
    pub operations_processed: usize,
    /// One entry per failed sub-operation
    pub errors: Vec<ProtocolError>,
    /// Format the response was taken as
    pub format: ResponseFormat,
}

impl InterpretResult {
    /// Whether any sub-operation failed
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Human-readable error descriptions
    #[must_use]
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Result of applying one batch to the store
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchOutcome {
    /// Successfully applied sub-operations
    pub operations_processed: usize,
    /// First surface created in the `stream` zone
    pub first_stream_surface_id: Option<String>,
    /// Failures, in batch order
    pub errors: Vec<ProtocolError>,
}

impl BatchOutcome {
    fn created(&mut self, surface_id: &str, zone: SurfaceZone) {
        if zone == SurfaceZone::Stream && self.first_stream_surface_id.is_none() {
            self.first_stream_surface_id = Some(surface_id.to_string());
        }
    }
}

/// Stateless response interpreter
///
/// Holds only configuration; all state lives in the store it is handed.
#[derive(Clone)]
pub struct Interpreter {
    default_agent: String,
    catalog: Option<Arc<dyn WidgetCatalog>>,
    clock: SharedClock,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter with the default agent label, no catalog and the system clock
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_agent: DEFAULT_AGENT.to_string(),
            catalog: None,
            clock: system_clock(),
        }
    }

    /// Label used when a response names no agent
    #[must_use]
    pub fn with_default_agent(mut self, agent: impl Into<String>) -> Self {
        self.default_agent = agent.into();
        self
    }

    /// Check widget types against `catalog` (unknown types are logged, not rejected)
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn WidgetCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Stamp messages using `clock`
    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Current default agent label
    #[must_use]
    pub fn default_agent(&self) -> &str {
        &self.default_agent
    }

    /// Apply a response to `store` and build the turn's chat message
    pub fn interpret(&self, response: &BackendResponse, store: &mut SurfaceStore) -> InterpretResult {
        let now = self.clock.now_ms();
        let message_id = MessageId::new(now);
        let link = Some(message_id.0.clone());
        let format = response.format();

        let batch = match format {
            ResponseFormat::Operations => self.apply_operations(&response.operations, store, link),
            ResponseFormat::LegacyWidgets => self.apply_legacy_widgets(&response.widgets, store, link),
            ResponseFormat::LegacyPayload => match &response.payload {
                Some(raw) => self.apply_legacy_payload(raw, store, link),
                None => BatchOutcome::default(),
            },
            ResponseFormat::TextOnly => BatchOutcome::default(),
        };

        let agent = response
            .agent
            .clone()
            .unwrap_or_else(|| self.default_agent.clone());
        let mut message =
            ChatMessage::assistant(response.text.clone(), agent, batch.first_stream_surface_id, now);
        message.id = message_id;

        tracing::debug!(
            message_id = %message.id,
            format = ?format,
            processed = batch.operations_processed,
            errors = batch.errors.len(),
            "Response interpreted"
        );

        InterpretResult {
            message,
            operations_processed: batch.operations_processed,
            errors: batch.errors,
            format,
        }
    }

    // =========================================================================
    // operations[]
    // =========================================================================

    /// Apply an operation batch in array order
    pub fn apply_operations(
        &self,
        operations: &[Value],
        store: &mut SurfaceStore,
        linked_message_id: Option<String>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for (index, operation) in operations.iter().enumerate() {
            let Some(object) = operation.as_object() else {
                self.record(
                    &mut outcome,
                    ProtocolError::Decode(format!("operation {index} is not a JSON object")),
                );
                continue;
            };

            let mut carried_any = false;
            for kind in OperationKind::ALL {
                let Some(decoded) = SubOperation::decode(object, kind, index) else {
                    continue;
                };
                carried_any = true;

                let applied = decoded.and_then(|sub| {
                    self.apply_sub_operation(sub, index, store, linked_message_id.as_deref(), &mut outcome)
                });
                match applied {
                    Ok(()) => outcome.operations_processed += 1,
                    Err(e) => self.record(&mut outcome, e),
                }
            }

            if !carried_any {
                self.record(&mut outcome, ProtocolError::EmptyOperation { index });
            }
        }

        outcome
    }

    fn apply_sub_operation(
        &self,
        sub: SubOperation,
        index: usize,
        store: &mut SurfaceStore,
        linked_message_id: Option<&str>,
        outcome: &mut BatchOutcome,
    ) -> Result<(), ProtocolError> {
        let kind = sub.kind();
        if sub.surface_id().is_empty() {
            return Err(ProtocolError::EmptySurfaceId { kind, index });
        }

        match sub {
            SubOperation::Create(CreateSurface {
                surface_id,
                zone,
                catalog_id,
            }) => {
                if catalog_id.is_empty() {
                    return Err(ProtocolError::InvalidSubMessage {
                        kind,
                        index,
                        reason: "catalogId is empty".to_string(),
                    });
                }
                self.check_widget_type(&catalog_id, &surface_id);
                store.create_surface(
                    surface_id.as_str(),
                    zone,
                    catalog_id,
                    None,
                    linked_message_id.map(str::to_string),
                );
                outcome.created(&surface_id, zone);
            }
            SubOperation::UpdateComponents(update) => {
                let widget_type = update
                    .widget_type()
                    .ok_or(ProtocolError::EmptyComponents { index })?;
                self.check_widget_type(widget_type, &update.surface_id);
                if !store.update_components(&update.surface_id, widget_type) {
                    return Err(unknown_surface(kind, index, update.surface_id));
                }
            }
            SubOperation::UpdateDataModel(UpdateDataModel {
                surface_id,
                data_model,
            }) => {
                if !store.update_data_model(&surface_id, data_model) {
                    return Err(unknown_surface(kind, index, surface_id));
                }
            }
            SubOperation::Delete(delete) => match delete.target() {
                DeleteTarget::Zone(zone) => {
                    store.clear_zone(zone);
                }
                DeleteTarget::Surface(id) => {
                    // Deleting twice is harmless
                    store.delete_surface(id);
                }
            },
        }
        Ok(())
    }

    // =========================================================================
    // Legacy formats
    // =========================================================================

    /// Convert a legacy `widgets[]` message list into one stream surface
    ///
    /// The surface id comes from a `createSurface` message, else from the
    /// first update that names one; the widget type from the first non-empty
    /// `updateComponents`; the data model from the last `updateDataModel`.
    /// Without a widget type nothing is created.
    pub fn apply_legacy_widgets(
        &self,
        widgets: &[Value],
        store: &mut SurfaceStore,
        linked_message_id: Option<String>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut created_id: Option<String> = None;
        let mut fallback_id: Option<String> = None;
        let mut widget_type: Option<String> = None;
        let mut data_model = DataModel::new();

        for (index, message) in widgets.iter().enumerate() {
            let Some(object) = message.as_object() else {
                self.record(
                    &mut outcome,
                    ProtocolError::Decode(format!("widget message {index} is not a JSON object")),
                );
                continue;
            };

            for kind in [
                OperationKind::CreateSurface,
                OperationKind::UpdateComponents,
                OperationKind::UpdateDataModel,
            ] {
                let sub = match SubOperation::decode(object, kind, index) {
                    Some(Ok(sub)) => sub,
                    Some(Err(e)) => {
                        self.record(&mut outcome, e);
                        continue;
                    }
                    None => continue,
                };

                match sub {
                    SubOperation::Create(create) => {
                        if !create.surface_id.is_empty() {
                            created_id = Some(create.surface_id);
                        }
                    }
                    SubOperation::UpdateComponents(update) => {
                        let UpdateComponents {
                            surface_id,
                            components,
                        } = update;
                        if let Some(first) = components.into_iter().next() {
                            widget_type.get_or_insert(first.component_type);
                            remember_id(&mut fallback_id, surface_id);
                        }
                    }
                    SubOperation::UpdateDataModel(update) => {
                        data_model = update.data_model;
                        remember_id(&mut fallback_id, update.surface_id);
                    }
                    SubOperation::Delete(_) => {}
                }
            }
        }

        let Some(widget_type) = widget_type else {
            tracing::debug!(messages = widgets.len(), "Legacy widgets carried no widget type");
            return outcome;
        };

        let surface_id = created_id
            .or(fallback_id)
            .unwrap_or_else(|| self.generate_surface_id());
        self.create_legacy_surface(&surface_id, widget_type, data_model, store, linked_message_id);
        outcome.operations_processed += LEGACY_OPERATION_COUNT;
        outcome.created(&surface_id, SurfaceZone::Stream);
        outcome
    }

    /// Convert a legacy `{type, props}` payload into one stream surface
    ///
    /// Missing or `null` props create an empty data model. Any other shape is
    /// recorded as an error and nothing is created.
    pub fn apply_legacy_payload(
        &self,
        raw: &Value,
        store: &mut SurfaceStore,
        linked_message_id: Option<String>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let payload = match LegacyPayload::decode(raw) {
            Ok(payload) => payload,
            Err(e) => {
                self.record(&mut outcome, e);
                return outcome;
            }
        };
        if payload.widget_type.is_empty() {
            self.record(
                &mut outcome,
                ProtocolError::Decode("legacy payload has an empty type".to_string()),
            );
            return outcome;
        }

        let surface_id = self.generate_surface_id();
        self.create_legacy_surface(
            &surface_id,
            payload.widget_type,
            payload.props,
            store,
            linked_message_id,
        );
        outcome.operations_processed += LEGACY_OPERATION_COUNT;
        outcome.created(&surface_id, SurfaceZone::Stream);
        outcome
    }

    fn create_legacy_surface(
        &self,
        surface_id: &str,
        widget_type: String,
        data_model: DataModel,
        store: &mut SurfaceStore,
        linked_message_id: Option<String>,
    ) {
        self.check_widget_type(&widget_type, surface_id);
        store.create_surface(surface_id, SurfaceZone::Stream, widget_type, None, linked_message_id);
        store.update_data_model(surface_id, data_model);
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// `surface-<unix ms>-<8 hex chars>`
    fn generate_surface_id(&self) -> String {
        let suffix: [u8; 4] = rand::random();
        format!("surface-{}-{}", self.clock.now_ms(), hex::encode(suffix))
    }

    /// Unknown types still render (as a placeholder), so only log them
    fn check_widget_type(&self, widget_type: &str, surface_id: &str) {
        if let Some(catalog) = &self.catalog {
            if !catalog.is_known(widget_type) {
                tracing::warn!(
                    widget_type = %widget_type,
                    surface_id = %surface_id,
                    "Unknown widget type, rendering placeholder"
                );
            }
        }
    }

    fn record(&self, outcome: &mut BatchOutcome, error: ProtocolError) {
        tracing::warn!(error = %error, "Protocol operation failed");
        outcome.errors.push(error);
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("default_agent", &self.default_agent)
            .field("catalog", &self.catalog.is_some())
            .finish()
    }
}

fn unknown_surface(kind: OperationKind, index: usize, surface_id: String) -> ProtocolError {
    ProtocolError::UnknownSurface {
        kind,
        index,
        surface_id,
    }
}

fn remember_id(slot: &mut Option<String>, surface_id: String) {
    if slot.is_none() && !surface_id.is_empty() {
        *slot = Some(surface_id);
    }
}
