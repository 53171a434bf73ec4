//! Wire types
//!
//! Three response shapes share one envelope:
//!
//! ```text
//! { text, agent?, operations: [ {createSurface?, updateComponents?,
//!                                updateDataModel?, deleteSurface?}, ... ] }
//! { text, agent?, widgets:    [ {version, createSurface?, updateComponents?,
//!                                updateDataModel?}, ... ] }
//! { text, agent?, payload:    {type, props} }
//! ```
//!
//! `operations`, `widgets` and `payload` are kept as raw JSON in the envelope
//! so the interpreter can decode each entry (and each sub-message) on its
//! own. One malformed entry must not cost the rest of the batch, and a
//! malformed widget never costs the reply text.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ProtocolError;
use crate::surface::{DataModel, SurfaceZone};

/// Wildcard `deleteSurface` id that clears the whole overlay zone
pub const WILDCARD_OVERLAY: &str = "*overlay*";

/// Wildcard `deleteSurface` id that clears the whole context zone
pub const WILDCARD_CONTEXT: &str = "*context*";

/// A full agent turn as received from the backend
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    /// Conversational reply, always rendered
    #[serde(default)]
    pub text: String,

    /// Agent label; the interpreter substitutes its default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    /// Operation batch (preferred format)
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Value>,

    /// Legacy operation-shaped message list
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub widgets: Vec<Value>,

    /// Oldest legacy format: a single widget (decoded by the interpreter)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl BackendResponse {
    /// Plain text reply with no UI
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Decode a response from a JSON string
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Decode`] if the envelope itself is malformed.
    /// Individual operations are not validated here.
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Decode a response from an already-parsed JSON value
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Decode`] if the envelope itself is malformed.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Which format the interpreter will take this response as
    #[must_use]
    pub fn format(&self) -> ResponseFormat {
        if !self.operations.is_empty() {
            ResponseFormat::Operations
        } else if !self.widgets.is_empty() {
            ResponseFormat::LegacyWidgets
        } else if self.payload.is_some() {
            ResponseFormat::LegacyPayload
        } else {
            ResponseFormat::TextOnly
        }
    }
}

/// `null` and missing both mean "no entries"
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Shape a response was sent in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseFormat {
    /// `operations[]`
    Operations,
    /// `widgets[]`
    LegacyWidgets,
    /// `payload`
    LegacyPayload,
    /// Nothing but text
    TextOnly,
}

/// `{type, props}` single-widget payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegacyPayload {
    /// Widget type
    #[serde(rename = "type")]
    pub widget_type: String,

    /// Widget content; `null` and missing both mean empty
    #[serde(default, deserialize_with = "null_as_empty_model")]
    pub props: DataModel,
}

impl LegacyPayload {
    /// Decode a raw `payload` value
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Decode`] if the value is not a `{type, props}`
    /// object.
    pub fn decode(raw: &Value) -> Result<Self, ProtocolError> {
        Self::deserialize(raw).map_err(|e| ProtocolError::Decode(format!("legacy payload: {e}")))
    }
}

fn null_as_empty_model<'de, D>(deserializer: D) -> Result<DataModel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<DataModel>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Operations
// =============================================================================

/// The four sub-message kinds of an operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// `createSurface`
    CreateSurface,
    /// `updateComponents`
    UpdateComponents,
    /// `updateDataModel`
    UpdateDataModel,
    /// `deleteSurface`
    DeleteSurface,
}

impl OperationKind {
    /// Dispatch order inside a single operation object
    pub const ALL: [Self; 4] = [
        Self::CreateSurface,
        Self::UpdateComponents,
        Self::UpdateDataModel,
        Self::DeleteSurface,
    ];

    /// JSON key of the sub-message
    #[must_use]
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::CreateSurface => "createSurface",
            Self::UpdateComponents => "updateComponents",
            Self::UpdateDataModel => "updateDataModel",
            Self::DeleteSurface => "deleteSurface",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// `createSurface` sub-message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSurface {
    /// New surface id
    pub surface_id: String,
    /// Target zone; legacy messages omit it and land in `stream`
    #[serde(default = "default_zone")]
    pub zone: SurfaceZone,
    /// Widget type to mount
    #[serde(default)]
    pub catalog_id: String,
}

fn default_zone() -> SurfaceZone {
    SurfaceZone::Stream
}

/// One component reference inside `updateComponents`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Widget type
    #[serde(rename = "type")]
    pub component_type: String,
    /// Component id (informational)
    #[serde(default)]
    pub id: String,
}

/// `updateComponents` sub-message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateComponents {
    /// Target surface
    pub surface_id: String,
    /// Components; the first one names the widget type
    #[serde(default)]
    pub components: Vec<Component>,
}

impl UpdateComponents {
    /// Widget type this update recomposes to
    #[must_use]
    pub fn widget_type(&self) -> Option<&str> {
        self.components.first().map(|c| c.component_type.as_str())
    }
}

/// `updateDataModel` sub-message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDataModel {
    /// Target surface
    pub surface_id: String,
    /// Patch to shallow-merge
    #[serde(default)]
    pub data_model: DataModel,
}

/// `deleteSurface` sub-message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSurface {
    /// Surface id, or a zone wildcard
    pub surface_id: String,
}

/// What a `deleteSurface` id refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteTarget<'a> {
    /// A single surface
    Surface(&'a str),
    /// Every surface in a zone
    Zone(SurfaceZone),
}

impl DeleteSurface {
    /// Resolve wildcards
    #[must_use]
    pub fn target(&self) -> DeleteTarget<'_> {
        match self.surface_id.as_str() {
            WILDCARD_OVERLAY => DeleteTarget::Zone(SurfaceZone::Overlay),
            WILDCARD_CONTEXT => DeleteTarget::Zone(SurfaceZone::Context),
            id => DeleteTarget::Surface(id),
        }
    }
}

/// A decoded sub-message
#[derive(Clone, Debug, PartialEq)]
pub enum SubOperation {
    /// Create (or overwrite) a surface
    Create(CreateSurface),
    /// Recompose a surface
    UpdateComponents(UpdateComponents),
    /// Merge into a surface's data model
    UpdateDataModel(UpdateDataModel),
    /// Delete a surface or clear a zone
    Delete(DeleteSurface),
}

impl SubOperation {
    /// Decode the sub-message of `kind` from an operation object
    ///
    /// Returns `None` when the object does not carry that sub-message.
    pub fn decode(
        operation: &serde_json::Map<String, Value>,
        kind: OperationKind,
        index: usize,
    ) -> Option<Result<Self, ProtocolError>> {
        let raw = operation.get(kind.wire_name())?;
        if raw.is_null() {
            return None;
        }

        let invalid = |e: serde_json::Error| ProtocolError::InvalidSubMessage {
            kind,
            index,
            reason: e.to_string(),
        };
        let decoded = match kind {
            OperationKind::CreateSurface => {
                CreateSurface::deserialize(raw).map(Self::Create)
            }
            OperationKind::UpdateComponents => {
                UpdateComponents::deserialize(raw).map(Self::UpdateComponents)
            }
            OperationKind::UpdateDataModel => {
                UpdateDataModel::deserialize(raw).map(Self::UpdateDataModel)
            }
            OperationKind::DeleteSurface => DeleteSurface::deserialize(raw).map(Self::Delete),
        };
        Some(decoded.map_err(invalid))
    }

    /// Which kind this is
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Create(_) => OperationKind::CreateSurface,
            Self::UpdateComponents(_) => OperationKind::UpdateComponents,
            Self::UpdateDataModel(_) => OperationKind::UpdateDataModel,
            Self::Delete(_) => OperationKind::DeleteSurface,
        }
    }

    /// Target surface id as sent on the wire
    #[must_use]
    pub fn surface_id(&self) -> &str {
        match self {
            Self::Create(op) => &op.surface_id,
            Self::UpdateComponents(op) => &op.surface_id,
            Self::UpdateDataModel(op) => &op.surface_id,
            Self::Delete(op) => &op.surface_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_defaults() {
        let response = BackendResponse::from_json(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(response.text, "hi");
        assert!(response.agent.is_none());
        assert_eq!(response.format(), ResponseFormat::TextOnly);

        let response =
            BackendResponse::from_json(r#"{"text":"hi","widgets":null,"payload":null}"#).unwrap();
        assert_eq!(response.format(), ResponseFormat::TextOnly);
    }

    #[test]
    fn test_format_precedence() {
        let response = BackendResponse::from_value(json!({
            "text": "",
            "operations": [{"deleteSurface": {"surfaceId": "s1"}}],
            "payload": {"type": "workout-card", "props": {}}
        }))
        .unwrap();
        assert_eq!(response.format(), ResponseFormat::Operations);

        let response = BackendResponse::from_value(json!({
            "text": "",
            "operations": [],
            "payload": {"type": "workout-card"}
        }))
        .unwrap();
        assert_eq!(response.format(), ResponseFormat::LegacyPayload);
        let payload = LegacyPayload::decode(&response.payload.unwrap()).unwrap();
        assert!(payload.props.is_empty());
    }

    #[test]
    fn test_envelope_tolerates_malformed_payload() {
        for payload in [
            json!({"type": "workout-card", "props": null}),
            json!({"props": {"title": "Push Day"}}),
            json!("workout-card"),
        ] {
            let response = BackendResponse::from_value(json!({"text": "Your plan", "payload": payload}))
                .unwrap();
            assert_eq!(response.text, "Your plan");
            assert_eq!(response.format(), ResponseFormat::LegacyPayload);
        }
    }

    #[test]
    fn test_legacy_payload_decode() {
        let payload = LegacyPayload::decode(&json!({"type": "workout-card", "props": null})).unwrap();
        assert_eq!(payload.widget_type, "workout-card");
        assert!(payload.props.is_empty());

        assert!(matches!(
            LegacyPayload::decode(&json!({"props": {}})),
            Err(ProtocolError::Decode(_))
        ));
        assert!(matches!(
            LegacyPayload::decode(&json!("workout-card")),
            Err(ProtocolError::Decode(_))
        ));
        assert!(LegacyPayload::decode(&json!({"type": "workout-card", "props": [1]})).is_err());
    }

    #[test]
    fn test_malformed_envelope() {
        assert!(matches!(
            BackendResponse::from_json("[1, 2]"),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_sub_messages() {
        let op = json!({
            "createSurface": {"surfaceId": "s1", "zone": "overlay", "catalogId": "rest-timer"},
            "updateDataModel": {"surfaceId": "s1", "dataModel": {"seconds": 90}}
        });
        let op = op.as_object().unwrap();

        let create = SubOperation::decode(op, OperationKind::CreateSurface, 0)
            .unwrap()
            .unwrap();
        assert_eq!(create.surface_id(), "s1");
        assert!(matches!(create, SubOperation::Create(ref c) if c.zone == SurfaceZone::Overlay));

        assert!(SubOperation::decode(op, OperationKind::DeleteSurface, 0).is_none());
    }

    #[test]
    fn test_decode_invalid_sub_message() {
        let op = json!({"createSurface": {"surfaceId": "s1", "zone": "sidebar"}});
        let err = SubOperation::decode(op.as_object().unwrap(), OperationKind::CreateSurface, 4)
            .unwrap()
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidSubMessage { kind: OperationKind::CreateSurface, index: 4, .. }
        ));
    }

    #[test]
    fn test_delete_wildcards() {
        let delete = |id: &str| DeleteSurface {
            surface_id: id.to_string(),
        };

        let overlay = delete("*overlay*");
        let context = delete("*context*");
        let stream = delete("*stream*");
        let single = delete("s1");

        assert_eq!(overlay.target(), DeleteTarget::Zone(SurfaceZone::Overlay));
        assert_eq!(context.target(), DeleteTarget::Zone(SurfaceZone::Context));
        assert_eq!(stream.target(), DeleteTarget::Surface("*stream*"));
        assert_eq!(single.target(), DeleteTarget::Surface("s1"));
    }
}
