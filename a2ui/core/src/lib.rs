//! A2UI Core - Agent-Driven Widget State for Conversational UIs
//!
//! Agents drive pieces of user interface remotely: they emit structured
//! operations that create, update and remove UI surfaces. This crate holds
//! the canonical state of those surfaces, interprets every wire format the
//! backend speaks, and decides which agent widgets the user actually sees.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Rendering layer (host)                     │
//! │     reads SurfaceStore selectors       reads WidgetQueue.visible │
//! └───────────────▲──────────────────────────────────▲───────────────┘
//!                 │                                  │
//! ┌───────────────┼──────────────────────────────────┼───────────────┐
//! │               │          A2UI CORE               │               │
//! │  ┌────────────┴───────┐              ┌───────────┴────────────┐  │
//! │  │    SurfaceStore    │              │      WidgetQueue       │  │
//! │  │ context/stream/    │              │ ceilings, cooldown,    │  │
//! │  │ overlay surfaces   │              │ focus mode, dedup      │  │
//! │  └────────▲───────────┘              └───────────▲────────────┘  │
//! │           │ mutations                            │ enqueue       │
//! │  ┌────────┴───────────┐                          │               │
//! │  │    Interpreter     │── ChatMessage            │               │
//! │  │ operations[] /     │                          │               │
//! │  │ widgets[] / payload│                          │               │
//! │  └────────▲───────────┘                          │               │
//! └───────────┼──────────────────────────────────────┼───────────────┘
//!             │                                      │
//!      BackendResponse                      QueueWidgetPayload
//! ```
//!
//! # Key Types
//!
//! - [`SurfaceStore`]: every surface, keyed by id, with zone selectors
//! - [`Interpreter`]: turns a [`BackendResponse`] into store mutations
//! - [`WidgetQueue`]: attention-budget admission control
//! - [`WidgetSession`]: the three wired together with a chat history
//!
//! # Quick Start
//!
//! ```
//! use a2ui_core::{BackendResponse, WidgetSession};
//!
//! let mut session = WidgetSession::new();
//! let response = BackendResponse::from_json(
//!     r#"{"text": "Ready?", "payload": {"type": "workout-card", "props": {"title": "Push Day"}}}"#,
//! )
//! .unwrap();
//!
//! let result = session.handle_response(&response);
//! let surface_id = result.message.surface_id.unwrap();
//! let surface = session.store().get_surface(&surface_id).unwrap();
//! assert_eq!(surface.widget_type, "workout-card");
//! ```
//!
//! # Concurrency
//!
//! Everything is synchronous and run-to-completion. There are no timers,
//! threads or async runtime in this crate; time-based rules compare the
//! injected [`Clock`] against stored timestamps when a call runs.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod attention;
pub mod catalog;
pub mod chat;
pub mod clock;
pub mod config;
pub mod protocol;
pub mod session;
pub mod storage;
pub mod surface;

pub use attention::{
    AttentionBudgetConfig, DismissReason, EnqueueOutcome, Position, Priority, QueueBehavior,
    QueueEvent, QueueWidgetPayload, WidgetQueue,
};
pub use catalog::{BuiltinCatalog, WidgetCatalog, WidgetSpec};
pub use chat::{widget_event, ChatEvent, ChatMessage, MessageId, MessageRole};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{load_config, load_config_from_path, ConfigError, ConfigOverrides, ConfigSource, CoreConfig};
pub use protocol::{resolve_pointer, BackendResponse, InterpretResult, Interpreter, ProtocolError};
pub use session::WidgetSession;
pub use storage::{FileStorage, MemoryStorage, SharedStorage, StateStorage, StorageError};
pub use surface::{
    DataModel, SharedSurfaceStore, StoreError, Surface, SurfaceState, SurfaceStore, SurfaceZone,
};
