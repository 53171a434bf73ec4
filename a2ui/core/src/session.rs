//! Widget Session
//!
//! One conversation's worth of widget state: the surface store, the
//! interpreter that feeds it, the attention queue, and a bounded chat history.
//!
//! ```text
//!   BackendResponse ──► handle_response ──► Interpreter ──► SurfaceStore
//!                                               │
//!                                               └──► ChatMessage ──► history
//!
//!   QueueWidgetPayload ──► submit_widget ──► WidgetQueue
//! ```
//!
//! The store and the queue stay independent; a host decides which widgets go
//! through the queue.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::attention::{EnqueueOutcome, QueueWidgetPayload, WidgetQueue};
use crate::catalog::{BuiltinCatalog, WidgetCatalog};
use crate::chat::ChatMessage;
use crate::clock::{system_clock, SharedClock};
use crate::config::CoreConfig;
use crate::protocol::{BackendResponse, InterpretResult, Interpreter};
use crate::storage::{FileStorage, SharedStorage, StorageError};
use crate::surface::{SurfaceStore, SurfaceZone};

/// Chat history kept per session
pub const DEFAULT_MAX_MESSAGES: usize = 50;

/// Store + interpreter + queue + chat history
pub struct WidgetSession {
    store: SurfaceStore,
    interpreter: Interpreter,
    queue: WidgetQueue,
    messages: VecDeque<ChatMessage>,
    max_messages: usize,
    clock: SharedClock,
}

impl Default for WidgetSession {
    fn default() -> Self {
        Self::new()
    }
}

impl WidgetSession {
    /// Session on the system clock with default budget and the builtin catalog
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Session reading time from `clock`
    #[must_use]
    pub fn with_clock(clock: SharedClock) -> Self {
        let catalog: Arc<dyn WidgetCatalog> = Arc::new(BuiltinCatalog::new());
        Self::from_parts(
            SurfaceStore::with_clock(clock.clone()),
            Interpreter::new()
                .with_catalog(catalog.clone())
                .with_clock(clock.clone()),
            WidgetQueue::with_clock(Default::default(), clock.clone()).with_catalog(catalog),
            clock,
        )
    }

    /// Assemble a session from pre-built parts sharing `clock`
    #[must_use]
    pub fn from_parts(
        store: SurfaceStore,
        interpreter: Interpreter,
        queue: WidgetQueue,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            interpreter,
            queue,
            messages: VecDeque::new(),
            max_messages: DEFAULT_MAX_MESSAGES,
            clock,
        }
    }

    /// Session configured from `config`
    ///
    /// With `persist` set, surfaces are written through to a [`FileStorage`]
    /// in `storage_dir` (or the platform data directory). Restoring a previous
    /// snapshot is left to the caller ([`SurfaceStore::restore`]).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] when persistence is requested but
    /// no directory is configured and the platform has no data directory.
    pub fn from_config(config: &CoreConfig, clock: SharedClock) -> Result<Self, StorageError> {
        let catalog: Arc<dyn WidgetCatalog> = Arc::new(BuiltinCatalog::new());

        let mut store = SurfaceStore::with_clock(clock.clone());
        if config.persist {
            let storage: SharedStorage = match &config.storage_dir {
                Some(dir) => Arc::new(FileStorage::new(dir.clone())),
                None => Arc::new(FileStorage::in_data_dir()?),
            };
            store = store.with_storage(storage, config.surface_key.clone());
        }

        let interpreter = Interpreter::new()
            .with_default_agent(config.default_agent.clone())
            .with_catalog(catalog.clone())
            .with_clock(clock.clone());
        let queue = WidgetQueue::with_clock(config.attention.clone(), clock.clone()).with_catalog(catalog);

        tracing::info!(
            persist = config.persist,
            storage_dir = ?config.storage_dir,
            source = %config.source(),
            "Widget session configured"
        );

        Ok(Self::from_parts(store, interpreter, queue, clock))
    }

    /// Keep at most `max` chat messages (0 = unlimited)
    #[must_use]
    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = max;
        self.prune_if_needed();
        self
    }

    // =========================================================================
    // Conversation
    // =========================================================================

    /// Apply a backend response and record its chat message
    ///
    /// The message is recorded even when every operation failed.
    pub fn handle_response(&mut self, response: &BackendResponse) -> InterpretResult {
        let result = self.interpreter.interpret(response, &mut self.store);
        if result.has_errors() {
            tracing::warn!(
                message_id = %result.message.id,
                errors = result.errors.len(),
                "Response applied with protocol errors"
            );
        }
        self.push_message(result.message.clone());
        result
    }

    /// Record a user turn
    pub fn add_user_message(&mut self, text: impl Into<String>) -> &ChatMessage {
        let message = ChatMessage::user_at(text, self.clock.now_ms());
        self.push_message(message);
        // push_message never leaves the history empty
        &self.messages[self.messages.len() - 1]
    }

    /// Drop the chat history together with the stream surfaces it referenced
    pub fn clear_messages(&mut self) {
        let cleared = self.messages.len();
        self.messages.clear();
        let surfaces = self.store.clear_zone(SurfaceZone::Stream);
        tracing::info!(messages = cleared, surfaces = surfaces, "Conversation cleared");
    }

    /// Chat history, oldest first
    #[must_use]
    pub fn messages(&self) -> &VecDeque<ChatMessage> {
        &self.messages
    }

    /// Most recent `count` messages, oldest first
    pub fn recent_messages(&self, count: usize) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().skip(self.messages.len().saturating_sub(count))
    }

    // =========================================================================
    // Widgets
    // =========================================================================

    /// Submit a widget to the attention queue
    pub fn submit_widget(&mut self, payload: QueueWidgetPayload) -> EnqueueOutcome {
        self.queue.enqueue(payload)
    }

    /// Surface store
    #[must_use]
    pub fn store(&self) -> &SurfaceStore {
        &self.store
    }

    /// Surface store, mutable
    pub fn store_mut(&mut self) -> &mut SurfaceStore {
        &mut self.store
    }

    /// Interpreter
    #[must_use]
    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Attention queue
    #[must_use]
    pub fn queue(&self) -> &WidgetQueue {
        &self.queue
    }

    /// Attention queue, mutable
    pub fn queue_mut(&mut self) -> &mut WidgetQueue {
        &mut self.queue
    }

    /// Session clock
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    fn push_message(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        self.prune_if_needed();
    }

    fn prune_if_needed(&mut self) {
        if self.max_messages == 0 || self.messages.len() <= self.max_messages {
            return;
        }
        let excess = self.messages.len() - self.max_messages;
        self.messages.drain(..excess);
        tracing::debug!(
            removed = excess,
            remaining = self.messages.len(),
            "Pruned chat history"
        );
    }
}

impl std::fmt::Debug for WidgetSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetSession")
            .field("surfaces", &self.store.len())
            .field("messages", &self.messages.len())
            .field("queue", &self.queue)
            .finish()
    }
}
