//! Replay commands
//!
//! One JSON object per input line, tagged by `command`:
//!
//! ```text
//! {"command": "response", "response": {"text": "...", "operations": [...]}}
//! {"command": "user", "text": "hi"}
//! {"command": "enqueue", "widget": {"widgetType": "meal-plan", "agentId": "GENESIS"}}
//! {"command": "dismiss", "widgetId": "w1", "reason": "user_action"}
//! {"command": "advance", "ms": 5000}
//! ```
//!
//! Each applied command produces one report line: the command name, its
//! result, and every queue event it caused.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use a2ui_core::attention::QueueEvent;
use a2ui_core::{
    BackendResponse, Clock, DismissReason, EnqueueOutcome, ManualClock, QueueWidgetPayload,
    WidgetSession,
};

/// A single replay step
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Command {
    /// Interpret a backend response
    Response {
        /// The agent turn
        response: BackendResponse,
    },
    /// Record a user chat turn
    User {
        /// Message text
        text: String,
    },
    /// Submit a widget to the attention queue
    Enqueue {
        /// The submission
        widget: QueueWidgetPayload,
    },
    /// Dismiss a visible or queued widget
    Dismiss {
        /// Target widget
        widget_id: String,
        /// Defaults to a user action
        #[serde(default = "default_dismiss_reason")]
        reason: DismissReason,
    },
    /// Record user interaction with a visible widget
    Interact {
        /// Target widget
        widget_id: String,
    },
    /// Complete a visible widget
    Complete {
        /// Target widget
        widget_id: String,
        /// Optional result data
        #[serde(default)]
        output: Option<Value>,
    },
    /// Enter focus mode
    StartWorkout {
        /// Optional workout session label
        #[serde(default)]
        session_id: Option<String>,
    },
    /// Leave focus mode
    EndWorkout,
    /// Run expiry and admission against the current time
    Tick,
    /// Move the manual clock forward (requires `--manual-clock`)
    Advance {
        /// Milliseconds to advance
        ms: u64,
    },
    /// Freeze an active surface
    Freeze {
        /// Target surface
        surface_id: String,
    },
    /// Resume a frozen surface
    Resume {
        /// Target surface
        surface_id: String,
    },
    /// Dump store, queue and chat state
    Snapshot,
}

fn default_dismiss_reason() -> DismissReason {
    DismissReason::UserAction
}

impl Command {
    /// Wire name of the command
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Response { .. } => "response",
            Self::User { .. } => "user",
            Self::Enqueue { .. } => "enqueue",
            Self::Dismiss { .. } => "dismiss",
            Self::Interact { .. } => "interact",
            Self::Complete { .. } => "complete",
            Self::StartWorkout { .. } => "start_workout",
            Self::EndWorkout => "end_workout",
            Self::Tick => "tick",
            Self::Advance { .. } => "advance",
            Self::Freeze { .. } => "freeze",
            Self::Resume { .. } => "resume",
            Self::Snapshot => "snapshot",
        }
    }
}

/// Drives a [`WidgetSession`] from commands
pub struct Replay {
    session: WidgetSession,
    manual_clock: Option<ManualClock>,
    applied: usize,
}

impl Replay {
    /// Wrap `session`; pass the clock it was built with to allow `advance`
    #[must_use]
    pub fn new(session: WidgetSession, manual_clock: Option<ManualClock>) -> Self {
        Self {
            session,
            manual_clock,
            applied: 0,
        }
    }

    /// The session being driven
    #[must_use]
    pub fn session(&self) -> &WidgetSession {
        &self.session
    }

    /// Commands applied so far
    #[must_use]
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Parse and apply one input line
    ///
    /// Blank lines and lines starting with `#` are skipped (`Ok(None)`).
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not a valid command or the command
    /// cannot run.
    pub fn apply_line(&mut self, line: &str) -> Result<Option<Value>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let command: Command = serde_json::from_str(line).context("Invalid replay command")?;
        self.apply(command).map(Some)
    }

    /// Apply one command and build its report
    ///
    /// # Errors
    ///
    /// Returns an error if `advance` is used without a manual clock.
    pub fn apply(&mut self, command: Command) -> Result<Value> {
        let name = command.name();
        tracing::debug!(command = name, "Applying replay command");

        let result = match command {
            Command::Response { response } => {
                let result = self.session.handle_response(&response);
                if result.has_errors() {
                    tracing::warn!(errors = result.errors.len(), "Response partially applied");
                }
                json!({
                    "message": result.message,
                    "operationsProcessed": result.operations_processed,
                    "errors": result.error_messages(),
                })
            }
            Command::User { text } => json!({ "message": self.session.add_user_message(text) }),
            Command::Enqueue { widget } => {
                let widget_id = widget.widget_id.clone();
                let outcome = self.session.submit_widget(widget);
                json!({ "widgetId": widget_id, "outcome": outcome_json(&outcome) })
            }
            Command::Dismiss { widget_id, reason } => {
                json!({ "dismissed": self.session.queue_mut().dismiss(&widget_id, reason) })
            }
            Command::Interact { widget_id } => {
                json!({ "interacted": self.session.queue_mut().mark_interacted(&widget_id) })
            }
            Command::Complete { widget_id, output } => {
                json!({ "completed": self.session.queue_mut().mark_completed(&widget_id, output) })
            }
            Command::StartWorkout { session_id } => {
                self.session.queue_mut().start_workout(session_id);
                json!({ "workoutActive": true })
            }
            Command::EndWorkout => {
                self.session.queue_mut().end_workout();
                json!({ "workoutActive": false })
            }
            Command::Tick => json!({ "admitted": self.session.queue_mut().tick() }),
            Command::Advance { ms } => {
                let Some(clock) = &self.manual_clock else {
                    bail!("advance requires --manual-clock");
                };
                clock.advance(ms);
                let admitted = self.session.queue_mut().tick();
                json!({ "nowMs": self.session.clock().now_ms(), "admitted": admitted })
            }
            Command::Freeze { surface_id } => {
                json!({ "frozen": self.session.store_mut().freeze_surface(&surface_id) })
            }
            Command::Resume { surface_id } => {
                json!({ "resumed": self.session.store_mut().resume_surface(&surface_id) })
            }
            Command::Snapshot => self.snapshot(),
        };

        self.applied += 1;
        let events: Vec<QueueEvent> = self.session.queue_mut().drain_events();
        Ok(json!({ "command": name, "result": result, "events": events }))
    }

    fn snapshot(&self) -> Value {
        let store = self.session.store();
        let queue = self.session.queue();
        json!({
            "surfaces": {
                "context": store.context_surfaces(),
                "stream": store.stream_surfaces(),
                "overlay": store.overlay_surfaces(),
            },
            "queue": {
                "status": queue.status(),
                "visible": queue.visible(),
                "queued": queue.queued(),
            },
            "messages": self.session.messages(),
        })
    }
}

fn outcome_json(outcome: &EnqueueOutcome) -> Value {
    match outcome {
        EnqueueOutcome::Shown => json!({ "status": "shown" }),
        EnqueueOutcome::Queued => json!({ "status": "queued" }),
        EnqueueOutcome::Deduplicated { replaced } => {
            json!({ "status": "deduplicated", "replaced": replaced })
        }
        EnqueueOutcome::Dropped(reason) => json!({ "status": "dropped", "reason": reason }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use a2ui_core::CoreConfig;
    use pretty_assertions::assert_eq;

    fn replay() -> Replay {
        let clock = ManualClock::new(1_000);
        let session = WidgetSession::from_config(&CoreConfig::new(), Arc::new(clock.clone())).unwrap();
        Replay::new(session, Some(clock))
    }

    #[test]
    fn test_parse_commands() {
        let command: Command =
            serde_json::from_str(r#"{"command": "dismiss", "widgetId": "w1"}"#).unwrap();
        match command {
            Command::Dismiss { widget_id, reason } => {
                assert_eq!(widget_id, "w1");
                assert_eq!(reason, DismissReason::UserAction);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let command: Command = serde_json::from_str(r#"{"command": "end_workout"}"#).unwrap();
        assert_eq!(command.name(), "end_workout");

        assert!(serde_json::from_str::<Command>(r#"{"command": "explode"}"#).is_err());
    }

    #[test]
    fn test_skips_blank_and_comment_lines() {
        let mut replay = replay();
        assert!(replay.apply_line("").unwrap().is_none());
        assert!(replay.apply_line("   # setup").unwrap().is_none());
        assert_eq!(replay.applied(), 0);
    }

    #[test]
    fn test_response_creates_surface_and_links_message() {
        let mut replay = replay();
        let report = replay
            .apply_line(
                r#"{"command": "response", "response": {"text": "Plan ready", "payload": {"type": "meal-plan", "props": {"kcal": 2200}}}}"#,
            )
            .unwrap()
            .unwrap();

        assert_eq!(report["command"], "response");
        assert_eq!(report["result"]["operationsProcessed"], 2);
        let surface_id = report["result"]["message"]["surfaceId"].as_str().unwrap();
        let surface = replay.session().store().get_surface(surface_id).unwrap();
        assert_eq!(surface.widget_type, "meal-plan");
    }

    #[test]
    fn test_enqueue_reports_outcome_and_events() {
        let mut replay = replay();
        let report = replay
            .apply_line(
                r#"{"command": "enqueue", "widget": {"widgetId": "w1", "widgetType": "meal-plan", "agentId": "GENESIS"}}"#,
            )
            .unwrap()
            .unwrap();

        assert_eq!(report["result"]["outcome"]["status"], "shown");
        let events: Vec<&str> = report["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["type"].as_str().unwrap())
            .collect();
        assert_eq!(events, vec!["queued", "shown"]);
    }

    #[test]
    fn test_advance_releases_cooldown() {
        let mut replay = replay();
        replay
            .apply_line(r#"{"command": "enqueue", "widget": {"widgetId": "a", "widgetType": "meal-plan", "agentId": "GENESIS"}}"#)
            .unwrap();
        let report = replay
            .apply_line(r#"{"command": "enqueue", "widget": {"widgetId": "b", "widgetType": "insight-card", "agentId": "GENESIS"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(report["result"]["outcome"]["status"], "queued");

        let report = replay.apply_line(r#"{"command": "advance", "ms": 5000}"#).unwrap().unwrap();
        assert_eq!(report["result"]["admitted"], 1);
        assert!(replay.session().queue().is_visible("b"));
    }

    #[test]
    fn test_advance_without_manual_clock_fails() {
        let session = WidgetSession::new();
        let mut replay = Replay::new(session, None);
        assert!(replay.apply(Command::Advance { ms: 10 }).is_err());
        assert_eq!(replay.applied(), 0);
    }

    #[test]
    fn test_snapshot_shape() {
        let mut replay = replay();
        replay.apply_line(r#"{"command": "user", "text": "hello"}"#).unwrap();
        let report = replay.apply(Command::Snapshot).unwrap();

        assert_eq!(report["result"]["messages"].as_array().unwrap().len(), 1);
        assert_eq!(report["result"]["queue"]["status"]["visibleCount"], 0);
        assert!(report["result"]["surfaces"]["stream"].as_array().unwrap().is_empty());
    }
}
