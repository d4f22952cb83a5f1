//! # Dispatch Events
//!
//! Structured records of each invocation's outcome and the sinks that
//! receive them. Sinks are fire-and-forget: recording never fails and never
//! blocks the pipeline.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: JSON line sink
//! - 1.0.0: Initial release with console sink

use chrono::{DateTime, Utc};
use log::{error, info, log, warn, Level};
use serde::Serialize;
use uuid::Uuid;

use crate::commands::InvocationContext;

/// Log target used by `JsonSink`
pub const EVENT_TARGET: &str = "dispatch::events";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    Succeeded,
    /// Body failed, or permission was denied (`denied: true`)
    Failed { error: String, denied: bool },
    /// The command's own failure handler errored; logged on top of `Failed`
    FailureHandlerFailed { error: String },
    /// The permission provider broke; the invocation was dropped
    PermissionCheckFailed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchEvent {
    pub request_id: Uuid,
    pub command: String,
    pub principal_id: u64,
    pub principal_name: String,
    /// Guild id, or `DM`
    pub container: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl DispatchEvent {
    pub fn new(ctx: &InvocationContext, command: &str, kind: EventKind) -> Self {
        Self {
            request_id: ctx.request_id,
            command: command.to_string(),
            principal_id: ctx.principal.id,
            principal_name: ctx.principal.name.clone(),
            container: ctx.container_label(),
            content: ctx.message.content.clone(),
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn level(&self) -> Level {
        match &self.kind {
            EventKind::Succeeded => Level::Info,
            EventKind::Failed { denied: true, .. } => Level::Warn,
            EventKind::Failed { .. }
            | EventKind::FailureHandlerFailed { .. }
            | EventKind::PermissionCheckFailed { .. } => Level::Error,
        }
    }

    /// Successes and failures, the events the log-to-console toggle gates
    pub fn is_outcome(&self) -> bool {
        matches!(self.kind, EventKind::Succeeded | EventKind::Failed { .. })
    }

    /// Whether this closes out an invocation
    ///
    /// `FailureHandlerFailed` is a secondary record; every other kind is
    /// the single terminal event of its invocation.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, EventKind::FailureHandlerFailed { .. })
    }
}

/// Destination for dispatch events
pub trait LogSink: Send + Sync {
    fn record(&self, level: Level, event: &DispatchEvent);
}

/// Human-readable events through the `log` facade
pub struct ConsoleSink {
    /// Gates `Succeeded` and `Failed`; collaborator faults always log
    log_outcomes: bool,
}

impl ConsoleSink {
    pub fn new(log_outcomes: bool) -> Self {
        Self { log_outcomes }
    }

    pub fn writes(&self, event: &DispatchEvent) -> bool {
        self.log_outcomes || !event.is_outcome()
    }
}

impl LogSink for ConsoleSink {
    fn record(&self, _level: Level, event: &DispatchEvent) {
        if !self.writes(event) {
            return;
        }
        let id = event.request_id;
        let content: String = event.content.chars().take(100).collect();
        let (command, name, user, guild) = (
            &event.command,
            &event.principal_name,
            event.principal_id,
            &event.container,
        );

        match &event.kind {
            EventKind::Succeeded => info!(
                "[{id}] ✅ {command} | User: {name} ({user}) | Guild: {guild} | \
                 Content: '{content}'"
            ),
            EventKind::Failed { error, denied: true } => warn!(
                "[{id}] 🚫 {command} denied | User: {name} ({user}) | Guild: {guild} | {error}"
            ),
            EventKind::Failed { error, .. } => error!(
                "[{id}] ❌ {command} failed | User: {name} ({user}) | Guild: {guild} | \
                 Content: '{content}' | {error}"
            ),
            EventKind::FailureHandlerFailed { error } => {
                error!("[{id}] ❌ Failure handler of {command} errored: {error}")
            }
            EventKind::PermissionCheckFailed { error } => error!(
                "[{id}] ❌ Permission check for {command} errored, dropping invocation: {error}"
            ),
        }
    }
}

/// One JSON object per event under the `dispatch::events` target
///
/// Shares the console toggle: with `log_outcomes` off only collaborator
/// faults are written.
pub struct JsonSink {
    log_outcomes: bool,
}

impl JsonSink {
    pub fn new(log_outcomes: bool) -> Self {
        Self { log_outcomes }
    }

    pub fn writes(&self, event: &DispatchEvent) -> bool {
        self.log_outcomes || !event.is_outcome()
    }

    pub fn render(event: &DispatchEvent) -> serde_json::Result<String> {
        serde_json::to_string(event)
    }
}

impl LogSink for JsonSink {
    fn record(&self, level: Level, event: &DispatchEvent) {
        if !self.writes(event) {
            return;
        }
        match Self::render(event) {
            Ok(line) => log!(target: EVENT_TARGET, level, "{line}"),
            Err(e) => warn!("[{}] Failed to serialize dispatch event: {e}", event.request_id),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every recorded event for assertions
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<(Level, DispatchEvent)>>,
    }

    impl RecordingSink {
        pub fn kinds(&self) -> Vec<EventKind> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|(_, e)| e.kind.clone())
                .collect()
        }

        pub fn events(&self) -> Vec<DispatchEvent> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|(_, e)| e.clone())
                .collect()
        }
    }

    impl LogSink for RecordingSink {
        fn record(&self, level: Level, event: &DispatchEvent) {
            self.events.lock().unwrap().push((level, event.clone()));
        }
    }
}
