//! # Execution Supervisor
//!
//! Drives one resolved invocation from permission check to a terminal
//! outcome and records exactly one terminal event for it.
//!
//! ```text
//! Pending → CheckingPermission → Executing → Succeeded | Failed
//!                              ↘ Denied
//! ```
//!
//! A provider fault leaves `CheckingPermission` without executing; it is
//! recorded as `PermissionCheckFailed` and the invocation is dropped.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Panicking bodies and failure handlers are contained per invocation
//! - 1.0.0: Initial release

use anyhow::anyhow;
use log::{debug, Level};
use std::sync::Arc;
use uuid::Uuid;

use super::events::{DispatchEvent, EventKind, LogSink};
use super::permission::{GateDecision, PermissionGate};
use crate::commands::{Command, InvocationContext};
use crate::core::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Pending,
    CheckingPermission,
    Executing,
    Denied,
    Succeeded,
    Failed,
}

impl InvocationState {
    pub fn can_transition_to(self, next: InvocationState) -> bool {
        use InvocationState::*;
        matches!(
            (self, next),
            (Pending, CheckingPermission)
                | (CheckingPermission, Executing)
                | (CheckingPermission, Denied)
                | (Executing, Succeeded)
                | (Executing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InvocationState::Denied | InvocationState::Succeeded | InvocationState::Failed
        )
    }
}

/// How an invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
    Denied,
    /// Permission provider fault; the body never ran
    Dropped,
}

struct StateTracker {
    request_id: Uuid,
    state: InvocationState,
}

impl StateTracker {
    fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            state: InvocationState::Pending,
        }
    }

    fn advance(&mut self, next: InvocationState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("[{}] {:?} → {:?}", self.request_id, self.state, next);
        self.state = next;
    }
}

pub struct ExecutionSupervisor {
    gate: PermissionGate,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl ExecutionSupervisor {
    pub fn new(gate: PermissionGate, sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self { gate, sinks }
    }

    fn emit(&self, level: Level, event: DispatchEvent) {
        for sink in &self.sinks {
            sink.record(level, &event);
        }
    }

    fn emit_kind(&self, ctx: &InvocationContext, command: &str, kind: EventKind) {
        let event = DispatchEvent::new(ctx, command, kind);
        self.emit(event.level(), event);
    }

    /// Run `command` for `ctx`; never returns an error and never panics
    /// because of the command
    pub async fn run(&self, command: Arc<dyn Command>, ctx: InvocationContext) -> Outcome {
        let name = command.name();
        let mut tracker = StateTracker::new(ctx.request_id);
        tracker.advance(InvocationState::CheckingPermission);

        match self.gate.evaluate(&ctx, command.as_ref()).await {
            GateDecision::Granted { .. } => {}
            GateDecision::Denied => {
                tracker.advance(InvocationState::Denied);
                let error = DispatchError::MissingPermission {
                    command: name.to_string(),
                    required: command.permission_level(),
                };
                self.fail(command, ctx, error).await;
                return Outcome::Denied;
            }
            GateDecision::Error(error) => {
                self.emit_kind(
                    &ctx,
                    name,
                    EventKind::PermissionCheckFailed {
                        error: error.to_string(),
                    },
                );
                return Outcome::Dropped;
            }
        }

        tracker.advance(InvocationState::Executing);

        let body = {
            let command = Arc::clone(&command);
            let ctx = ctx.clone();
            tokio::spawn(async move { command.execute(&ctx).await })
        };
        let result = match body.await {
            Ok(result) => result,
            Err(join_error) => Err(anyhow!("command panicked: {join_error}")),
        };

        match result {
            Ok(()) => {
                tracker.advance(InvocationState::Succeeded);
                self.emit_kind(&ctx, name, EventKind::Succeeded);
                Outcome::Succeeded
            }
            Err(source) => {
                tracker.advance(InvocationState::Failed);
                let error = DispatchError::Execution {
                    command: name.to_string(),
                    source,
                };
                self.fail(command, ctx, error).await;
                Outcome::Failed
            }
        }
    }

    /// Record the failure, then hand the error to the command's failure handler
    ///
    /// The terminal event never waits on the handler.
    async fn fail(&self, command: Arc<dyn Command>, ctx: InvocationContext, error: DispatchError) {
        let name = command.name();
        self.emit_kind(
            &ctx,
            name,
            EventKind::Failed {
                error: error.to_string(),
                denied: error.is_denial(),
            },
        );

        let handler = {
            let ctx = ctx.clone();
            tokio::spawn(async move { command.on_failure(&error, &ctx).await })
        };
        let handler_result = match handler.await {
            Ok(result) => result,
            Err(join_error) => Err(anyhow!("failure handler panicked: {join_error}")),
        };

        if let Err(e) = handler_result {
            self.emit_kind(
                &ctx,
                name,
                EventKind::FailureHandlerFailed {
                    error: format!("{e:#}"),
                },
            );
        }
    }
}
