//! Dispatch error taxonomy
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//!
//! There is no "not a command" variant: an unmatched message is a no-op,
//! never an error value.

use std::time::Duration;
use thiserror::Error;

/// Errors that reach a command's failure handler or the logging sinks.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The permission gate refused the invocation.
    #[error("missing permission to run `{command}` (requires level {required})")]
    MissingPermission { command: String, required: u8 },

    /// The command body returned an error.
    #[error("command `{command}` failed: {source}")]
    Execution {
        command: String,
        #[source]
        source: anyhow::Error,
    },

    /// The permission provider itself failed; the invocation is dropped.
    #[error("permission check for `{command}` failed: {source}")]
    PermissionCheck {
        command: String,
        #[source]
        source: anyhow::Error,
    },

    /// A collaborator did not answer in time.
    #[error("{stage} timed out after {}ms", .after.as_millis())]
    Timeout { stage: &'static str, after: Duration },

    /// The command only makes sense inside a guild.
    #[error("`{command}` can only be used in a server")]
    GuildOnly { command: String },
}

impl DispatchError {
    /// True for refusals, which are reported like failures but are not faults.
    pub fn is_denial(&self) -> bool {
        matches!(self, DispatchError::MissingPermission { .. })
    }
}
