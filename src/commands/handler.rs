//! Prefix command trait and grouping
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Custom command groups
//! - 1.0.0: Prefix commands with failure handler, group and permission level

use anyhow::Result;
use async_trait::async_trait;
use log::warn;
use std::fmt;

use super::context::InvocationContext;
use crate::core::DispatchError;

/// Label used to group commands in help listings
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandGroup {
    Admin,
    Fun,
    Info,
    Moderation,
    Utility,
    #[default]
    Misc,
    Custom(String),
}

impl fmt::Display for CommandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandGroup::Admin => write!(f, "Admin"),
            CommandGroup::Fun => write!(f, "Fun"),
            CommandGroup::Info => write!(f, "Info"),
            CommandGroup::Moderation => write!(f, "Moderation"),
            CommandGroup::Utility => write!(f, "Utility"),
            CommandGroup::Misc => write!(f, "Misc"),
            CommandGroup::Custom(label) => write!(f, "{label}"),
        }
    }
}

/// A runnable prefix command
///
/// Implementations are registered once with a `CommandRegistry` and are
/// immutable afterwards; the dispatcher only holds shared references.
///
/// # Example
///
/// ```ignore
/// pub struct Ping;
///
/// #[async_trait]
/// impl Command for Ping {
///     fn invoke_names(&self) -> &[&'static str] {
///         &["ping"]
///     }
///
///     async fn execute(&self, ctx: &InvocationContext) -> Result<()> {
///         ctx.reply("Pong!").await
///     }
/// }
/// ```
#[async_trait]
pub trait Command: Send + Sync {
    /// Tokens that trigger this command; the first is its primary name
    fn invoke_names(&self) -> &[&'static str];

    fn group(&self) -> CommandGroup {
        CommandGroup::Misc
    }

    /// Policy input for the permission provider, opaque to the dispatcher
    fn permission_level(&self) -> u8 {
        0
    }

    fn description(&self) -> &str {
        "No description"
    }

    /// Argument syntax shown by help, without prefix or name
    fn usage(&self) -> &str {
        ""
    }

    async fn execute(&self, ctx: &InvocationContext) -> Result<()>;

    /// Called when the command was denied or its body failed
    ///
    /// Errors returned here are logged by the dispatcher and dropped.
    async fn on_failure(&self, error: &DispatchError, ctx: &InvocationContext) -> Result<()> {
        warn!(
            "[{}] ⚠️ {} failed for user {}: {}",
            ctx.request_id,
            self.name(),
            ctx.principal.id,
            error
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.invoke_names().first().copied().unwrap_or("")
    }
}
