//! # Command System
//!
//! Prefix commands: the command trait, per-invocation context, registry and
//! the built-in commands.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: setprefix command, registry keeps one entry per command
//! - 1.0.0: Command trait with failure handlers, registry and built-in help

pub mod builtin;
pub mod context;
pub mod handler;
pub mod registry;

pub use builtin::{HelpCommand, PingCommand, PrefixCommand, SetPrefixCommand};
pub use context::{HttpResponder, IncomingMessage, InvocationContext, Principal, Responder};
pub use handler::{Command, CommandGroup};
pub use registry::{CommandRegistry, Resolved, HELP_INVOKE_NAME};
