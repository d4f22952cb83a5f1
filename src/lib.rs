// Core layer - configuration, errors and reply helpers
pub mod core;

// Command layer - command trait, registry and built-ins
pub mod commands;

// Dispatch layer - message to command pipeline
pub mod dispatch;

pub use core::{Config, DispatchError, DispatchOptions};

pub use commands::{
    Command, CommandGroup, CommandRegistry, IncomingMessage, InvocationContext, Principal,
    Responder,
};

pub use dispatch::{
    DispatchHandler, Dispatcher, DispatcherBuilder, GuildConfigStore, LogSink, MemoryGuildStore,
    Outcome, PermissionProvider,
};
