//! # Dispatch Pipeline
//!
//! Turns chat messages into command invocations:
//! prefix resolution → parsing → command lookup → permission gate →
//! supervised execution → event sinks.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Edited messages re-enter the pipeline, self-message guard
//! - 1.0.0: Initial release

pub mod events;
pub mod handler;
pub mod parser;
pub mod permission;
pub mod prefix;
pub mod supervisor;

use anyhow::Result;
use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::commands::builtin::HelpCommand;
use crate::commands::registry::Resolved;
use crate::commands::{Command, CommandRegistry, IncomingMessage, InvocationContext, Responder};
use crate::core::DispatchOptions;

pub use events::{ConsoleSink, DispatchEvent, EventKind, JsonSink, LogSink};
pub use handler::DispatchHandler;
pub use parser::{parse_invocation, Invocation};
pub use permission::{
    AllowAll, GateDecision, LevelPermissionProvider, PermissionGate, PermissionProvider,
};
pub use prefix::{
    GuildConfigFile, GuildConfigStore, MemoryGuildStore, PrefixBinding, PrefixResolver,
};
pub use supervisor::{ExecutionSupervisor, InvocationState, Outcome};

/// Collects collaborators before the registry is frozen
pub struct DispatcherBuilder {
    options: DispatchOptions,
    registry: CommandRegistry,
    guild_store: Option<Arc<dyn GuildConfigStore>>,
    permissions: Option<Arc<dyn PermissionProvider>>,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl DispatcherBuilder {
    pub fn new(options: DispatchOptions) -> Self {
        let registry = CommandRegistry::with_case_folding(options.case_insensitive);
        Self {
            options,
            registry,
            guild_store: None,
            permissions: None,
            sinks: Vec::new(),
        }
    }

    pub fn command(mut self, command: Arc<dyn Command>) -> Result<Self> {
        self.registry.register(command)?;
        Ok(self)
    }

    pub fn guild_store(mut self, store: Arc<dyn GuildConfigStore>) -> Self {
        self.guild_store = Some(store);
        self
    }

    pub fn permissions(mut self, provider: Arc<dyn PermissionProvider>) -> Self {
        self.permissions = Some(provider);
        self
    }

    /// Add a sink next to the console sink
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Validate options and freeze the registry
    ///
    /// Defaults: an empty in-memory guild store, and a level provider where
    /// the owner holds the owner permission level.
    pub fn build(self) -> Result<Dispatcher> {
        self.options.validate()?;

        let options = self.options;
        let registry = Arc::new(self.registry);

        let store = self
            .guild_store
            .unwrap_or_else(|| Arc::new(MemoryGuildStore::new()));
        let provider = self.permissions.unwrap_or_else(|| {
            Arc::new(LevelPermissionProvider::new(
                options.owner_id,
                options.owner_permission_level,
            ))
        });

        let mut sinks: Vec<Arc<dyn LogSink>> =
            vec![Arc::new(ConsoleSink::new(options.log_to_console))];
        sinks.extend(self.sinks);

        let gate = PermissionGate::new(
            provider,
            options.owner_id,
            options.permission_check_timeout,
        );

        info!(
            "📋 Dispatcher ready | Prefix: '{}' | {} invoke names | Owner: {}",
            options.prefix,
            registry.len(),
            options
                .owner_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        Ok(Dispatcher {
            prefixes: PrefixResolver::new(store, options.prefix_lookup_timeout),
            supervisor: ExecutionSupervisor::new(gate, sinks),
            help: Arc::new(HelpCommand::new(Arc::clone(&registry))),
            registry,
            options,
            bot_user_id: AtomicU64::new(0),
        })
    }
}

/// Per-message orchestrator; share it behind an `Arc`
pub struct Dispatcher {
    options: DispatchOptions,
    registry: Arc<CommandRegistry>,
    help: Arc<dyn Command>,
    prefixes: PrefixResolver,
    supervisor: ExecutionSupervisor,
    /// 0 until the gateway reports ready
    bot_user_id: AtomicU64,
}

impl Dispatcher {
    pub fn builder(options: DispatchOptions) -> DispatcherBuilder {
        DispatcherBuilder::new(options)
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn set_bot_user_id(&self, id: u64) {
        self.bot_user_id.store(id, Ordering::Relaxed);
    }

    /// Cheap synchronous filters applied before anything async
    pub fn accepts(&self, msg: &IncomingMessage) -> bool {
        let own_id = self.bot_user_id.load(Ordering::Relaxed);
        if msg.author.bot || (own_id != 0 && msg.author.id == own_id) {
            return false;
        }
        if msg.is_direct() && !self.options.parse_direct_messages {
            return false;
        }
        if msg.edited && !self.options.parse_edits {
            return false;
        }
        true
    }

    /// Spawn the pipeline for `msg` without waiting on it
    ///
    /// Returns `None` when the message was filtered out up front.
    pub fn dispatch(
        self: &Arc<Self>,
        msg: IncomingMessage,
        responder: Arc<dyn Responder>,
    ) -> Option<JoinHandle<Option<Outcome>>> {
        if !self.accepts(&msg) {
            return None;
        }
        let this = Arc::clone(self);
        Some(tokio::spawn(async move { this.run_pipeline(msg, responder).await }))
    }

    /// Run the pipeline for `msg` to completion
    ///
    /// `None` means the message was not an invocation of anything.
    pub async fn process(
        &self,
        msg: IncomingMessage,
        responder: Arc<dyn Responder>,
    ) -> Option<Outcome> {
        if !self.accepts(&msg) {
            return None;
        }
        self.run_pipeline(msg, responder).await
    }

    async fn run_pipeline(
        &self,
        msg: IncomingMessage,
        responder: Arc<dyn Responder>,
    ) -> Option<Outcome> {
        let request_id = Uuid::new_v4();
        let mut binding = PrefixBinding::global(self.options.prefix.as_str());
        // The global prefix wins ties, so the override only matters without it
        if !msg.content.starts_with(self.options.prefix.as_str()) {
            binding.guild = self.prefixes.resolve(msg.guild_id, request_id).await;
        }

        let invocation = parse_invocation(&msg.content, &binding, self.options.case_insensitive)?;

        let command = match self.registry.resolve(&invocation.invoke_name)? {
            Resolved::Command(command) => command,
            Resolved::Help => Arc::clone(&self.help),
        };

        let ctx = InvocationContext::new(
            msg,
            invocation.prefix,
            invocation.invoke_name,
            invocation.arguments,
            responder,
        )
        .with_request_id(request_id);
        debug!(
            "[{}] 🎯 '{}' matched '{}' | Args: {} | User: {} | Guild: {}",
            ctx.request_id,
            ctx.invoke_name,
            command.name(),
            ctx.arguments.len(),
            ctx.principal.id,
            ctx.container_label()
        );

        Some(self.supervisor.run(command, ctx).await)
    }
}
