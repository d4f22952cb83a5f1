//! Built-in commands: help, ping, prefix and setprefix
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: setprefix writes guild overrides, replies with failures
//! - 1.0.0: Help listing grouped by command group, ping

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::context::InvocationContext;
use super::handler::{Command, CommandGroup};
use super::registry::{CommandRegistry, HELP_INVOKE_NAME};
use crate::core::{truncate_chars, DispatchError};
use crate::dispatch::MemoryGuildStore;

const DESCRIPTION_WIDTH: usize = 80;

/// Text shown to the user for a failed invocation
fn user_facing(error: &DispatchError) -> String {
    match error {
        DispatchError::Execution { source, .. } => format!("❌ {source}"),
        DispatchError::MissingPermission { .. } => format!("🚫 You are {error}"),
        other => format!("❌ {other}"),
    }
}

/// Fallback for the reserved `help` name
pub struct HelpCommand {
    registry: Arc<CommandRegistry>,
}

impl HelpCommand {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }

    /// Every reachable command, grouped and sorted by name
    pub fn listing(&self, prefix: &str) -> String {
        let mut groups: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();

        for command in self.registry.commands() {
            let names = self.registry.names_for(command);
            // fully shadowed by a later registration
            let Some(primary) = primary_name(command.as_ref(), &names) else {
                continue;
            };
            groups
                .entry(command.group().to_string())
                .or_default()
                .push((primary, truncate_chars(command.description(), DESCRIPTION_WIDTH)));
        }

        if !self.registry.contains(HELP_INVOKE_NAME) {
            groups
                .entry(self.group().to_string())
                .or_default()
                .push((HELP_INVOKE_NAME.to_string(), self.description().to_string()));
        }

        let mut out = format!("**Commands** (prefix `{prefix}`)\n");
        for (group, mut entries) in groups {
            entries.sort();
            out.push_str(&format!("\n**{group}**\n"));
            for (name, description) in entries {
                out.push_str(&format!("`{prefix}{name}` - {description}\n"));
            }
        }
        out.push_str(&format!(
            "\nUse `{prefix}{HELP_INVOKE_NAME} <command>` for details."
        ));
        out
    }

    /// Details for one command, or `None` if nothing answers to `name`
    pub fn details(&self, prefix: &str, name: &str) -> Option<String> {
        let key = if self.registry.case_insensitive() {
            name.to_lowercase()
        } else {
            name.to_string()
        };

        if let Some(command) = self.registry.get(&key) {
            let names: Vec<String> = self
                .registry
                .names_for(&command)
                .into_iter()
                .map(str::to_string)
                .collect();
            return Some(describe(prefix, &names, command.as_ref()));
        }
        if key == HELP_INVOKE_NAME {
            return Some(describe(prefix, &[HELP_INVOKE_NAME.to_string()], self));
        }
        None
    }
}

/// The declared primary name if still reachable, else the first reachable one
fn primary_name(command: &dyn Command, reachable: &[&str]) -> Option<String> {
    reachable
        .iter()
        .find(|n| n.eq_ignore_ascii_case(command.name()))
        .or_else(|| reachable.first())
        .map(|n| n.to_string())
}

fn describe(prefix: &str, names: &[String], command: &dyn Command) -> String {
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let primary = primary_name(command, &refs).unwrap_or_else(|| command.name().to_string());
    let aliases: Vec<&str> = refs.iter().copied().filter(|n| *n != primary).collect();

    let mut out = format!("**{prefix}{primary}**\n{}\n", command.description());
    if !aliases.is_empty() {
        out.push_str(&format!("Aliases: {}\n", aliases.join(", ")));
    }
    let usage = command.usage();
    if usage.is_empty() {
        out.push_str(&format!("Usage: `{prefix}{primary}`\n"));
    } else {
        out.push_str(&format!("Usage: `{prefix}{primary} {usage}`\n"));
    }
    out.push_str(&format!(
        "Group: {} | Permission level: {}",
        command.group(),
        command.permission_level()
    ));
    out
}

#[async_trait]
impl Command for HelpCommand {
    fn invoke_names(&self) -> &[&'static str] {
        &[HELP_INVOKE_NAME]
    }

    fn group(&self) -> CommandGroup {
        CommandGroup::Info
    }

    fn description(&self) -> &str {
        "List commands, or show details for one"
    }

    fn usage(&self) -> &str {
        "[command]"
    }

    async fn execute(&self, ctx: &InvocationContext) -> Result<()> {
        let text = match ctx.arguments.first() {
            Some(name) => self
                .details(&ctx.prefix, name)
                .unwrap_or_else(|| format!("No command named `{name}`.")),
            None => self.listing(&ctx.prefix),
        };
        ctx.reply(&text).await
    }
}

/// Liveness check
pub struct PingCommand;

#[async_trait]
impl Command for PingCommand {
    fn invoke_names(&self) -> &[&'static str] {
        &["ping"]
    }

    fn group(&self) -> CommandGroup {
        CommandGroup::Info
    }

    fn description(&self) -> &str {
        "Check that the bot is responding"
    }

    async fn execute(&self, ctx: &InvocationContext) -> Result<()> {
        ctx.reply("Pong!").await
    }
}

/// Shows the prefixes active where it is invoked
pub struct PrefixCommand {
    global: String,
    store: Arc<MemoryGuildStore>,
}

impl PrefixCommand {
    pub fn new(global: impl Into<String>, store: Arc<MemoryGuildStore>) -> Self {
        Self {
            global: global.into(),
            store,
        }
    }
}

#[async_trait]
impl Command for PrefixCommand {
    fn invoke_names(&self) -> &[&'static str] {
        &["prefix"]
    }

    fn group(&self) -> CommandGroup {
        CommandGroup::Utility
    }

    fn description(&self) -> &str {
        "Show the command prefixes for this server"
    }

    async fn execute(&self, ctx: &InvocationContext) -> Result<()> {
        let text = match ctx.container.and_then(|guild| self.store.get(guild)) {
            Some(custom) => format!("Prefixes here: `{}` and `{custom}`", self.global),
            None => format!("Prefix here: `{}`", self.global),
        };
        ctx.reply(&text).await
    }
}

/// Sets or clears the guild prefix override
pub struct SetPrefixCommand {
    store: Arc<MemoryGuildStore>,
    level: u8,
}

impl SetPrefixCommand {
    pub fn new(store: Arc<MemoryGuildStore>, level: u8) -> Self {
        Self { store, level }
    }
}

#[async_trait]
impl Command for SetPrefixCommand {
    fn invoke_names(&self) -> &[&'static str] {
        &["setprefix"]
    }

    fn group(&self) -> CommandGroup {
        CommandGroup::Admin
    }

    fn permission_level(&self) -> u8 {
        self.level
    }

    fn description(&self) -> &str {
        "Set this server's extra prefix, or `reset` to remove it"
    }

    fn usage(&self) -> &str {
        "<prefix|reset>"
    }

    async fn execute(&self, ctx: &InvocationContext) -> Result<()> {
        let guild_id = ctx.container.ok_or_else(|| DispatchError::GuildOnly {
            command: self.name().to_string(),
        })?;
        let requested = ctx
            .arguments
            .first()
            .ok_or_else(|| anyhow!("Usage: `{}{} {}`", ctx.prefix, self.name(), self.usage()))?;

        if requested.eq_ignore_ascii_case("reset") {
            let removed = self.store.remove_prefix(guild_id);
            info!(
                "[{}] 🔧 Guild {guild_id} prefix override removed (was {removed:?})",
                ctx.request_id
            );
            return ctx.reply("Custom prefix removed.").await;
        }

        self.store.set_prefix(guild_id, requested)?;
        info!(
            "[{}] 🔧 Guild {guild_id} prefix override set to {requested:?} by {}",
            ctx.request_id, ctx.principal.id
        );
        ctx.reply(&format!("Custom prefix set to `{requested}`.")).await
    }

    async fn on_failure(&self, error: &DispatchError, ctx: &InvocationContext) -> Result<()> {
        ctx.reply(&user_facing(error)).await
    }
}
