//! Command registry
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Re-registering a command keeps a single help entry
//! - 1.0.0: Invoke-name lookup, built-in help fallback, collision warnings

use anyhow::{anyhow, Result};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;

use super::handler::Command;

/// Invoke name reserved for the built-in help command
pub const HELP_INVOKE_NAME: &str = "help";

/// Outcome of looking up an invoke name
#[derive(Clone)]
pub enum Resolved {
    Command(Arc<dyn Command>),
    /// No registered command claimed `help`; use the built-in one
    Help,
}

/// Registry mapping invoke names to commands
///
/// Filled during startup, then frozen behind an `Arc` and shared read-only
/// with the dispatcher.
///
/// Collisions are last-write-wins: registering a second command under an
/// existing invoke name replaces the first for that name and logs a
/// warning. Registration order therefore matters for colliding names; keep
/// invoke names unique rather than relying on it.
#[derive(Clone)]
pub struct CommandRegistry {
    by_name: HashMap<String, Arc<dyn Command>>,
    registered: Vec<Arc<dyn Command>>,
    case_insensitive: bool,
}

impl CommandRegistry {
    /// Create a new empty registry with case-insensitive names
    pub fn new() -> Self {
        Self::with_case_folding(true)
    }

    pub fn with_case_folding(case_insensitive: bool) -> Self {
        Self {
            by_name: HashMap::new(),
            registered: Vec::new(),
            case_insensitive,
        }
    }

    fn key(&self, name: &str) -> String {
        if self.case_insensitive {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }

    /// Register a command under every name it declares
    pub fn register(&mut self, command: Arc<dyn Command>) -> Result<()> {
        let names = command.invoke_names();
        if names.is_empty() || names.iter().any(|n| n.trim().is_empty()) {
            return Err(anyhow!("Command must declare at least one non-empty invoke name"));
        }

        for name in names {
            let key = self.key(name);
            if let Some(previous) = self.by_name.insert(key.clone(), Arc::clone(&command)) {
                if !Arc::ptr_eq(&previous, &command) {
                    warn!(
                        "⚠️ Invoke name '{}' re-registered: '{}' replaces '{}'",
                        key,
                        command.name(),
                        previous.name()
                    );
                }
            }
        }

        debug!("Registered command '{}' ({} names)", command.name(), names.len());
        if !self.registered.iter().any(|c| Arc::ptr_eq(c, &command)) {
            self.registered.push(command);
        }
        Ok(())
    }

    /// Get the command registered for an invoke name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.by_name.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Map an already-folded invoke name to something runnable
    pub fn resolve(&self, name: &str) -> Option<Resolved> {
        if let Some(command) = self.get(name) {
            return Some(Resolved::Command(command));
        }
        (name == HELP_INVOKE_NAME).then_some(Resolved::Help)
    }

    /// Invoke names that still resolve to `command`, sorted
    pub fn names_for(&self, command: &Arc<dyn Command>) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .by_name
            .iter()
            .filter(|(_, c)| Arc::ptr_eq(c, command))
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Every registered command, in registration order
    pub fn commands(&self) -> impl Iterator<Item = &Arc<dyn Command>> {
        self.registered.iter()
    }

    /// Number of registered invoke names
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::context::InvocationContext;
    use async_trait::async_trait;

    struct MockCommand {
        names: &'static [&'static str],
        description: &'static str,
    }

    #[async_trait]
    impl Command for MockCommand {
        fn invoke_names(&self) -> &[&'static str] {
            self.names
        }

        fn description(&self) -> &str {
            self.description
        }

        async fn execute(&self, _ctx: &InvocationContext) -> Result<()> {
            Ok(())
        }
    }

    fn mock(names: &'static [&'static str], description: &'static str) -> Arc<dyn Command> {
        Arc::new(MockCommand { names, description })
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = CommandRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.commands().count(), 0);
    }

    #[test]
    fn test_register_multiple_names() {
        let mut registry = CommandRegistry::new();
        registry.register(mock(&["stats", "st"], "")).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("stats"));
        assert!(registry.contains("st"));
        assert_eq!(registry.commands().count(), 1);
    }

    #[test]
    fn test_register_rejects_nameless_command() {
        let mut registry = CommandRegistry::new();
        assert!(registry.register(mock(&[], "")).is_err());
        assert!(registry.register(mock(&[""], "")).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = CommandRegistry::new();
        let first = mock(&["ping"], "first");
        let second = mock(&["ping"], "second");
        registry.register(first.clone()).unwrap();
        registry.register(second.clone()).unwrap();

        let resolved = registry.get("ping").unwrap();
        assert_eq!(resolved.description(), "second");
        assert_eq!(registry.len(), 1);
        assert!(registry.names_for(&first).is_empty());
        assert_eq!(registry.names_for(&second), vec!["ping"]);
    }

    #[test]
    fn test_same_command_registered_twice_is_listed_once() {
        let mut registry = CommandRegistry::new();
        let ping = mock(&["ping"], "");
        registry.register(ping.clone()).unwrap();
        registry.register(ping.clone()).unwrap();

        assert_eq!(registry.commands().count(), 1);
        assert_eq!(registry.names_for(&ping), vec!["ping"]);
    }

    #[test]
    fn test_names_are_folded_when_case_insensitive() {
        let mut registry = CommandRegistry::new();
        registry.register(mock(&["Stats"], "")).unwrap();
        assert!(registry.contains("stats"));

        let mut strict = CommandRegistry::with_case_folding(false);
        strict.register(mock(&["Stats"], "")).unwrap();
        assert!(strict.contains("Stats"));
        assert!(!strict.contains("stats"));
    }

    #[test]
    fn test_resolve_falls_back_to_builtin_help() {
        let mut registry = CommandRegistry::new();
        registry.register(mock(&["ping"], "")).unwrap();

        assert!(matches!(registry.resolve("ping"), Some(Resolved::Command(_))));
        assert!(matches!(registry.resolve("help"), Some(Resolved::Help)));
        assert!(registry.resolve("pong").is_none());
        assert!(registry.resolve("").is_none());
    }

    #[test]
    fn test_registered_help_overrides_builtin() {
        let mut registry = CommandRegistry::new();
        registry.register(mock(&["help"], "custom help")).unwrap();

        match registry.resolve("help") {
            Some(Resolved::Command(cmd)) => assert_eq!(cmd.description(), "custom help"),
            _ => panic!("expected registered help command"),
        }
    }
}
