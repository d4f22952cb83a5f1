//! # Prefix Resolution
//!
//! Guild prefix overrides and the resolver that fetches them per message.
//! A failing or slow store never blocks dispatch: every failure degrades to
//! "no override" and the global prefix keeps working.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Lookup timeout, YAML seed file for the memory store
//! - 1.0.0: Initial release with DashMap-backed guild store

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

use crate::core::validate_prefix;

/// Source of per-guild prefix overrides
#[async_trait]
pub trait GuildConfigStore: Send + Sync {
    /// `Ok(None)` means the guild has no override
    async fn guild_prefix(&self, guild_id: u64) -> Result<Option<String>>;
}

/// Prefixes that apply to one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixBinding {
    /// Always active, fixed at startup
    pub global: String,
    /// Guild override; `None` is "no override", never an empty prefix
    pub guild: Option<String>,
}

impl PrefixBinding {
    pub fn global(prefix: impl Into<String>) -> Self {
        Self {
            global: prefix.into(),
            guild: None,
        }
    }

    pub fn with_guild(mut self, prefix: impl Into<String>) -> Self {
        self.guild = Some(prefix.into());
        self
    }

    /// The prefix `text` starts with; global wins when both match
    pub fn matched<'a>(&'a self, text: &str) -> Option<&'a str> {
        if text.starts_with(self.global.as_str()) {
            return Some(self.global.as_str());
        }
        self.guild
            .as_deref()
            .filter(|prefix| !prefix.is_empty() && text.starts_with(*prefix))
    }
}

/// Fetches guild overrides with a bounded wait
pub struct PrefixResolver {
    store: Arc<dyn GuildConfigStore>,
    lookup_timeout: Duration,
}

impl PrefixResolver {
    pub fn new(store: Arc<dyn GuildConfigStore>, lookup_timeout: Duration) -> Self {
        Self {
            store,
            lookup_timeout,
        }
    }

    /// Guild override for a message, or `None`
    ///
    /// Direct messages skip the store entirely.
    pub async fn resolve(&self, guild_id: Option<u64>, request_id: Uuid) -> Option<String> {
        let guild_id = guild_id?;

        match timeout(self.lookup_timeout, self.store.guild_prefix(guild_id)).await {
            Ok(Ok(Some(prefix))) if !prefix.is_empty() => {
                debug!("[{request_id}] 🔍 Guild {guild_id} prefix override: {prefix:?}");
                Some(prefix)
            }
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                warn!("[{request_id}] ⚠️ Prefix lookup failed for guild {guild_id}: {e}");
                None
            }
            Err(_) => {
                warn!(
                    "[{request_id}] ⏱️ Prefix lookup for guild {guild_id} timed out after {}ms",
                    self.lookup_timeout.as_millis()
                );
                None
            }
        }
    }
}

/// Per-guild settings as stored in the seed file
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct GuildSettings {
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Root of the guild configuration YAML
///
/// ```yaml
/// guilds:
///   123456789012345678:
///     prefix: "?"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GuildConfigFile {
    #[serde(default)]
    pub guilds: HashMap<u64, GuildSettings>,
}

impl GuildConfigFile {
    pub fn load(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let file: GuildConfigFile = serde_yaml::from_str(contents)?;
        file.validate()?;
        Ok(file)
    }

    pub fn validate(&self) -> Result<()> {
        for (guild_id, settings) in &self.guilds {
            if let Some(prefix) = &settings.prefix {
                validate_prefix(prefix)
                    .map_err(|e| anyhow!("Invalid prefix for guild {guild_id}: {e}"))?;
            }
        }
        Ok(())
    }
}

/// In-memory writable guild store
#[derive(Debug, Clone, Default)]
pub struct MemoryGuildStore {
    prefixes: DashMap<u64, String>,
}

impl MemoryGuildStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(file: &GuildConfigFile) -> Self {
        let store = Self::new();
        for (guild_id, settings) in &file.guilds {
            if let Some(prefix) = &settings.prefix {
                store.prefixes.insert(*guild_id, prefix.clone());
            }
        }
        store
    }

    /// Set a validated override, returning the previous one
    pub fn set_prefix(&self, guild_id: u64, prefix: &str) -> Result<Option<String>> {
        validate_prefix(prefix)?;
        Ok(self.prefixes.insert(guild_id, prefix.to_string()))
    }

    pub fn remove_prefix(&self, guild_id: u64) -> Option<String> {
        self.prefixes.remove(&guild_id).map(|(_, prefix)| prefix)
    }

    pub fn get(&self, guild_id: u64) -> Option<String> {
        self.prefixes.get(&guild_id).map(|p| p.value().clone())
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

#[async_trait]
impl GuildConfigStore for MemoryGuildStore {
    async fn guild_prefix(&self, guild_id: u64) -> Result<Option<String>> {
        Ok(self.get(guild_id))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::sync::atomic::Ordering;

    fn resolver(store: Arc<dyn GuildConfigStore>) -> PrefixResolver {
        PrefixResolver::new(store, Duration::from_millis(50))
    }

    #[test]
    fn test_binding_global_wins_tie() {
        let binding = PrefixBinding::global("!").with_guild("!!");
        assert_eq!(binding.matched("!!ping"), Some("!"));
        assert_eq!(binding.matched("?ping"), None);
    }

    #[test]
    fn test_binding_guild_match() {
        let binding = PrefixBinding::global("!").with_guild("?");
        assert_eq!(binding.matched("?stats"), Some("?"));
        assert_eq!(binding.matched("!stats"), Some("!"));
        assert_eq!(binding.matched("stats"), None);
    }

    #[tokio::test]
    async fn test_resolve_override() {
        let store = Arc::new(MemoryGuildStore::new());
        store.set_prefix(1, "?").unwrap();
        let resolver = resolver(store);

        assert_eq!(resolver.resolve(Some(1), Uuid::new_v4()).await, Some("?".to_string()));
        assert_eq!(resolver.resolve(Some(2), Uuid::new_v4()).await, None);
    }

    #[tokio::test]
    async fn test_direct_message_skips_store() {
        let store = Arc::new(FailingStore::default());
        let resolver = resolver(store.clone());

        assert_eq!(resolver.resolve(None, Uuid::new_v4()).await, None);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_no_override() {
        let store = Arc::new(FailingStore::default());
        let resolver = resolver(store.clone());

        assert_eq!(resolver.resolve(Some(1), Uuid::new_v4()).await, None);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_store_timeout_degrades_to_no_override() {
        let resolver = resolver(Arc::new(HangingStore));
        assert_eq!(resolver.resolve(Some(1), Uuid::new_v4()).await, None);
    }

    #[test]
    fn test_memory_store_set_and_remove() {
        let store = MemoryGuildStore::new();
        assert_eq!(store.set_prefix(5, "$").unwrap(), None);
        assert_eq!(store.set_prefix(5, "%").unwrap(), Some("$".to_string()));
        assert!(store.set_prefix(5, "a b").is_err());
        assert_eq!(store.get(5), Some("%".to_string()));
        assert_eq!(store.remove_prefix(5), Some("%".to_string()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_guild_file_seeds_store() {
        let file = GuildConfigFile::parse(
            "guilds:\n  111:\n    prefix: \"?\"\n  222: {}\n",
        )
        .unwrap();
        let store = MemoryGuildStore::from_file(&file);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(111), Some("?".to_string()));
        assert_eq!(store.get(222), None);
    }

    #[test]
    fn test_guild_file_rejects_bad_prefix() {
        assert!(GuildConfigFile::parse("guilds:\n  111:\n    prefix: \"\"\n").is_err());
    }
}
