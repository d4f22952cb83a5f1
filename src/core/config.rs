//! # Configuration
//!
//! Environment-driven bot configuration. `.env` is loaded by the binary via
//! dotenvy before `Config::from_env` runs.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Lookup timeouts for prefix store and permission provider
//! - 1.0.0: Initial release with prefix, owner and toggle settings

use anyhow::{anyhow, Result};
use std::time::Duration;

/// Longest prefix accepted from configuration or a guild override.
pub const MAX_PREFIX_LEN: usize = 16;

/// Settings the dispatch pipeline reads at construction time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Global prefix, always active in every guild
    pub prefix: String,
    /// Principal that bypasses permission checks entirely
    pub owner_id: Option<u64>,
    /// Level handed to the permission policy for the owner
    pub owner_permission_level: u8,
    /// Emit success/failure events on the console sink
    pub log_to_console: bool,
    /// Lowercase invoke names before lookup
    pub case_insensitive: bool,
    /// Re-run the pipeline for edited messages
    pub parse_edits: bool,
    /// Accept commands sent in direct messages
    pub parse_direct_messages: bool,
    pub prefix_lookup_timeout: Duration,
    pub permission_check_timeout: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            prefix: "!".to_string(),
            owner_id: None,
            owner_permission_level: 10,
            log_to_console: true,
            case_insensitive: true,
            parse_edits: true,
            parse_direct_messages: false,
            prefix_lookup_timeout: Duration::from_secs(5),
            permission_check_timeout: Duration::from_secs(10),
        }
    }
}

impl DispatchOptions {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Reject settings the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        validate_prefix(&self.prefix)?;

        if self.prefix_lookup_timeout.is_zero() {
            return Err(anyhow!("Prefix lookup timeout must be greater than zero"));
        }
        if self.permission_check_timeout.is_zero() {
            return Err(anyhow!("Permission check timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Check a prefix is usable as a leading marker
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(anyhow!("Prefix must not be empty"));
    }
    if prefix.chars().any(char::is_whitespace) {
        return Err(anyhow!("Prefix must not contain whitespace: {prefix:?}"));
    }
    if prefix.chars().count() > MAX_PREFIX_LEN {
        return Err(anyhow!(
            "Prefix too long (max {MAX_PREFIX_LEN} chars): {prefix:?}"
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub log_level: String,
    /// Optional YAML file seeding guild prefix overrides
    pub guild_config_path: Option<String>,
    pub dispatch: DispatchOptions,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow!("DISCORD_TOKEN must be set"))?;

        let defaults = DispatchOptions::default();

        let owner_id = match lookup("OWNER_ID").filter(|v| !v.trim().is_empty()) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| anyhow!("OWNER_ID must be a numeric user id, got {raw:?}"))?,
            ),
            None => None,
        };

        let dispatch = DispatchOptions {
            prefix: lookup("COMMAND_PREFIX").unwrap_or(defaults.prefix),
            owner_id,
            owner_permission_level: parse_number(
                &lookup,
                "OWNER_PERMISSION_LEVEL",
                defaults.owner_permission_level,
            )?,
            log_to_console: parse_flag(&lookup, "LOG_TO_CONSOLE", defaults.log_to_console)?,
            case_insensitive: parse_flag(
                &lookup,
                "CASE_INSENSITIVE_COMMANDS",
                defaults.case_insensitive,
            )?,
            parse_edits: parse_flag(&lookup, "PARSE_EDITED_MESSAGES", defaults.parse_edits)?,
            parse_direct_messages: parse_flag(
                &lookup,
                "PARSE_DIRECT_MESSAGES",
                defaults.parse_direct_messages,
            )?,
            prefix_lookup_timeout: Duration::from_secs(parse_number(
                &lookup,
                "PREFIX_LOOKUP_TIMEOUT_SECS",
                defaults.prefix_lookup_timeout.as_secs(),
            )?),
            permission_check_timeout: Duration::from_secs(parse_number(
                &lookup,
                "PERMISSION_CHECK_TIMEOUT_SECS",
                defaults.permission_check_timeout.as_secs(),
            )?),
        };

        let config = Config {
            discord_token,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            guild_config_path: lookup("GUILD_CONFIG_PATH").filter(|p| !p.trim().is_empty()),
            dispatch,
        };
        config.dispatch.validate()?;
        Ok(config)
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        "" => Ok(default),
        _ => Err(anyhow!("{key} must be a boolean, got {raw:?}")),
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("{key} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}
