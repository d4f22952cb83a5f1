//! # Permission Gate
//!
//! Decides whether an invocation may run. The configured owner bypasses the
//! provider entirely; everyone else is checked by a `PermissionProvider`
//! under a timeout.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Provider timeout, level-based provider
//! - 1.0.0: Initial release with owner override

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::commands::{Command, InvocationContext};
use crate::core::DispatchError;

/// Policy deciding whether a principal may run a command
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn check(&self, ctx: &InvocationContext, command: &dyn Command) -> Result<bool>;
}

/// Grants everything
pub struct AllowAll;

#[async_trait]
impl PermissionProvider for AllowAll {
    async fn check(&self, _ctx: &InvocationContext, _command: &dyn Command) -> Result<bool> {
        Ok(true)
    }
}

/// Numeric level policy: a user may run commands at or below their level
///
/// Users without an explicit level sit at `default_level`. The owner is
/// assigned `owner_level` unless given an explicit level.
pub struct LevelPermissionProvider {
    levels: DashMap<u64, u8>,
    owner_id: Option<u64>,
    owner_level: u8,
    default_level: u8,
}

impl LevelPermissionProvider {
    pub fn new(owner_id: Option<u64>, owner_level: u8) -> Self {
        Self {
            levels: DashMap::new(),
            owner_id,
            owner_level,
            default_level: 0,
        }
    }

    pub fn with_default_level(mut self, level: u8) -> Self {
        self.default_level = level;
        self
    }

    pub fn set_level(&self, user_id: u64, level: u8) {
        self.levels.insert(user_id, level);
    }

    pub fn clear_level(&self, user_id: u64) {
        self.levels.remove(&user_id);
    }

    pub fn level_of(&self, user_id: u64) -> u8 {
        if let Some(level) = self.levels.get(&user_id) {
            return *level;
        }
        if self.owner_id == Some(user_id) {
            self.owner_level
        } else {
            self.default_level
        }
    }
}

#[async_trait]
impl PermissionProvider for LevelPermissionProvider {
    async fn check(&self, ctx: &InvocationContext, command: &dyn Command) -> Result<bool> {
        Ok(self.level_of(ctx.principal.id) >= command.permission_level())
    }
}

/// Result of evaluating one invocation
#[derive(Debug)]
pub enum GateDecision {
    Granted { by_owner: bool },
    Denied,
    /// The provider failed or timed out; the invocation must be dropped
    Error(DispatchError),
}

pub struct PermissionGate {
    provider: Arc<dyn PermissionProvider>,
    owner_id: Option<u64>,
    check_timeout: Duration,
}

impl PermissionGate {
    pub fn new(
        provider: Arc<dyn PermissionProvider>,
        owner_id: Option<u64>,
        check_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            owner_id,
            check_timeout,
        }
    }

    pub fn is_owner(&self, user_id: u64) -> bool {
        self.owner_id == Some(user_id)
    }

    /// Runs to completion before the command body may start
    pub async fn evaluate(&self, ctx: &InvocationContext, command: &dyn Command) -> GateDecision {
        if self.is_owner(ctx.principal.id) {
            debug!("[{}] 👑 Owner override for '{}'", ctx.request_id, command.name());
            return GateDecision::Granted { by_owner: true };
        }

        match timeout(self.check_timeout, self.provider.check(ctx, command)).await {
            Ok(Ok(true)) => GateDecision::Granted { by_owner: false },
            Ok(Ok(false)) => GateDecision::Denied,
            Ok(Err(source)) => GateDecision::Error(DispatchError::PermissionCheck {
                command: command.name().to_string(),
                source,
            }),
            Err(_) => GateDecision::Error(DispatchError::Timeout {
                stage: "permission check",
                after: self.check_timeout,
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider answering a fixed value, or failing when `None`
    pub struct FixedProvider {
        pub answer: Option<bool>,
        pub calls: AtomicUsize,
    }

    impl FixedProvider {
        pub fn new(answer: Option<bool>) -> Self {
            Self {
                answer,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PermissionProvider for FixedProvider {
        async fn check(&self, _ctx: &InvocationContext, _command: &dyn Command) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.ok_or_else(|| anyhow!("permissions table unreachable"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::commands::context::testing::{context, guild_message, RecordingResponder};

    struct Leveled(u8);

    #[async_trait]
    impl Command for Leveled {
        fn invoke_names(&self) -> &[&'static str] {
            &["leveled"]
        }

        fn permission_level(&self) -> u8 {
            self.0
        }

        async fn execute(&self, _ctx: &InvocationContext) -> Result<()> {
            Ok(())
        }
    }

    fn ctx_for(user: u64) -> InvocationContext {
        context(
            guild_message(1, user, "!leveled"),
            "leveled",
            &[],
            Arc::new(RecordingResponder::default()),
        )
    }

    fn gate(provider: Arc<dyn PermissionProvider>) -> PermissionGate {
        PermissionGate::new(provider, Some(99), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_owner_override_skips_provider() {
        let provider = Arc::new(FixedProvider::new(Some(false)));
        let gate = gate(provider.clone());

        let decision = gate.evaluate(&ctx_for(99), &Leveled(10)).await;
        assert!(matches!(decision, GateDecision::Granted { by_owner: true }));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_owner_override_even_when_provider_fails() {
        let gate = gate(Arc::new(FixedProvider::new(None)));
        let decision = gate.evaluate(&ctx_for(99), &Leveled(10)).await;
        assert!(matches!(decision, GateDecision::Granted { by_owner: true }));
    }

    #[tokio::test]
    async fn test_provider_decides_for_others() {
        let granted = gate(Arc::new(FixedProvider::new(Some(true))));
        assert!(matches!(
            granted.evaluate(&ctx_for(1), &Leveled(0)).await,
            GateDecision::Granted { by_owner: false }
        ));

        let denied = gate(Arc::new(FixedProvider::new(Some(false))));
        assert!(matches!(
            denied.evaluate(&ctx_for(1), &Leveled(0)).await,
            GateDecision::Denied
        ));
    }

    #[tokio::test]
    async fn test_provider_error_is_not_a_denial() {
        let gate = gate(Arc::new(FixedProvider::new(None)));
        match gate.evaluate(&ctx_for(1), &Leveled(0)).await {
            GateDecision::Error(DispatchError::PermissionCheck { command, .. }) => {
                assert_eq!(command, "leveled")
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_provider_timeout() {
        struct Slow;

        #[async_trait]
        impl PermissionProvider for Slow {
            async fn check(
                &self,
                _ctx: &InvocationContext,
                _command: &dyn Command,
            ) -> Result<bool> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(true)
            }
        }

        let decision = gate(Arc::new(Slow)).evaluate(&ctx_for(1), &Leveled(0)).await;
        assert!(matches!(
            decision,
            GateDecision::Error(DispatchError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_level_provider() {
        let provider = LevelPermissionProvider::new(Some(99), 10);
        provider.set_level(5, 5);

        assert!(provider.check(&ctx_for(5), &Leveled(5)).await.unwrap());
        assert!(!provider.check(&ctx_for(5), &Leveled(6)).await.unwrap());
        assert!(provider.check(&ctx_for(1), &Leveled(0)).await.unwrap());
        assert!(!provider.check(&ctx_for(1), &Leveled(1)).await.unwrap());
        assert_eq!(provider.level_of(99), 10);

        provider.clear_level(5);
        assert_eq!(provider.level_of(5), 0);
    }
}
