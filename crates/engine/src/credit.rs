//! Credit accounting.
//!
//! The credit counter is the one piece of cross-execution mutable state in
//! the whole engine, so every implementation must update it atomically.
//! `InMemoryCreditManager` uses `DashMap`'s per-shard locking; the
//! Postgres-backed implementation in `db` uses an atomic `UPDATE ...
//! RETURNING`.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::EngineError;

/// Whether the caller's credit policy allows unlimited usage, a hard
/// per-period cap, or dev-mode unconditional pass.
#[derive(Debug, Clone)]
pub enum SubscriptionStatus {
    /// No subscription — credits are a hard ceiling.
    Trial,
    /// Active subscription. `overage_limit = None` means unlimited.
    Active { overage_limit: Option<u64> },
}

/// The inputs `hasEnough` needs, bundled per call (the subset of
/// `RuntimeParams` a credit check cares about).
#[derive(Debug, Clone)]
pub struct CreditCheck {
    pub organization_id: String,
    pub compute_credits: u64,
    pub estimated_usage: u64,
    pub subscription_status: SubscriptionStatus,
    pub dev_mode: bool,
}

#[async_trait]
pub trait CreditManager: Send + Sync {
    /// Current accumulated usage for the organization, prior to this check.
    async fn current_usage(&self, organization_id: &str) -> Result<u64, EngineError>;

    /// Policy decision:
    /// - dev mode: always true.
    /// - active subscription: true if unlimited (`overage_limit = None`),
    ///   else blocked only once `currentUsage - computeCredits >= overageLimit`.
    /// - trial: allowed iff `currentUsage + estimatedUsage <= computeCredits`.
    async fn has_enough(&self, check: &CreditCheck) -> Result<bool, EngineError> {
        if check.dev_mode {
            return Ok(true);
        }
        let current_usage = self.current_usage(&check.organization_id).await?;
        Ok(match &check.subscription_status {
            SubscriptionStatus::Active { overage_limit: None } => true,
            SubscriptionStatus::Active { overage_limit: Some(limit) } => {
                let overage = current_usage.saturating_sub(check.compute_credits);
                overage < *limit
            }
            SubscriptionStatus::Trial => current_usage + check.estimated_usage <= check.compute_credits,
        })
    }

    /// Atomically add `usage` to the organization's running total. Called
    /// exactly once per execution by the scheduler; not required to be
    /// idempotent under execution retry.
    async fn record(&self, organization_id: &str, usage: u64) -> Result<(), EngineError>;
}

/// `DashMap`-backed counter for tests and single-process dev mode.
#[derive(Default)]
pub struct InMemoryCreditManager {
    usage: DashMap<String, u64>,
}

impl InMemoryCreditManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CreditManager for InMemoryCreditManager {
    async fn current_usage(&self, organization_id: &str) -> Result<u64, EngineError> {
        Ok(self.usage.get(organization_id).map(|v| *v).unwrap_or(0))
    }

    async fn record(&self, organization_id: &str, usage: u64) -> Result<(), EngineError> {
        if usage > 0 {
            *self.usage.entry(organization_id.to_string()).or_insert(0) += usage;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(status: SubscriptionStatus, credits: u64, estimated: u64) -> CreditCheck {
        CreditCheck {
            organization_id: "org_1".into(),
            compute_credits: credits,
            estimated_usage: estimated,
            subscription_status: status,
            dev_mode: false,
        }
    }

    #[tokio::test]
    async fn dev_mode_always_allows() {
        let manager = InMemoryCreditManager::new();
        let mut c = check(SubscriptionStatus::Trial, 0, 1_000_000);
        c.dev_mode = true;
        assert!(manager.has_enough(&c).await.unwrap());
    }

    #[tokio::test]
    async fn trial_blocks_once_estimate_exceeds_credits() {
        let manager = InMemoryCreditManager::new();
        manager.record("org_1", 5).await.unwrap();
        assert!(manager.has_enough(&check(SubscriptionStatus::Trial, 10, 5)).await.unwrap());
        assert!(!manager.has_enough(&check(SubscriptionStatus::Trial, 10, 6)).await.unwrap());
    }

    #[tokio::test]
    async fn active_unlimited_always_allows() {
        let manager = InMemoryCreditManager::new();
        manager.record("org_1", 1_000_000).await.unwrap();
        let c = check(SubscriptionStatus::Active { overage_limit: None }, 10, 5);
        assert!(manager.has_enough(&c).await.unwrap());
    }

    #[tokio::test]
    async fn active_with_overage_limit_blocks_past_limit() {
        let manager = InMemoryCreditManager::new();
        manager.record("org_1", 15).await.unwrap(); // 5 over a credits=10 allowance
        let c = check(SubscriptionStatus::Active { overage_limit: Some(5) }, 10, 0);
        assert!(!manager.has_enough(&c).await.unwrap());

        let manager = InMemoryCreditManager::new();
        manager.record("org_1", 12).await.unwrap(); // 2 over, limit 5
        let c = check(SubscriptionStatus::Active { overage_limit: Some(5) }, 10, 0);
        assert!(manager.has_enough(&c).await.unwrap());
    }

    #[tokio::test]
    async fn record_accumulates() {
        let manager = InMemoryCreditManager::new();
        manager.record("org_1", 3).await.unwrap();
        manager.record("org_1", 4).await.unwrap();
        assert_eq!(manager.current_usage("org_1").await.unwrap(), 7);
    }
}
