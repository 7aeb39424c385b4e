use anyhow::Result;
use chrono::Utc;
use quota_core::domain::{
    repositories::trial_usages::TrialUsageRepository,
    value_objects::{
        enums::trial_kinds::TrialKind,
        plans::TRIAL_LIMIT,
        quota::{DenialReason, TrialDecision},
    },
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct TrialConsumption {
    pub kind: TrialKind,
    pub consumed: bool,
    pub remaining: i32,
    pub limit: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
}

/// IP-keyed allowance for anonymous visitors. Store errors deny rather than allow.
pub struct TrialQuotaUseCase<T>
where
    T: TrialUsageRepository + Send + Sync + 'static,
{
    trial_usage_repository: Arc<T>,
    limit: i32,
}

impl<T> TrialQuotaUseCase<T>
where
    T: TrialUsageRepository + Send + Sync + 'static,
{
    pub fn new(trial_usage_repository: Arc<T>) -> Self {
        Self {
            trial_usage_repository,
            limit: TRIAL_LIMIT,
        }
    }

    pub async fn check(&self, ip_address: &str, kind: TrialKind) -> TrialDecision {
        match self.trial_usage_repository.find_by_ip(ip_address).await {
            Ok(usage) => {
                let used = usage.map_or(0, |usage| usage.used(kind));
                let decision = TrialDecision::from_used(kind, used, self.limit);
                if !decision.allowed {
                    info!(ip_address, %kind, used, "trial_quota: trial limit reached");
                }
                decision
            }
            Err(err) => {
                error!(
                    ip_address,
                    %kind,
                    db_error = ?err,
                    "trial_quota: store unavailable; treating trial as exhausted"
                );
                TrialDecision::fail_secure(kind, self.limit)
            }
        }
    }

    /// Counts one successful anonymous action. Never increments past the limit.
    pub async fn consume(&self, ip_address: &str, kind: TrialKind) -> Result<TrialConsumption> {
        let updated = self
            .trial_usage_repository
            .increment(ip_address, kind, self.limit, Utc::now())
            .await?;

        let consumption = match updated {
            Some(usage) => TrialConsumption {
                kind,
                consumed: true,
                remaining: (self.limit - usage.used(kind)).max(0),
                limit: self.limit,
                reason: None,
            },
            None => {
                warn!(ip_address, %kind, "trial_quota: consume attempted past the trial limit");
                TrialConsumption {
                    kind,
                    consumed: false,
                    remaining: 0,
                    limit: self.limit,
                    reason: Some(DenialReason::TrialLimitReached),
                }
            }
        };

        Ok(consumption)
    }

    /// Remaining allowance for every trial counter. Fails secure like `check`.
    pub async fn summary(&self, ip_address: &str) -> Vec<TrialDecision> {
        match self.trial_usage_repository.find_by_ip(ip_address).await {
            Ok(usage) => TrialKind::ALL
                .iter()
                .map(|kind| {
                    let used = usage.as_ref().map_or(0, |usage| usage.used(*kind));
                    TrialDecision::from_used(*kind, used, self.limit)
                })
                .collect(),
            Err(err) => {
                error!(
                    ip_address,
                    db_error = ?err,
                    "trial_quota: store unavailable while summarising"
                );
                TrialKind::ALL
                    .iter()
                    .map(|kind| TrialDecision::fail_secure(*kind, self.limit))
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use quota_core::domain::{
        entities::trial_usages::TrialUsageEntity,
        repositories::trial_usages::MockTrialUsageRepository,
    };

    fn usage(ip_address: &str, parses: i32, generations: i32, downloads: i32) -> TrialUsageEntity {
        TrialUsageEntity {
            ip_address: ip_address.to_string(),
            parses_used: parses,
            generations_used: generations,
            downloads_used: downloads,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn unseen_ip_has_the_full_allowance() {
        let mut trial_usages = MockTrialUsageRepository::new();
        trial_usages
            .expect_find_by_ip()
            .with(eq("203.0.113.7"))
            .returning(|_| Ok(None));

        let decision = TrialQuotaUseCase::new(Arc::new(trial_usages))
            .check("203.0.113.7", TrialKind::Generation)
            .await;

        assert!(decision.allowed);
        assert_eq!(decision.remaining, 2);
        assert_eq!(decision.limit, 2);
    }

    #[tokio::test]
    async fn ip_with_two_downloads_is_denied_the_third() {
        let row = usage("203.0.113.7", 0, 1, 2);
        let mut trial_usages = MockTrialUsageRepository::new();
        trial_usages
            .expect_find_by_ip()
            .returning(move |_| Ok(Some(row.clone())));

        let usecase = TrialQuotaUseCase::new(Arc::new(trial_usages));
        let download = usecase.check("203.0.113.7", TrialKind::Download).await;
        let generation = usecase.check("203.0.113.7", TrialKind::Generation).await;

        assert!(!download.allowed);
        assert_eq!(download.reason, Some(DenialReason::TrialLimitReached));
        assert!(generation.allowed);
        assert_eq!(generation.remaining, 1);
    }

    #[tokio::test]
    async fn store_error_fails_secure() {
        let mut trial_usages = MockTrialUsageRepository::new();
        trial_usages
            .expect_find_by_ip()
            .returning(|_| Err(anyhow::anyhow!("could not connect to server")));

        let decision = TrialQuotaUseCase::new(Arc::new(trial_usages))
            .check("203.0.113.7", TrialKind::Download)
            .await;

        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.reason, Some(DenialReason::StoreUnavailable));
    }

    #[tokio::test]
    async fn consume_reports_remaining_after_increment() {
        let row = usage("198.51.100.4", 1, 0, 0);
        let mut trial_usages = MockTrialUsageRepository::new();
        trial_usages
            .expect_increment()
            .withf(|ip, kind, limit, _| {
                ip == "198.51.100.4" && *kind == TrialKind::Parse && *limit == 2
            })
            .times(1)
            .returning(move |_, _, _, _| Ok(Some(row.clone())));

        let consumption = TrialQuotaUseCase::new(Arc::new(trial_usages))
            .consume("198.51.100.4", TrialKind::Parse)
            .await
            .unwrap();

        assert!(consumption.consumed);
        assert_eq!(consumption.remaining, 1);
    }

    #[tokio::test]
    async fn consume_at_the_limit_is_refused() {
        let mut trial_usages = MockTrialUsageRepository::new();
        trial_usages
            .expect_increment()
            .returning(|_, _, _, _| Ok(None));

        let consumption = TrialQuotaUseCase::new(Arc::new(trial_usages))
            .consume("198.51.100.4", TrialKind::Download)
            .await
            .unwrap();

        assert!(!consumption.consumed);
        assert_eq!(consumption.reason, Some(DenialReason::TrialLimitReached));
    }

    #[tokio::test]
    async fn summary_covers_every_kind() {
        let row = usage("198.51.100.4", 2, 1, 0);
        let mut trial_usages = MockTrialUsageRepository::new();
        trial_usages
            .expect_find_by_ip()
            .times(1)
            .returning(move |_| Ok(Some(row.clone())));

        let summary = TrialQuotaUseCase::new(Arc::new(trial_usages))
            .summary("198.51.100.4")
            .await;

        let remaining: Vec<(TrialKind, i32)> =
            summary.iter().map(|d| (d.kind, d.remaining)).collect();
        assert_eq!(
            remaining,
            vec![
                (TrialKind::Parse, 0),
                (TrialKind::Generation, 1),
                (TrialKind::Download, 2)
            ]
        );
    }
}
