use std::sync::Arc;

use chrono::{DateTime, Utc};
use crates::domain::{
    entities::eligibility_snapshots::EligibilitySnapshotEntity,
    repositories::{eligibility::EligibilityRepository, notifications::NotificationDispatcher},
    value_objects::{
        eligibility::{EligibilityRule, EligibilitySnapshotDto, EligibilityTransition},
        notifications::NotificationEvent,
    },
};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EligibilityError {
    #[error("eligibility metrics could not be calculated: {0}")]
    CalculationFailed(String),
    #[error("no eligibility snapshot for this expert yet")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EligibilityError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            EligibilityError::NotFound => StatusCode::NOT_FOUND,
            EligibilityError::CalculationFailed(_) | EligibilityError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecomputeSummary {
    pub evaluated: usize,
    pub failed: usize,
    pub newly_eligible: usize,
}

pub struct EligibilityUseCase<E>
where
    E: EligibilityRepository + Send + Sync + 'static,
{
    eligibility_repo: Arc<E>,
    notifier: Arc<dyn NotificationDispatcher>,
    rule: EligibilityRule,
}

impl<E> EligibilityUseCase<E>
where
    E: EligibilityRepository + Send + Sync + 'static,
{
    pub fn new(
        eligibility_repo: Arc<E>,
        notifier: Arc<dyn NotificationDispatcher>,
        rule: EligibilityRule,
    ) -> Self {
        Self {
            eligibility_repo,
            notifier,
            rule,
        }
    }

    pub async fn get(&self, expert_id: Uuid) -> Result<EligibilitySnapshotDto, EligibilityError> {
        self.eligibility_repo
            .find_snapshot(expert_id)
            .await?
            .map(EligibilitySnapshotDto::from)
            .ok_or(EligibilityError::NotFound)
    }

    /// Rewrites the expert's snapshot. The upgrade notice goes out only on a
    /// not-eligible to eligible flip, after the snapshot recording it is stored.
    /// When two recomputes race, only the one whose write lands sends it.
    /// A failed aggregation leaves the previous snapshot in place.
    pub async fn recompute(
        &self,
        expert_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<EligibilitySnapshotDto, EligibilityError> {
        let aggregates = self
            .eligibility_repo
            .aggregate(expert_id, self.rule.window_start(now))
            .await
            .map_err(|err| {
                warn!(%expert_id, error = ?err, "eligibility: aggregation failed, snapshot kept");
                EligibilityError::CalculationFailed(err.to_string())
            })?;
        let previous = self.eligibility_repo.find_snapshot(expert_id).await?;

        let metrics = self.rule.derive_metrics(&aggregates, now);
        let is_eligible = self.rule.is_eligible(&metrics);
        let transition =
            EligibilityTransition::between(previous.as_ref().map(|s| s.is_eligible), is_eligible);

        let (transitioned_at, notified_at) = match transition {
            EligibilityTransition::BecameEligible => (Some(now), Some(now)),
            EligibilityTransition::BecameIneligible => {
                (Some(now), previous.as_ref().and_then(|s| s.notified_at))
            }
            EligibilityTransition::Unchanged => (
                previous.as_ref().and_then(|s| s.transitioned_at),
                previous.as_ref().and_then(|s| s.notified_at),
            ),
        };

        let snapshot = EligibilitySnapshotEntity {
            expert_id,
            months_active: metrics.months_active,
            booking_count: metrics.booking_count,
            average_monthly_revenue_minor: metrics.average_monthly_revenue_minor,
            total_commissions_minor: metrics.total_commissions_minor,
            rolling_commissions_minor: metrics.rolling_commissions_minor,
            is_eligible,
            transitioned_at,
            notified_at,
            computed_at: now,
        };
        let written = self
            .eligibility_repo
            .upsert_snapshot(snapshot.clone(), previous.as_ref().map(|s| s.is_eligible))
            .await?;
        if !written {
            debug!(%expert_id, "eligibility: snapshot changed concurrently, keeping the stored one");
            let stored = self.eligibility_repo.find_snapshot(expert_id).await?;
            return Ok(EligibilitySnapshotDto::from(stored.unwrap_or(snapshot)));
        }

        match transition {
            EligibilityTransition::BecameEligible => {
                info!(
                    %expert_id,
                    average_monthly_revenue_minor = metrics.average_monthly_revenue_minor,
                    "eligibility: expert became eligible for upgrade"
                );
                self.notifier.trigger(NotificationEvent::EligibleForUpgrade {
                    expert_id,
                    average_monthly_revenue_minor: metrics.average_monthly_revenue_minor,
                    months_active: metrics.months_active,
                });
            }
            EligibilityTransition::BecameIneligible => {
                info!(%expert_id, "eligibility: expert no longer eligible");
            }
            EligibilityTransition::Unchanged => {}
        }

        Ok(EligibilitySnapshotDto::from(snapshot))
    }

    /// One pass over every expert with bookings. Per-expert failures are counted, not fatal.
    pub async fn recompute_all(&self, now: DateTime<Utc>) -> Result<RecomputeSummary, EligibilityError> {
        let expert_ids = self.eligibility_repo.list_expert_ids().await?;
        let mut summary = RecomputeSummary::default();

        for expert_id in expert_ids {
            let was_eligible = self
                .eligibility_repo
                .find_snapshot(expert_id)
                .await
                .ok()
                .flatten()
                .is_some_and(|s| s.is_eligible);

            match self.recompute(expert_id, now).await {
                Ok(snapshot) => {
                    summary.evaluated += 1;
                    if snapshot.is_eligible && !was_eligible {
                        summary.newly_eligible += 1;
                    }
                }
                Err(err) => {
                    summary.failed += 1;
                    warn!(%expert_id, error = %err, "eligibility: recompute failed");
                }
            }
        }

        Ok(summary)
    }
}
