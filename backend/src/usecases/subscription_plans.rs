use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use crates::domain::{
    repositories::{plan_rates::PlanRateRepository, subscription_plans::SubscriptionPlanRepository},
    value_objects::plans::{ChangePlanModel, SubscriptionPlanDto},
};
use tracing::info;
use uuid::Uuid;

use super::plan_rates::PlanRateCache;

pub struct SubscriptionPlanUseCase<P, R>
where
    P: SubscriptionPlanRepository + Send + Sync + 'static,
    R: PlanRateRepository + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
    rates: Arc<PlanRateCache<R>>,
}

impl<P, R> SubscriptionPlanUseCase<P, R>
where
    P: SubscriptionPlanRepository + Send + Sync + 'static,
    R: PlanRateRepository + Send + Sync + 'static,
{
    pub fn new(plan_repo: Arc<P>, rates: Arc<PlanRateCache<R>>) -> Self {
        Self { plan_repo, rates }
    }

    /// Supersedes the active plan. Asking for the plan already in force changes nothing.
    pub async fn change_plan(
        &self,
        expert_id: Uuid,
        model: ChangePlanModel,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionPlanDto> {
        let plan = match self.plan_repo.find_active(expert_id).await? {
            Some(active)
                if active.plan_type == model.plan_type && active.tier_level == model.tier_level =>
            {
                active
            }
            _ => {
                let plan = self
                    .plan_repo
                    .change_plan(expert_id, model.plan_type, model.tier_level, now)
                    .await?;
                info!(
                    %expert_id,
                    plan_type = %plan.plan_type,
                    tier_level = %plan.tier_level,
                    "subscription_plans: plan changed"
                );
                plan
            }
        };

        let commission_rate_bps = self.rates.rate_bps(plan.plan_type, plan.tier_level).await?;

        Ok(SubscriptionPlanDto {
            id: plan.id,
            plan_type: plan.plan_type,
            tier_level: plan.tier_level,
            commission_rate_bps,
            effective_from: plan.effective_from,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crates::domain::{
        entities::subscription_plans::SubscriptionPlanEntity,
        repositories::{
            plan_rates::MockPlanRateRepository,
            subscription_plans::MockSubscriptionPlanRepository,
        },
        value_objects::enums::{plan_types::PlanType, tier_levels::TierLevel},
    };
    use mockall::predicate::eq;

    fn rates() -> Arc<PlanRateCache<MockPlanRateRepository>> {
        let mut repo = MockPlanRateRepository::new();
        repo.expect_find_rate_bps().returning(|_, _| Ok(Some(500)));
        Arc::new(PlanRateCache::new(
            Arc::new(repo),
            std::time::Duration::from_secs(60),
        ))
    }

    fn plan(expert_id: Uuid, plan_type: PlanType, tier_level: TierLevel) -> SubscriptionPlanEntity {
        SubscriptionPlanEntity {
            id: Uuid::new_v4(),
            expert_id,
            plan_type,
            tier_level,
            effective_from: Utc::now(),
            effective_to: None,
        }
    }

    #[tokio::test]
    async fn upgrade_supersedes_the_active_plan() {
        let expert_id = Uuid::new_v4();
        let now = Utc::now();

        let mut plans = MockSubscriptionPlanRepository::new();
        plans
            .expect_find_active()
            .returning(move |_| Ok(Some(plan(expert_id, PlanType::CommissionOnly, TierLevel::Standard))));
        plans
            .expect_change_plan()
            .with(eq(expert_id), eq(PlanType::Monthly), eq(TierLevel::Premium), eq(now))
            .times(1)
            .returning(|expert_id, plan_type, tier_level, _| Ok(plan(expert_id, plan_type, tier_level)));

        let dto = SubscriptionPlanUseCase::new(Arc::new(plans), rates())
            .change_plan(
                expert_id,
                ChangePlanModel {
                    plan_type: PlanType::Monthly,
                    tier_level: TierLevel::Premium,
                },
                now,
            )
            .await
            .unwrap();

        assert_eq!(dto.plan_type, PlanType::Monthly);
        assert_eq!(dto.commission_rate_bps, 500);
    }

    #[tokio::test]
    async fn choosing_the_current_plan_writes_nothing() {
        let expert_id = Uuid::new_v4();
        let mut plans = MockSubscriptionPlanRepository::new();
        plans
            .expect_find_active()
            .returning(move |_| Ok(Some(plan(expert_id, PlanType::Annual, TierLevel::Standard))));
        plans.expect_change_plan().never();

        let dto = SubscriptionPlanUseCase::new(Arc::new(plans), rates())
            .change_plan(
                expert_id,
                ChangePlanModel {
                    plan_type: PlanType::Annual,
                    tier_level: TierLevel::Standard,
                },
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(dto.plan_type, PlanType::Annual);
    }
}
