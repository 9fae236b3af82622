use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::subscription_plans::SubscriptionPlanEntity,
    value_objects::enums::{plan_types::PlanType, tier_levels::TierLevel},
};

#[automock]
#[async_trait]
pub trait SubscriptionPlanRepository {
    async fn find_active(&self, expert_id: Uuid) -> Result<Option<SubscriptionPlanEntity>>;

    /// Closes the active plan, inserts the new one and records the change atomically.
    async fn change_plan(
        &self,
        expert_id: Uuid,
        plan_type: PlanType,
        tier_level: TierLevel,
        effective_from: DateTime<Utc>,
    ) -> Result<SubscriptionPlanEntity>;
}
