use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::enums::{plan_types::PlanType, tier_levels::TierLevel};

#[automock]
#[async_trait]
pub trait PlanRateRepository {
    async fn find_rate_bps(&self, plan_type: PlanType, tier_level: TierLevel)
    -> Result<Option<i32>>;
}
