use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{plan_types::PlanType, tier_levels::TierLevel};

/// Built-in rate table, in basis points.
///
/// `plan_rates` is authoritative; these values seed it and cover a row that is missing.
pub fn default_commission_rate_bps(plan_type: PlanType, tier_level: TierLevel) -> i32 {
    match (plan_type, tier_level) {
        (PlanType::CommissionOnly, TierLevel::Standard) => 1500,
        (PlanType::CommissionOnly, TierLevel::Premium) => 1200,
        (PlanType::Monthly, TierLevel::Standard) => 800,
        (PlanType::Monthly, TierLevel::Premium) => 500,
        (PlanType::Annual, TierLevel::Standard) => 600,
        (PlanType::Annual, TierLevel::Premium) => 300,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePlanModel {
    pub plan_type: PlanType,
    pub tier_level: TierLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionPlanDto {
    pub id: Uuid,
    pub plan_type: PlanType,
    pub tier_level: TierLevel,
    pub commission_rate_bps: i32,
    pub effective_from: DateTime<Utc>,
}
