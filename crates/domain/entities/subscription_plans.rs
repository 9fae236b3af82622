use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{plan_types::PlanType, tier_levels::TierLevel},
    infra::db::postgres::schema::{subscription_plan_changes, subscription_plans},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionPlanEntity {
    pub id: Uuid,
    pub expert_id: Uuid,
    pub plan_type: PlanType,
    pub tier_level: TierLevel,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscription_plans)]
pub struct SubscriptionPlanRow {
    pub id: Uuid,
    pub expert_id: Uuid,
    pub plan_type: String,
    pub tier_level: String,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionPlanRow> for SubscriptionPlanEntity {
    type Error = anyhow::Error;

    fn try_from(value: SubscriptionPlanRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            expert_id: value.expert_id,
            plan_type: PlanType::try_from(value.plan_type.as_str())?,
            tier_level: TierLevel::try_from(value.tier_level.as_str())?,
            effective_from: value.effective_from,
            effective_to: value.effective_to,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscription_plans)]
pub struct InsertSubscriptionPlanEntity {
    pub expert_id: Uuid,
    pub plan_type: String,
    pub tier_level: String,
    pub effective_from: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscription_plan_changes)]
pub struct InsertSubscriptionPlanChangeEntity {
    pub expert_id: Uuid,
    pub from_plan_id: Option<Uuid>,
    pub to_plan_id: Uuid,
    pub changed_at: DateTime<Utc>,
}
