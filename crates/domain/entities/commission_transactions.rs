use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        commissions::CommissionSplit,
        enums::{
            commission_statuses::CommissionStatus, plan_types::PlanType, tier_levels::TierLevel,
        },
    },
    infra::db::postgres::schema::commission_transactions,
};

/// Immutable commission snapshot taken once per meeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionTransactionEntity {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub expert_id: Uuid,
    pub gross_amount_minor: i64,
    pub rate_bps: i32,
    pub commission_amount_minor: i64,
    pub net_amount_minor: i64,
    pub currency: String,
    pub plan_type: PlanType,
    pub tier_level: TierLevel,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = commission_transactions)]
pub struct CommissionTransactionRow {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub expert_id: Uuid,
    pub gross_amount_minor: i64,
    pub rate_bps: i32,
    pub commission_amount_minor: i64,
    pub net_amount_minor: i64,
    pub currency: String,
    pub plan_type: String,
    pub tier_level: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CommissionTransactionRow> for CommissionTransactionEntity {
    type Error = anyhow::Error;

    fn try_from(value: CommissionTransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            meeting_id: value.meeting_id,
            expert_id: value.expert_id,
            gross_amount_minor: value.gross_amount_minor,
            rate_bps: value.rate_bps,
            commission_amount_minor: value.commission_amount_minor,
            net_amount_minor: value.net_amount_minor,
            currency: value.currency,
            plan_type: PlanType::try_from(value.plan_type.as_str())?,
            tier_level: TierLevel::try_from(value.tier_level.as_str())?,
            status: CommissionStatus::try_from(value.status.as_str())?,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = commission_transactions)]
pub struct InsertCommissionTransactionEntity {
    pub meeting_id: Uuid,
    pub expert_id: Uuid,
    pub gross_amount_minor: i64,
    pub rate_bps: i32,
    pub commission_amount_minor: i64,
    pub net_amount_minor: i64,
    pub currency: String,
    pub plan_type: String,
    pub tier_level: String,
    pub status: String,
}

impl InsertCommissionTransactionEntity {
    pub fn snapshot(
        meeting_id: Uuid,
        expert_id: Uuid,
        currency: String,
        split: CommissionSplit,
        plan_type: PlanType,
        tier_level: TierLevel,
    ) -> Self {
        Self {
            meeting_id,
            expert_id,
            gross_amount_minor: split.gross_amount_minor,
            rate_bps: split.rate_bps,
            commission_amount_minor: split.commission_amount_minor,
            net_amount_minor: split.net_amount_minor,
            currency,
            plan_type: plan_type.to_string(),
            tier_level: tier_level.to_string(),
            status: CommissionStatus::Recorded.to_string(),
        }
    }
}
