use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{prelude::*, result::Error as DieselError};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain;
use crate::infra::db::postgres::{
    postgres_connection::PgPoolSquad,
    schema::{subscription_plan_changes, subscription_plans},
};
use domain::{
    entities::subscription_plans::{
        InsertSubscriptionPlanChangeEntity, InsertSubscriptionPlanEntity, SubscriptionPlanEntity,
        SubscriptionPlanRow,
    },
    repositories::subscription_plans::SubscriptionPlanRepository,
    value_objects::enums::{plan_types::PlanType, tier_levels::TierLevel},
};

pub struct SubscriptionPlanPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPlanPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionPlanRepository for SubscriptionPlanPostgres {
    async fn find_active(&self, expert_id: Uuid) -> Result<Option<SubscriptionPlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = subscription_plans::table
            .filter(subscription_plans::expert_id.eq(expert_id))
            .filter(subscription_plans::effective_to.is_null())
            .select(SubscriptionPlanRow::as_select())
            .first::<SubscriptionPlanRow>(&mut conn)
            .optional()?;

        row.map(SubscriptionPlanEntity::try_from).transpose()
    }

    async fn change_plan(
        &self,
        expert_id: Uuid,
        plan_type: PlanType,
        tier_level: TierLevel,
        effective_from: DateTime<Utc>,
    ) -> Result<SubscriptionPlanEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = conn.transaction::<SubscriptionPlanRow, DieselError, _>(|conn| {
            let previous = subscription_plans::table
                .filter(subscription_plans::expert_id.eq(expert_id))
                .filter(subscription_plans::effective_to.is_null())
                .select(subscription_plans::id)
                .for_update()
                .first::<Uuid>(conn)
                .optional()?;

            if let Some(previous_id) = previous {
                diesel::update(subscription_plans::table.find(previous_id))
                    .set(subscription_plans::effective_to.eq(Some(effective_from)))
                    .execute(conn)?;
            }

            let inserted = diesel::insert_into(subscription_plans::table)
                .values(&InsertSubscriptionPlanEntity {
                    expert_id,
                    plan_type: plan_type.to_string(),
                    tier_level: tier_level.to_string(),
                    effective_from,
                })
                .returning(SubscriptionPlanRow::as_returning())
                .get_result::<SubscriptionPlanRow>(conn)?;

            diesel::insert_into(subscription_plan_changes::table)
                .values(&InsertSubscriptionPlanChangeEntity {
                    expert_id,
                    from_plan_id: previous,
                    to_plan_id: inserted.id,
                    changed_at: effective_from,
                })
                .execute(conn)?;

            Ok(inserted)
        })?;

        row.try_into()
    }
}
