use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;

use crate::domain::{
    repositories::plan_rates::PlanRateRepository,
    value_objects::enums::{plan_types::PlanType, tier_levels::TierLevel},
};
use crate::infra::db::postgres::{postgres_connection::PgPoolSquad, schema::plan_rates};

pub struct PlanRatePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PlanRatePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PlanRateRepository for PlanRatePostgres {
    async fn find_rate_bps(
        &self,
        plan_type: PlanType,
        tier_level: TierLevel,
    ) -> Result<Option<i32>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rate = plan_rates::table
            .find((plan_type.as_str(), tier_level.as_str()))
            .select(plan_rates::rate_bps)
            .first::<i32>(&mut conn)
            .optional()?;

        Ok(rate)
    }
}
