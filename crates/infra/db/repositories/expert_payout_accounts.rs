use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    entities::expert_payout_accounts::ExpertPayoutAccountEntity,
    repositories::expert_payout_accounts::ExpertPayoutAccountRepository,
};
use crate::infra::db::postgres::{
    postgres_connection::PgPoolSquad, schema::expert_payout_accounts,
};

pub struct ExpertPayoutAccountPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ExpertPayoutAccountPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ExpertPayoutAccountRepository for ExpertPayoutAccountPostgres {
    async fn find_by_expert(&self, expert_id: Uuid) -> Result<Option<ExpertPayoutAccountEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let account = expert_payout_accounts::table
            .find(expert_id)
            .select(ExpertPayoutAccountEntity::as_select())
            .first::<ExpertPayoutAccountEntity>(&mut conn)
            .optional()?;

        Ok(account)
    }
}
