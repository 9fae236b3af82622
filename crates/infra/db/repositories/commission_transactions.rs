use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain;
use crate::infra::db::postgres::{
    postgres_connection::PgPoolSquad, schema::commission_transactions,
};
use domain::{
    entities::commission_transactions::{
        CommissionTransactionEntity, CommissionTransactionRow, InsertCommissionTransactionEntity,
    },
    repositories::commission_transactions::CommissionTransactionRepository,
};

pub struct CommissionTransactionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CommissionTransactionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CommissionTransactionRepository for CommissionTransactionPostgres {
    async fn record(
        &self,
        commission: InsertCommissionTransactionEntity,
    ) -> Result<CommissionTransactionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = diesel::insert_into(commission_transactions::table)
            .values(&commission)
            .on_conflict(commission_transactions::meeting_id)
            .do_nothing()
            .returning(CommissionTransactionRow::as_returning())
            .get_result::<CommissionTransactionRow>(&mut conn)
            .optional()?;

        let row = match inserted {
            Some(row) => row,
            None => commission_transactions::table
                .filter(commission_transactions::meeting_id.eq(commission.meeting_id))
                .select(CommissionTransactionRow::as_select())
                .first::<CommissionTransactionRow>(&mut conn)?,
        };

        row.try_into()
    }

    async fn find_by_meeting(
        &self,
        meeting_id: Uuid,
    ) -> Result<Option<CommissionTransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = commission_transactions::table
            .filter(commission_transactions::meeting_id.eq(meeting_id))
            .select(CommissionTransactionRow::as_select())
            .first::<CommissionTransactionRow>(&mut conn)
            .optional()?;

        row.map(CommissionTransactionEntity::try_from).transpose()
    }

    async fn list_by_expert(
        &self,
        expert_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CommissionTransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = commission_transactions::table
            .filter(commission_transactions::expert_id.eq(expert_id))
            .order(commission_transactions::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select(CommissionTransactionRow::as_select())
            .load::<CommissionTransactionRow>(&mut conn)?;

        rows.into_iter()
            .map(CommissionTransactionEntity::try_from)
            .collect()
    }
}
