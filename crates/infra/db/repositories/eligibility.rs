use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    prelude::*,
    result::Error as DieselError,
    sql_query,
    sql_types::{BigInt, Nullable, Timestamptz, Uuid as SqlUuid},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    entities::eligibility_snapshots::EligibilitySnapshotEntity,
    repositories::eligibility::EligibilityRepository,
    value_objects::eligibility::EligibilityAggregates,
};
use crate::infra::db::postgres::{
    postgres_connection::PgPoolSquad,
    schema::{eligibility_snapshots, meetings},
};

/// Refunded and disputed revenue does not count towards eligibility.
const AGGREGATE_SQL: &str = r#"
SELECT
    (SELECT MIN(m.start_time) FROM meetings m
        WHERE m.expert_id = $1 AND m.payment_status = 'succeeded') AS first_booking_at,
    (SELECT COUNT(*) FROM meetings m
        WHERE m.expert_id = $1 AND m.payment_status = 'succeeded'
          AND m.created_at >= $2) AS window_booking_count,
    (SELECT COALESCE(SUM(c.gross_amount_minor), 0)::INT8 FROM commission_transactions c
        WHERE c.expert_id = $1 AND c.status IN ('recorded', 'processed')
          AND c.created_at >= $2) AS window_gross_minor,
    (SELECT COALESCE(SUM(c.commission_amount_minor), 0)::INT8 FROM commission_transactions c
        WHERE c.expert_id = $1 AND c.status IN ('recorded', 'processed')) AS total_commissions_minor,
    (SELECT COALESCE(SUM(c.commission_amount_minor), 0)::INT8 FROM commission_transactions c
        WHERE c.expert_id = $1 AND c.status IN ('recorded', 'processed')
          AND c.created_at >= $2) AS window_commissions_minor
"#;

#[derive(Debug, QueryableByName)]
struct AggregateRow {
    #[diesel(sql_type = Nullable<Timestamptz>)]
    first_booking_at: Option<DateTime<Utc>>,
    #[diesel(sql_type = BigInt)]
    window_booking_count: i64,
    #[diesel(sql_type = BigInt)]
    window_gross_minor: i64,
    #[diesel(sql_type = BigInt)]
    total_commissions_minor: i64,
    #[diesel(sql_type = BigInt)]
    window_commissions_minor: i64,
}

pub struct EligibilityPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl EligibilityPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl EligibilityRepository for EligibilityPostgres {
    async fn aggregate(
        &self,
        expert_id: Uuid,
        window_start: DateTime<Utc>,
    ) -> Result<EligibilityAggregates> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = sql_query(AGGREGATE_SQL)
            .bind::<SqlUuid, _>(expert_id)
            .bind::<Timestamptz, _>(window_start)
            .get_result::<AggregateRow>(&mut conn)?;

        Ok(EligibilityAggregates {
            first_booking_at: row.first_booking_at,
            window_booking_count: row.window_booking_count,
            window_gross_minor: row.window_gross_minor,
            total_commissions_minor: row.total_commissions_minor,
            window_commissions_minor: row.window_commissions_minor,
        })
    }

    async fn find_snapshot(&self, expert_id: Uuid) -> Result<Option<EligibilitySnapshotEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let snapshot = eligibility_snapshots::table
            .find(expert_id)
            .select(EligibilitySnapshotEntity::as_select())
            .first::<EligibilitySnapshotEntity>(&mut conn)
            .optional()?;

        Ok(snapshot)
    }

    async fn upsert_snapshot(
        &self,
        snapshot: EligibilitySnapshotEntity,
        expected_eligible: Option<bool>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let written = conn.transaction::<bool, DieselError, _>(|conn| {
            let stored = eligibility_snapshots::table
                .find(snapshot.expert_id)
                .select(eligibility_snapshots::is_eligible)
                .for_update()
                .first::<bool>(conn)
                .optional()?;
            if stored != expected_eligible {
                return Ok(false);
            }

            let written = match stored {
                None => diesel::insert_into(eligibility_snapshots::table)
                    .values(&snapshot)
                    .on_conflict(eligibility_snapshots::expert_id)
                    .do_nothing()
                    .execute(conn)?,
                Some(_) => diesel::update(eligibility_snapshots::table.find(snapshot.expert_id))
                    .set(&snapshot)
                    .execute(conn)?,
            };
            Ok(written > 0)
        })?;

        Ok(written)
    }

    async fn list_expert_ids(&self) -> Result<Vec<Uuid>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let ids = meetings::table
            .select(meetings::expert_id)
            .distinct()
            .order(meetings::expert_id.asc())
            .load::<Uuid>(&mut conn)?;

        Ok(ids)
    }
}
